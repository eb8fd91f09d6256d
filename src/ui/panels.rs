use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use footprint_dash::chart::Chart;
use footprint_dash::dashboard::DashboardContext;
use footprint_dash::data::model::{DimValue, Dimension};

use crate::state::{AppState, Tab};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, ctx: &DashboardContext, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let dataset = ctx.dataset();
    if dataset.is_empty() {
        ui.label("The query returned no rows.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Category axis selector ----
            ui.strong("Comparative analysis");
            let current = state.category;
            egui::ComboBox::from_id_salt("category_axis")
                .selected_text(current.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for dim in Dimension::FILTERABLE {
                        if ui.selectable_label(current == dim, dim.label()).clicked() {
                            state.set_category(ctx, dim);
                        }
                    }
                });
            ui.separator();

            // ---- Per-dimension filter widgets (collapsible) ----
            for dim in Dimension::FILTERABLE {
                let all_values = dataset.domain(dim);
                let n_selected = state.filters.get(&dim).map_or(0, |s| s.len());
                let mut header = format!("{}  ({n_selected}/{})", dim.label(), all_values.len());
                if dim == state.category {
                    header.push_str("  · axis");
                }

                egui::CollapsingHeader::new(RichText::new(header).strong())
                    .id_salt(dim.column())
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        if dim == state.category {
                            ui.label(RichText::new("Not applied while on the axis").italics());
                        }

                        // Select all / none buttons
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(ctx, dim);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(ctx, dim);
                            }
                        });

                        for val in all_values {
                            let mut checked = state
                                .filters
                                .get(&dim)
                                .is_some_and(|s| s.contains(val));

                            // Show the bar colour if this is the axis dimension
                            let mut text = RichText::new(val.to_string());
                            if dim == state.category {
                                if let Some(c) = series_color(&state.charts.cpu, val) {
                                    text = text.color(c);
                                }
                            }

                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(ctx, dim, val);
                            }
                        }
                    });
            }
        });
}

fn series_color(chart: &Chart, value: &DimValue) -> Option<Color32> {
    match chart {
        Chart::Bars(spec) => spec
            .series
            .iter()
            .find(|s| &s.category == value)
            .map(|s| s.color),
        Chart::NoData => None,
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the title row and the tab selector.
pub fn top_bar(ui: &mut Ui, ctx: &DashboardContext, state: &mut AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(RichText::new("Low Footprint Data Ingestion and Analytics").size(28.0));
    });

    ui.horizontal(|ui: &mut Ui| {
        for tab in Tab::ALL {
            ui.selectable_value(&mut state.tab, tab, tab.title());
        }

        ui.separator();

        ui.label(format!(
            "{} rows loaded, {} match the filters",
            ctx.dataset().len(),
            state.charts.matching_rows
        ));
    });
}
