use eframe::egui::{self, Color32, RichText, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot};

use footprint_dash::chart::{
    BarChartSpec, Chart, NetworkView, AXIS_TITLE_FONT_SIZE, CHART_HEIGHT, CHART_WIDTH,
    NO_DATA_FONT_SIZE, NO_DATA_TEXT,
};
use footprint_dash::dashboard::DashboardContext;

use crate::state::{AppState, Tab};

/// Text style registered at startup for legend entries.
pub const LEGEND_STYLE: &str = "legend";

const CRIMSON: Color32 = Color32::from_rgb(220, 20, 60);

/// Share of a group slot covered by its bars.
const GROUP_WIDTH: f64 = 0.8;

// ---------------------------------------------------------------------------
// Chart tabs (central panel)
// ---------------------------------------------------------------------------

/// Render the chart of the selected tab.
pub fn chart_tab(ui: &mut Ui, ctx: &DashboardContext, state: &mut AppState) {
    if state.tab == Tab::Network {
        ui.horizontal(|ui: &mut Ui| {
            ui.strong("Y axis");
            let current = state.network;
            for view in NetworkView::ALL {
                if ui.radio(current == view, view.label()).clicked() && current != view {
                    state.set_network(ctx, view);
                }
            }
        });
        ui.add_space(8.0);
    }

    let chart = match state.tab {
        Tab::Cpu => &state.charts.cpu,
        Tab::Disk => &state.charts.disk,
        Tab::Memory => &state.charts.memory,
        Tab::Network | Tab::Estimators => &state.charts.network,
    };

    match chart {
        Chart::Bars(spec) => grouped_bars(ui, spec),
        Chart::NoData => no_data(ui),
    }
}

fn no_data(ui: &mut Ui) {
    ui.allocate_ui(egui::vec2(ui.available_width(), CHART_HEIGHT), |ui: &mut Ui| {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label(RichText::new(NO_DATA_TEXT).size(NO_DATA_FONT_SIZE).color(CRIMSON));
        });
    });
}

fn grouped_bars(ui: &mut Ui, spec: &BarChartSpec) {
    ui.label(RichText::new(spec.legend_title).strong());

    let n_series = spec.series.len().max(1) as f64;
    let bar_width = GROUP_WIDTH / n_series;

    let charts: Vec<BarChart> = spec
        .series
        .iter()
        .enumerate()
        .map(|(s, series)| {
            let offset = -GROUP_WIDTH / 2.0 + bar_width * (s as f64 + 0.5);
            let bars = series
                .points
                .iter()
                .map(|&(g, mean)| {
                    Bar::new(g as f64 + offset, mean)
                        .width(bar_width * 0.95)
                        .name(format!("{} = {}\n{}", spec.legend_title, series.category, spec.groups[g]))
                })
                .collect();
            BarChart::new(bars)
                .name(series.category.to_string())
                .color(series.color)
        })
        .collect();

    let groups = spec.groups.clone();
    Plot::new(("bar_chart", spec.value.column()))
        .legend(Legend::default().text_style(egui::TextStyle::Name(LEGEND_STYLE.into())))
        .x_axis_label(RichText::new(spec.x_label).size(AXIS_TITLE_FONT_SIZE))
        .y_axis_label(RichText::new(spec.y_label).size(AXIS_TITLE_FONT_SIZE))
        .x_grid_spacer(egui_plot::uniform_grid_spacer(|_| [1.0, 5.0, 10.0]))
        .x_axis_formatter(move |mark, _range| {
            let i = mark.value.round();
            let on_slot = (mark.value - i).abs() < 1e-6 && i >= 0.0;
            match groups.get(i as usize) {
                Some(g) if on_slot => g.clone(),
                _ => String::new(),
            }
        })
        .height(CHART_HEIGHT)
        .width(CHART_WIDTH.min(ui.available_width()))
        .allow_drag(false)
        .allow_scroll(false)
        .allow_boxed_zoom(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}
