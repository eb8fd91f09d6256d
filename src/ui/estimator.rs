use eframe::egui::{self, Color32, RichText, Ui};

use footprint_dash::dashboard::DashboardContext;
use footprint_dash::estimate::{InputField, Section};

use crate::state::AppState;

/// Render the estimator form and its results.
pub fn estimator_tab(ui: &mut Ui, ctx: &DashboardContext, state: &mut AppState) {
    egui::ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        ui.vertical_centered(|ui: &mut Ui| {
            ui.heading("Estimators for Prometheus server, Cortex Ingester, Cortex Distributor and Minio");
            ui.add_space(8.0);
            ui.heading("Inputs");
        });

        egui::Grid::new("estimator_inputs")
            .num_columns(2)
            .spacing([24.0, 8.0])
            .show(ui, |ui: &mut Ui| {
                for field in InputField::ALL {
                    ui.label(field.label());
                    let mut text = state.input_text.get(&field).cloned().unwrap_or_default();
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut text)
                            .hint_text(field.hint())
                            .desired_width(160.0),
                    );
                    if response.changed() {
                        state.set_input_text(ctx, field, text);
                    }
                    ui.end_row();
                }
            });

        ui.separator();
        ui.vertical_centered(|ui: &mut Ui| {
            ui.heading("Results come from linear regression models based on our measurements");
        });

        let estimates = match &state.estimates {
            Ok(estimates) => estimates,
            Err(e) => {
                ui.label(RichText::new(format!("Estimation failed: {e}")).color(Color32::RED));
                return;
            }
        };

        for section in [Section::Cpu, Section::Disk, Section::Memory, Section::Network] {
            ui.add_space(12.0);
            ui.heading(section.title());
            for line in estimates.section(section) {
                ui.label(RichText::new(line.text.as_deref().unwrap_or("")).size(19.0));
            }
            if section == Section::Disk {
                ui.label(RichText::new("Cumulative value (8 hours)").italics());
            }
        }
    });
}
