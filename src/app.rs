use eframe::egui;

use footprint_dash::dashboard::DashboardContext;

use crate::state::{AppState, Tab};
use crate::ui::{estimator, panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FootprintApp {
    pub ctx: DashboardContext,
    pub state: AppState,
}

impl FootprintApp {
    pub fn new(ctx: DashboardContext, state: AppState) -> Self {
        Self { ctx, state }
    }
}

impl eframe::App for FootprintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: title and tabs ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.ctx, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &self.ctx, &mut self.state);
            });

        // ---- Central panel: chart or estimator ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.tab {
            Tab::Estimators => estimator::estimator_tab(ui, &self.ctx, &mut self.state),
            _ => plot::chart_tab(ui, &self.ctx, &mut self.state),
        });
    }
}
