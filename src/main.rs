mod app;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use app::FootprintApp;
use eframe::egui;
use footprint_dash::chart::LEGEND_FONT_SIZE;
use footprint_dash::config::DashboardConfig;
use footprint_dash::dashboard::DashboardContext;
use state::AppState;

fn main() -> Result<()> {
    env_logger::init();

    let cli_config = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DashboardConfig::resolve(cli_config.as_deref())?;

    // Data and models are loaded before the window exists: a broken source
    // or model directory stops the process here.
    let dashboard = DashboardContext::load(&config)?;
    let state = AppState::new(&dashboard, &config.defaults)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Low Footprint Data Ingestion and Analytics",
        options,
        Box::new(|cc| {
            cc.egui_ctx.style_mut(|style| {
                style.text_styles.insert(
                    egui::TextStyle::Name(ui::plot::LEGEND_STYLE.into()),
                    egui::FontId::proportional(LEGEND_FONT_SIZE),
                );
            });
            Ok(Box::new(FootprintApp::new(dashboard, state)))
        }),
    )
    .map_err(|e| anyhow!("UI error: {e}"))
}
