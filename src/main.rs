#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod error;
mod model_download;
mod pipeline;
mod types;
mod ui;

use anyhow::Result;
use gpui::Application;

use config::Config;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::discover()?;
    log::info!(
        "countdown from {}, tick every {:?}, edges: {:?}",
        config.timing.countdown_from,
        config.timing.tick_interval(),
        config.render.edge_source
    );

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
