//! GUI module
//!
//! egui-based graphical user interface.

mod app;

use anyhow::Result;
use duelsplus_launcher::Config;
use duelsplus_launcher::bridge::Backend;
use duelsplus_launcher::core::controller::Launcher;

/// Run the GUI application. Must be called from within the tokio runtime.
pub fn run(backend: Backend, config: Config) -> Result<()> {
    let launcher = Launcher::new(backend);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 700.0])
            .with_min_inner_size([800.0, 560.0])
            .with_title("Duels+ Launcher"),
        ..Default::default()
    };

    eframe::run_native(
        "Duels+ Launcher",
        options,
        Box::new(move |cc| Ok(Box::new(app::LauncherApp::new(cc, launcher, config)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run GUI: {}", e))
}
