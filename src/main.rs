//! Application entry point — fatigue monitoring operator panel.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`AppConfig`] from disk (defaults on first run or on error).
//! 3. Start the [`Session`]: tokio runtime, poll timer, push channel,
//!    frame timer.
//! 4. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.  Closing the window tears the session down.

use eframe::egui;

use fatigue_dashboard::{app::DashboardApp, config::AppConfig, session::Session};

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (w, h) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Fatigue Monitor")
        .with_inner_size([w, h])
        .with_min_inner_size([360.0, 420.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("fatigue dashboard starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Session
    let session = match Session::start(&config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("could not start the session runtime: {e}");
            std::process::exit(1);
        }
    };

    // 4. UI
    let app = DashboardApp::new(session, &config);
    eframe::run_native(
        "Fatigue Monitor",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
