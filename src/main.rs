//! Application entry point for Talk to Push.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Install the global keyboard hook ([`InputObserver`]).
//! 4. Enumerate microphones.
//! 5. Start the activation [`Engine`] with the system backends.
//! 6. Run [`eframe::run_native`]; blocks until the settings window closes,
//!    which shuts the engine down.

use std::sync::Arc;

use anyhow::Context;
use eframe::egui;
use talk_to_push::{
    app::SettingsApp,
    audio::list_microphones,
    config::AppConfig,
    engine::{live_status, Backends, Engine},
    hotkey::{InputObserver, PressedKeys},
    window::SETTINGS_WINDOW_TITLE,
};

fn native_options() -> eframe::NativeOptions {
    let viewport = egui::ViewportBuilder::default()
        .with_title(SETTINGS_WINDOW_TITLE)
        .with_inner_size([460.0, 480.0])
        .with_min_inner_size([380.0, 400.0]);

    eframe::NativeOptions {
        viewport,
        ..Default::default()
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Talk to Push starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("config: failed to load settings ({e:#}); using defaults");
        AppConfig::default()
    });

    // 3. Keyboard hook
    let pressed = PressedKeys::new();
    let observer =
        InputObserver::start(pressed.clone()).context("failed to start the keyboard listener")?;

    // 4. Microphones
    let microphones = list_microphones().unwrap_or_else(|e| {
        log::warn!("audio: cannot list microphones: {e}");
        Vec::new()
    });
    for mic in &microphones {
        log::debug!("audio: input device {}: {}", mic.index, mic.name);
    }

    // 5. Engine
    let (hooks, status) = live_status();
    let engine = Engine::start(
        config.to_engine_config(),
        pressed,
        Arc::new(hooks),
        Backends::system,
    )
    .context("failed to start the activation engine")?;

    // 6. Settings window
    let app = SettingsApp::new(engine, status, observer, config, microphones);
    eframe::run_native(
        SETTINGS_WINDOW_TITLE,
        native_options(),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("settings window failed: {e}"))?;

    log::info!("Talk to Push stopped");
    Ok(())
}
