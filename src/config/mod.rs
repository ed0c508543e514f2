//! Configuration module for Talk to Push.
//!
//! Provides `AppConfig` (persisted settings, one section per concern),
//! `AppPaths` for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{ActivationConfig, AppConfig, KeysConfig, SoundConfig, WindowConfig};
