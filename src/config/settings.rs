//! Persisted settings, defaults and TOML persistence.
//!
//! Key combos and window fragments are stored as the text the user typed
//! (`"ctrl + t"`, `"squad, company"`) and only parsed by
//! [`AppConfig::to_engine_config`].

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::engine::EngineConfig;
use crate::hotkey::KeyCombo;

// ---------------------------------------------------------------------------
// ActivationConfig
// ---------------------------------------------------------------------------

/// When speech counts as speech, and from which microphone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Mean absolute sample level (raw 16-bit units) above which the user is
    /// talking.
    pub volume_threshold: i32,
    /// Milliseconds of silence before the push-to-talk keys are released.
    pub post_voice_release_delay_ms: u64,
    /// Index into the host's input device list.
    pub microphone_index: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 700,
            post_voice_release_delay_ms: 800,
            microphone_index: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// KeysConfig
// ---------------------------------------------------------------------------

/// Push-to-talk and ignore combos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Combo pressed while talking (e.g. `"t"`, `"ctrl + t"`).
    pub ptt: String,
    /// Skip activation while any key of `ignore` is held.
    pub ignore_enabled: bool,
    pub ignore: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            ptt: "t".into(),
            ignore_enabled: false,
            ignore: "v + b".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// WindowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Comma-separated title fragments; activation only runs while the
    /// focused window's title contains one of them (case-insensitive).
    pub allowed_fragments: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            allowed_fragments: "squad, company".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SoundConfig
// ---------------------------------------------------------------------------

/// Speaker fade while talking and the mute-all hotkey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub fade_enabled: bool,
    /// Percent of the current speaker volume removed while talking.
    pub fade_percent: u8,
    pub mute_enabled: bool,
    /// Combo that toggles speaker + microphone mute.
    pub mute_keys: String,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            fade_enabled: false,
            fade_percent: 90,
            mute_enabled: false,
            mute_keys: "m".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use talk_to_push::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// let engine_config = config.to_engine_config();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub activation: ActivationConfig,
    pub keys: KeysConfig,
    pub window: WindowConfig,
    pub sound: SoundConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Lowercased, trimmed window fragments.
    pub fn window_fragments(&self) -> Vec<String> {
        self.window
            .allowed_fragments
            .split(',')
            .map(|fragment| fragment.trim().to_lowercase())
            .collect()
    }

    /// Build the engine's snapshot.  Unknown key tokens are logged and
    /// skipped; the fade percentage is clamped to 100.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            volume_threshold: self.activation.volume_threshold,
            ptt_combo: KeyCombo::parse(&self.keys.ptt),
            allowed_window_fragments: self.window_fragments(),
            post_release_delay: Duration::from_millis(self.activation.post_voice_release_delay_ms),
            microphone_index: self.activation.microphone_index,
            ignore_enabled: self.keys.ignore_enabled,
            ignore_combo: KeyCombo::parse(&self.keys.ignore),
            fade_enabled: self.sound.fade_enabled,
            fade_percent: self.sound.fade_percent.min(100),
            mute_enabled: self.sound.mute_enabled,
            mute_combo: KeyCombo::parse(&self.sound.mute_keys),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut original = AppConfig::default();
        original.activation.volume_threshold = 1234;
        original.keys.ptt = "ctrl + t".into();
        original.sound.fade_enabled = true;
        original.sound.fade_percent = 40;
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("settings.toml");

        AppConfig::default().save_to(&path).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[activation]\nvolume_threshold = 350\n").unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.activation.volume_threshold, 350);
        assert_eq!(config.activation.post_voice_release_delay_ms, 800);
        assert_eq!(config.keys, KeysConfig::default());
        assert_eq!(config.sound, SoundConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[activation\nvolume_threshold = ").unwrap();

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn defaults_become_default_engine_config() {
        assert_eq!(AppConfig::default().to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn fragments_are_trimmed_and_lowercased() {
        let mut config = AppConfig::default();
        config.window.allowed_fragments = " Squad ,COMPANY of Heroes,arma".into();
        assert_eq!(
            config.window_fragments(),
            vec!["squad", "company of heroes", "arma"]
        );
    }

    #[test]
    fn fade_percent_is_clamped() {
        let mut config = AppConfig::default();
        config.sound.fade_percent = 250;
        assert_eq!(config.to_engine_config().fade_percent, 100);
    }

    #[test]
    fn combos_are_parsed() {
        let mut config = AppConfig::default();
        config.keys.ptt = "shift + t".into();
        config.sound.mute_keys = "ctrl+m".into();
        let engine = config.to_engine_config();
        assert_eq!(engine.ptt_combo.to_string(), "shift + t");
        assert_eq!(engine.mute_combo.to_string(), "ctrl + m");
    }
}
