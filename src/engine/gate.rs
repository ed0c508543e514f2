//! Per-cycle gating: mute toggle, active window, ignore keys.
//!
//! Stages run in that order and each may end the cycle early.  Only a
//! [`GateDecision::Proceed`] lets the loop read audio.

use crate::hotkey::PressedKeys;
use crate::volume::VolumeController;
use crate::window::{is_settings_window, WindowProbe};

use super::EngineConfig;

/// Why a cycle was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The mute combo is held; mute was toggled this cycle.
    MuteToggled,
    /// No allowed fragment occurs in the focused window's title.
    WindowNotAllowed,
    /// A key of the ignore combo is held.
    IgnoreKeyHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Sample audio and run the state machine.  While the settings window is
    /// focused, key emulation and fade are suppressed.
    Proceed { settings_focused: bool },
    Skip(SkipReason),
}

/// Speaker + microphone mute, flipped each cycle the mute combo is held.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuteToggle {
    muted: bool,
}

impl MuteToggle {
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Flip and return the new state.
    pub fn toggle(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }
}

/// Substring match of any fragment against an already lowercased title.
/// An empty fragment matches every title.
pub fn window_allows(title: &str, fragments: &[String]) -> bool {
    fragments.iter().any(|fragment| title.contains(fragment.as_str()))
}

/// The gating pipeline.  Owns the mute state.
#[derive(Debug, Default)]
pub struct Gate {
    mute: MuteToggle,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_muted(&self) -> bool {
        self.mute.is_muted()
    }

    /// Run all stages for one cycle.
    ///
    /// The mute stage is level-triggered: holding the combo across several
    /// cycles toggles once per cycle.
    pub fn evaluate(
        &mut self,
        config: &EngineConfig,
        pressed: &PressedKeys,
        window: &dyn WindowProbe,
        volume: &mut VolumeController,
    ) -> GateDecision {
        if config.mute_enabled && pressed.all_pressed(&config.mute_combo) {
            self.toggle_mute(volume);
            return GateDecision::Skip(SkipReason::MuteToggled);
        }

        let title = window.active_title();
        let settings_focused = is_settings_window(&title);
        if !settings_focused && !window_allows(&title, &config.allowed_window_fragments) {
            return GateDecision::Skip(SkipReason::WindowNotAllowed);
        }

        if config.ignore_enabled && pressed.any_pressed(&config.ignore_combo) {
            log::debug!("engine: ignore key held, skipping cycle");
            return GateDecision::Skip(SkipReason::IgnoreKeyHeld);
        }

        GateDecision::Proceed { settings_focused }
    }

    fn toggle_mute(&mut self, volume: &mut VolumeController) {
        if self.mute.toggle() {
            match volume.mute_all() {
                Ok(()) => log::info!("engine: speakers and microphone muted"),
                Err(e) => log::warn!("engine: mute failed: {e}"),
            }
        } else {
            match volume.unmute_all() {
                Ok(()) => log::info!("engine: speakers and microphone unmuted"),
                Err(e) => log::warn!("engine: unmute failed: {e}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
