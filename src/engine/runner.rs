//! The activation loop driver.
//!
//! One cycle:
//!
//! ```text
//! Gate::evaluate ──Skip──▶ discard queued audio, sleep GATED_PAUSE
//!      │ Proceed
//!      ▼
//! LevelSource::read_level ──Err──▶ warn, discard, sleep GATED_PAUSE
//!      │ level
//!      ├─▶ hooks.on_level_update
//!      ▼
//! ActivationState::observe ──Started──▶ press combo, fade speaker
//!                          ──Stopped──▶ release combo, restore speaker
//!      ▼
//! hooks.on_indicator_update ──▶ sleep CYCLE_PAUSE
//! ```

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::audio::{LevelSource, MicSampler};
use crate::hotkey::{KeyCombo, PressedKeys};
use crate::inject::{press_combo, release_combo, DisabledKeySender, EnigoKeySender, KeySender};
use crate::volume::VolumeController;
use crate::window::{SystemWindowProbe, WindowProbe};

use super::gate::{Gate, GateDecision};
use super::state::{ActivationState, Transition};
use super::{Command, EngineConfig, EngineHooks};

/// Pause after a sampled cycle.
pub const CYCLE_PAUSE: Duration = Duration::from_millis(10);

/// Pause after a gated cycle or a failed read.
pub const GATED_PAUSE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Every device the loop drives.  Built on the loop thread.
pub struct Backends {
    pub source: Box<dyn LevelSource>,
    pub keys: Box<dyn KeySender>,
    pub volume: VolumeController,
    pub window: Box<dyn WindowProbe>,
}

impl Backends {
    /// cpal microphone, enigo keys, system volume and window title.
    ///
    /// Missing key emulation or volume control degrade to no-ops with an
    /// error in the log; the loop still runs.
    pub fn system() -> Self {
        let keys: Box<dyn KeySender> = match EnigoKeySender::new() {
            Ok(keys) => Box::new(keys),
            Err(e) => {
                log::error!("engine: {e}; push-to-talk keys will not be sent");
                Box::new(DisabledKeySender::new(e.to_string()))
            }
        };

        Self {
            source: Box::new(MicSampler::new()),
            keys,
            volume: VolumeController::system(),
            window: Box::new(SystemWindowProbe::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// ActivationLoop
// ---------------------------------------------------------------------------

pub struct ActivationLoop {
    backends: Backends,
    config: watch::Receiver<Arc<EngineConfig>>,
    pressed: PressedKeys,
    hooks: Arc<dyn EngineHooks>,
    gate: Gate,
    state: ActivationState,
    /// The combo actually pressed, released on stop or shutdown.
    held: Option<KeyCombo>,
    clock: Box<dyn Fn() -> Instant>,
}

impl ActivationLoop {
    pub fn new(
        backends: Backends,
        config: watch::Receiver<Arc<EngineConfig>>,
        pressed: PressedKeys,
        hooks: Arc<dyn EngineHooks>,
    ) -> Self {
        Self {
            backends,
            config,
            pressed,
            hooks,
            gate: Gate::new(),
            state: ActivationState::new(),
            held: None,
            clock: Box::new(Instant::now),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Fn() -> Instant + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    pub fn is_muted(&self) -> bool {
        self.gate.is_muted()
    }

    /// Run cycles until a shutdown command arrives or every [`super::Engine`]
    /// handle is gone, then clean up.
    pub(crate) fn run(mut self, commands: mpsc::Receiver<Command>) {
        loop {
            let pause = self.run_cycle();
            match commands.recv_timeout(pause) {
                Ok(Command::SwitchMicrophone { index, reply }) => {
                    let result = self.backends.source.open(index);
                    match &result {
                        Ok(()) => log::info!("engine: switched to microphone {index}"),
                        Err(e) => log::warn!("engine: microphone {index} unavailable: {e}"),
                    }
                    let _ = reply.send(result);
                }
                Ok(Command::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }
        self.shutdown();
    }

    /// One pass of gate → sample → state machine → indicator.  Returns how
    /// long to wait before the next pass.
    pub fn run_cycle(&mut self) -> Duration {
        let config = self.config.borrow().clone();

        let settings_focused = match self.gate.evaluate(
            &config,
            &self.pressed,
            self.backends.window.as_ref(),
            &mut self.backends.volume,
        ) {
            GateDecision::Proceed { settings_focused } => settings_focused,
            GateDecision::Skip(_) => {
                self.backends.source.discard_pending();
                return GATED_PAUSE;
            }
        };

        let level = match self.backends.source.read_level() {
            Ok(level) => level,
            Err(e) => {
                log::warn!("engine: microphone read failed: {e}");
                self.backends.source.discard_pending();
                return GATED_PAUSE;
            }
        };
        self.hooks.on_level_update(level);

        let now = (self.clock)();
        let transition = self.state.observe(
            level,
            now,
            config.volume_threshold,
            config.post_release_delay,
        );
        match transition {
            Transition::Started if !settings_focused => self.start_talking(&config),
            Transition::Stopped if !settings_focused => self.stop_talking(&config),
            _ => {}
        }

        self.hooks
            .on_indicator_update(self.state.indicator(now, config.post_release_delay));
        CYCLE_PAUSE
    }

    fn start_talking(&mut self, config: &EngineConfig) {
        log::debug!("engine: speech detected, pressing '{}'", config.ptt_combo);
        if self.held.is_none() {
            press_combo(self.backends.keys.as_mut(), &config.ptt_combo);
            self.held = Some(config.ptt_combo.clone());
        }
        if config.fade_enabled {
            if let Err(e) = self.backends.volume.fade_speaker(config.fade_percent) {
                log::warn!("engine: fade failed: {e}");
            }
        }
    }

    fn stop_talking(&mut self, config: &EngineConfig) {
        if let Some(combo) = self.held.take() {
            log::debug!("engine: silence, releasing '{combo}'");
            release_combo(self.backends.keys.as_mut(), &combo);
        }
        if config.fade_enabled {
            if let Err(e) = self.backends.volume.restore_fade() {
                log::warn!("engine: restoring speaker volume failed: {e}");
            }
        }
    }

    /// Release held keys, restore stored volumes and close the microphone.
    /// Failures are logged and skipped.
    fn shutdown(&mut self) {
        if let Some(combo) = self.held.take() {
            log::info!("engine: releasing '{combo}' on shutdown");
            release_combo(self.backends.keys.as_mut(), &combo);
        }
        self.backends.volume.restore_outstanding();
        self.backends.source.close();
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
