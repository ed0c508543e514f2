//! The activation engine: microphone level → push-to-talk key emulation.
//!
//! # Architecture
//!
//! ```text
//! rdev hook thread ──▶ PressedKeys (Arc<Mutex<..>>) ◀── read every cycle
//!                                                        │
//! Engine handle ──apply_config──▶ watch<Arc<EngineConfig>> ──┤
//!               ──switch_microphone / shutdown──▶ mpsc ──────┤
//!                                                        ▼
//!                      "activation-loop" thread: ActivationLoop::run
//!                        gate → read level → state machine → hooks
//! ```
//!
//! Everything that touches a device (capture stream, key emulation, volume
//! endpoints) lives on the loop thread.  Other threads talk to it through
//! [`Engine`], so a device switch can never overlap a read and shutdown
//! never races a fade.

pub mod gate;
pub mod runner;
pub mod state;

pub use gate::{window_allows, Gate, GateDecision, MuteToggle, SkipReason};
pub use runner::{ActivationLoop, Backends};
pub use state::{ActivationState, Phase, Transition};

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::audio::CaptureError;
use crate::hotkey::{KeyCombo, PressedKeys};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// One complete, immutable set of tunables.
///
/// The loop takes a fresh `Arc<EngineConfig>` at the start of every cycle,
/// so an update is seen whole or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Levels strictly above this count as speech.
    pub volume_threshold: i32,
    pub ptt_combo: KeyCombo,
    /// Lowercase title fragments; the engine runs only while one matches.
    pub allowed_window_fragments: Vec<String>,
    pub post_release_delay: Duration,
    pub microphone_index: usize,
    pub ignore_enabled: bool,
    pub ignore_combo: KeyCombo,
    pub fade_enabled: bool,
    /// Speaker attenuation while talking, `0..=100`.
    pub fade_percent: u8,
    pub mute_enabled: bool,
    pub mute_combo: KeyCombo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 700,
            ptt_combo: KeyCombo::parse("t"),
            allowed_window_fragments: vec!["squad".into(), "company".into()],
            post_release_delay: Duration::from_millis(800),
            microphone_index: 0,
            ignore_enabled: false,
            ignore_combo: KeyCombo::parse("v + b"),
            fade_enabled: false,
            fade_percent: 90,
            mute_enabled: false,
            mute_combo: KeyCombo::parse("m"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Display callbacks, invoked on the loop thread once per sampled cycle.
pub trait EngineHooks: Send + Sync {
    fn on_level_update(&self, level: f32);
    fn on_indicator_update(&self, active: bool);
}

/// Hooks that publish the latest values through `watch` channels.
pub struct StatusHooks {
    level: watch::Sender<f32>,
    indicator: watch::Sender<bool>,
}

/// Receiving side of [`StatusHooks`].
#[derive(Clone)]
pub struct LiveStatus {
    level: watch::Receiver<f32>,
    indicator: watch::Receiver<bool>,
}

impl LiveStatus {
    pub fn level(&self) -> f32 {
        *self.level.borrow()
    }

    pub fn indicator(&self) -> bool {
        *self.indicator.borrow()
    }
}

/// A connected [`StatusHooks`] / [`LiveStatus`] pair.
pub fn live_status() -> (StatusHooks, LiveStatus) {
    let (level_tx, level_rx) = watch::channel(0.0);
    let (indicator_tx, indicator_rx) = watch::channel(false);
    (
        StatusHooks {
            level: level_tx,
            indicator: indicator_tx,
        },
        LiveStatus {
            level: level_rx,
            indicator: indicator_rx,
        },
    )
}

impl EngineHooks for StatusHooks {
    fn on_level_update(&self, level: f32) {
        self.level.send_replace(level);
    }

    fn on_indicator_update(&self, active: bool) {
        self.indicator.send_replace(active);
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the activation loop is not running")]
    Stopped,

    #[error("microphone switch failed: {0}")]
    Device(#[from] CaptureError),

    #[error("failed to spawn the activation loop: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Requests handled by the loop thread between cycles.
pub(crate) enum Command {
    SwitchMicrophone {
        index: usize,
        reply: mpsc::Sender<Result<(), CaptureError>>,
    },
    Shutdown,
}

/// Pending answer to [`Engine::request_microphone_switch`].
pub type SwitchReply = mpsc::Receiver<Result<(), CaptureError>>;

/// Handle to a running activation loop.
///
/// Dropping the handle shuts the loop down.
pub struct Engine {
    commands: mpsc::Sender<Command>,
    config: watch::Sender<Arc<EngineConfig>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Spawn the loop thread.
    ///
    /// `make_backends` runs on the new thread: audio streams, COM objects and
    /// input backends are not `Send` and must be created where they are used.
    /// The initial microphone is opened from `config.microphone_index`; if
    /// that fails the loop still runs and waits for a
    /// [`switch_microphone`](Self::switch_microphone).
    pub fn start<F>(
        config: EngineConfig,
        pressed: PressedKeys,
        hooks: Arc<dyn EngineHooks>,
        make_backends: F,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce() -> Backends + Send + 'static,
    {
        let (config_tx, config_rx) = watch::channel(Arc::new(config));
        let (command_tx, command_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("activation-loop".into())
            .spawn(move || {
                let mut backends = make_backends();
                let index = config_rx.borrow().microphone_index;
                if let Err(e) = backends.source.open(index) {
                    log::warn!("engine: cannot open microphone {index}: {e}");
                }
                ActivationLoop::new(backends, config_rx, pressed, hooks).run(command_rx);
            })?;

        log::info!("engine: activation loop started");
        Ok(Self {
            commands: command_tx,
            config: config_tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Replace the whole configuration.  Takes effect on the next cycle.
    pub fn apply_config(&self, config: EngineConfig) {
        log::info!(
            "engine: config applied (threshold {}, ptt '{}')",
            config.volume_threshold,
            config.ptt_combo
        );
        self.config.send_replace(Arc::new(config));
    }

    /// The configuration the loop currently sees.
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.borrow().clone()
    }

    /// Ask the loop to rebind to input device `index` without waiting.
    ///
    /// The switch runs between cycles, never during a read.  On failure the
    /// previous device stays open.
    pub fn request_microphone_switch(&self, index: usize) -> Result<SwitchReply, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.commands
            .send(Command::SwitchMicrophone { index, reply })
            .map_err(|_| EngineError::Stopped)?;
        Ok(rx)
    }

    /// Blocking form of [`request_microphone_switch`](Self::request_microphone_switch).
    pub fn switch_microphone(&self, index: usize) -> Result<(), EngineError> {
        let reply = self.request_microphone_switch(index)?;
        reply.recv().map_err(|_| EngineError::Stopped)??;
        Ok(())
    }

    /// Stop the loop and wait for it.  Held keys are released and stored
    /// volumes restored on the loop thread before it exits.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let _ = self.commands.send(Command::Shutdown);
        if handle.join().is_err() {
            log::error!("engine: activation loop panicked");
        } else {
            log::info!("engine: activation loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::runner::fakes::{FakeSource, FixedWindow, RecordingKeys};
    use super::*;
    use crate::hotkey::KeyId;
    use crate::volume::fake::MemoryEndpoint;
    use crate::volume::VolumeController;

    struct Fixture {
        source: FakeSource,
        keys: RecordingKeys,
        speaker: MemoryEndpoint,
    }

    fn start_engine(config: EngineConfig, fixture: &Fixture) -> (Engine, LiveStatus) {
        let (hooks, status) = live_status();
        let source = fixture.source.clone();
        let keys = fixture.keys.clone();
        let speaker = fixture.speaker.clone();
        let engine = Engine::start(config, PressedKeys::new(), Arc::new(hooks), move || Backends {
            source: Box::new(source),
            keys: Box::new(keys),
            volume: VolumeController::new(speaker.boxed(), None),
            window: Box::new(FixedWindow::new("squad - game")),
        })
        .unwrap();
        (engine, status)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn default_config_matches_factory_settings() {
        let config = EngineConfig::default();
        assert_eq!(config.volume_threshold, 700);
        assert_eq!(config.ptt_combo.to_string(), "t");
        assert_eq!(config.allowed_window_fragments, vec!["squad", "company"]);
        assert_eq!(config.post_release_delay, Duration::from_millis(800));
        assert_eq!(config.ignore_combo.to_string(), "v + b");
        assert_eq!(config.fade_percent, 90);
        assert_eq!(config.mute_combo.to_string(), "m");
    }

    #[test]
    fn opens_configured_microphone_on_start() {
        let fixture = Fixture {
            source: FakeSource::constant(0.0),
            keys: RecordingKeys::default(),
            speaker: MemoryEndpoint::new(1.0),
        };
        let config = EngineConfig {
            microphone_index: 3,
            ..EngineConfig::default()
        };
        let (engine, _) = start_engine(config, &fixture);
        wait_until(|| fixture.source.reads() > 0);
        assert_eq!(fixture.source.opened(), vec![3]);
        engine.shutdown();
        assert!(!engine.is_running());
    }

    #[test]
    fn switch_microphone_reports_result() {
        let fixture = Fixture {
            source: FakeSource::constant(0.0).with_device_count(2),
            keys: RecordingKeys::default(),
            speaker: MemoryEndpoint::new(1.0),
        };
        let (engine, _) = start_engine(EngineConfig::default(), &fixture);

        assert!(engine.switch_microphone(1).is_ok());
        assert!(matches!(
            engine.switch_microphone(7),
            Err(EngineError::Device(CaptureError::NoDevice(7)))
        ));
        assert_eq!(fixture.source.opened(), vec![0, 1, 7]);
        assert_eq!(fixture.source.current(), Some(1));

        engine.shutdown();
        assert!(matches!(
            engine.switch_microphone(0),
            Err(EngineError::Stopped)
        ));
    }

    #[test]
    fn apply_config_is_seen_whole() {
        let fixture = Fixture {
            source: FakeSource::constant(0.0),
            keys: RecordingKeys::default(),
            speaker: MemoryEndpoint::new(1.0),
        };
        let (engine, _) = start_engine(EngineConfig::default(), &fixture);
        let updated = EngineConfig {
            volume_threshold: 1200,
            ptt_combo: KeyCombo::parse("ctrl + k"),
            ..EngineConfig::default()
        };
        engine.apply_config(updated.clone());
        assert_eq!(*engine.config(), updated);
    }

    #[test]
    fn shutdown_releases_keys_and_restores_fade() {
        let fixture = Fixture {
            source: FakeSource::constant(2000.0),
            keys: RecordingKeys::default(),
            speaker: MemoryEndpoint::new(0.5),
        };
        let config = EngineConfig {
            fade_enabled: true,
            fade_percent: 50,
            ..EngineConfig::default()
        };
        let (engine, status) = start_engine(config, &fixture);

        wait_until(|| !fixture.keys.events().is_empty());
        wait_until(|| status.indicator());
        assert!(status.level() > 700.0);
        assert_eq!(fixture.speaker.get(), 0.25);

        engine.shutdown();
        assert_eq!(
            fixture.keys.events(),
            vec![(true, KeyId::Char('t')), (false, KeyId::Char('t'))]
        );
        assert_eq!(fixture.speaker.get(), 0.5);
        assert!(fixture.source.is_closed());
    }

    #[test]
    fn dropping_the_handle_stops_the_loop() {
        let fixture = Fixture {
            source: FakeSource::constant(0.0),
            keys: RecordingKeys::default(),
            speaker: MemoryEndpoint::new(1.0),
        };
        let (engine, _) = start_engine(EngineConfig::default(), &fixture);
        drop(engine);
        assert!(fixture.source.is_closed());
    }
}
