//! Synthetic key presses for the push-to-talk combo.
//!
//! # Overview
//!
//! [`press_combo`] sends key-down for every key of a combo in order;
//! [`release_combo`] sends key-up in reverse order.  Emulation is
//! fire-and-forget: a failed key event is logged and the remaining keys are
//! still sent, and the caller's state machine never depends on the outcome.
//!
//! # Usage
//!
//! ```no_run
//! use talk_to_push::hotkey::KeyCombo;
//! use talk_to_push::inject::{press_combo, release_combo, EnigoKeySender};
//!
//! let mut keys = EnigoKeySender::new().expect("no input backend");
//! let combo = KeyCombo::parse("ctrl + t");
//! press_combo(&mut keys, &combo);
//! release_combo(&mut keys, &combo);
//! ```

pub mod keyboard;

pub use keyboard::EnigoKeySender;

use thiserror::Error;

use crate::hotkey::{KeyCombo, KeyId};

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// All errors that can surface while synthesising key events.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The platform input backend could not be initialised.
    #[error("cannot initialise key emulation: {0}")]
    Backend(String),

    /// This key has no equivalent on the current platform.
    #[error("key '{0}' cannot be emulated on this platform")]
    Unsupported(KeyId),

    /// The backend rejected a key event.
    #[error("cannot simulate key '{key}': {reason}")]
    KeySimulation { key: KeyId, reason: String },
}

// ---------------------------------------------------------------------------
// KeySender
// ---------------------------------------------------------------------------

/// Low-level key-down / key-up sink.
pub trait KeySender {
    fn key_down(&mut self, key: KeyId) -> Result<(), InjectError>;
    fn key_up(&mut self, key: KeyId) -> Result<(), InjectError>;
}

/// Used when no input backend is available; every event fails.
pub struct DisabledKeySender {
    reason: String,
}

impl DisabledKeySender {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl KeySender for DisabledKeySender {
    fn key_down(&mut self, _key: KeyId) -> Result<(), InjectError> {
        Err(InjectError::Backend(self.reason.clone()))
    }

    fn key_up(&mut self, _key: KeyId) -> Result<(), InjectError> {
        Err(InjectError::Backend(self.reason.clone()))
    }
}

/// Key-down for every key of `combo`, in combo order.
pub fn press_combo(sender: &mut dyn KeySender, combo: &KeyCombo) {
    for key in combo.iter() {
        if let Err(e) = sender.key_down(*key) {
            log::warn!("inject: press failed: {e}");
        }
    }
}

/// Key-up for every key of `combo`, in reverse combo order.
pub fn release_combo(sender: &mut dyn KeySender, combo: &KeyCombo) {
    for key in combo.iter().rev() {
        if let Err(e) = sender.key_up(*key) {
            log::warn!("inject: release failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::SpecialKey;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(bool, KeyId)>,
        fail_on: Option<KeyId>,
    }

    impl KeySender for Recorder {
        fn key_down(&mut self, key: KeyId) -> Result<(), InjectError> {
            self.events.push((true, key));
            match self.fail_on {
                Some(bad) if bad == key => Err(InjectError::Unsupported(key)),
                _ => Ok(()),
            }
        }

        fn key_up(&mut self, key: KeyId) -> Result<(), InjectError> {
            self.events.push((false, key));
            Ok(())
        }
    }

    #[test]
    fn press_is_forward_release_is_reverse() {
        let mut rec = Recorder::default();
        let combo = KeyCombo::parse("ctrl + shift + t");

        press_combo(&mut rec, &combo);
        release_combo(&mut rec, &combo);

        let ctrl = KeyId::Special(SpecialKey::Ctrl);
        let shift = KeyId::Special(SpecialKey::Shift);
        let t = KeyId::Char('t');
        assert_eq!(
            rec.events,
            vec![
                (true, ctrl),
                (true, shift),
                (true, t),
                (false, t),
                (false, shift),
                (false, ctrl),
            ]
        );
    }

    #[test]
    fn failed_key_does_not_stop_the_rest() {
        let mut rec = Recorder {
            fail_on: Some(KeyId::Char('a')),
            ..Default::default()
        };
        press_combo(&mut rec, &KeyCombo::parse("a + b"));
        assert_eq!(rec.events.len(), 2);
    }

    #[test]
    fn disabled_sender_always_fails() {
        let mut keys = DisabledKeySender::new("no display");
        assert!(keys.key_down(KeyId::Char('t')).is_err());
        assert!(keys.key_up(KeyId::Char('t')).is_err());
        // Fire-and-forget helpers swallow the errors.
        press_combo(&mut keys, &KeyCombo::parse("t"));
    }
}
