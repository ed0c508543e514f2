//! Key emulation backed by the `enigo` crate.
//!
//! | Key kind | enigo key |
//! |----------|-----------|
//! | character | `Key::Unicode(c)` |
//! | `ctrl` / `ctrl_r` | `Control` / `RControl` |
//! | `shift` / `shift_r` | `Shift` / `RShift` |
//! | `cmd` | `Meta` |
//! | `f1`..`f20` | `F1`..`F20` |

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::{InjectError, KeySender};
use crate::hotkey::{KeyId, SpecialKey};

/// [`KeySender`] that drives the OS input queue through `enigo`.
///
/// `Enigo` is not `Send`; create the sender on the thread that uses it.
pub struct EnigoKeySender {
    enigo: Enigo,
}

impl EnigoKeySender {
    /// # Errors
    ///
    /// Returns [`InjectError::Backend`] if enigo cannot connect to the
    /// platform input system (e.g. no display server).
    pub fn new() -> Result<Self, InjectError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InjectError::Backend(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn send(&mut self, key: KeyId, direction: Direction) -> Result<(), InjectError> {
        let mapped = enigo_key(key).ok_or(InjectError::Unsupported(key))?;
        self.enigo
            .key(mapped, direction)
            .map_err(|e| InjectError::KeySimulation {
                key,
                reason: e.to_string(),
            })
    }
}

impl KeySender for EnigoKeySender {
    fn key_down(&mut self, key: KeyId) -> Result<(), InjectError> {
        self.send(key, Direction::Press)
    }

    fn key_up(&mut self, key: KeyId) -> Result<(), InjectError> {
        self.send(key, Direction::Release)
    }
}

/// Translate a [`KeyId`] into the enigo key to synthesise.
pub fn enigo_key(key: KeyId) -> Option<Key> {
    let special = match key {
        KeyId::Char(c) => return Some(Key::Unicode(c.to_lowercase().next().unwrap_or(c))),
        KeyId::Special(special) => special,
    };

    let mapped = match special {
        SpecialKey::Alt => Key::Alt,
        #[cfg(target_os = "windows")]
        SpecialKey::AltGr => Key::RMenu,
        #[cfg(not(target_os = "windows"))]
        SpecialKey::AltGr => Key::Alt,
        SpecialKey::Backspace => Key::Backspace,
        SpecialKey::CapsLock => Key::CapsLock,
        SpecialKey::Cmd => Key::Meta,
        #[cfg(target_os = "windows")]
        SpecialKey::CmdR => Key::RWin,
        #[cfg(not(target_os = "windows"))]
        SpecialKey::CmdR => Key::Meta,
        SpecialKey::Ctrl => Key::Control,
        SpecialKey::CtrlR => Key::RControl,
        SpecialKey::Delete => Key::Delete,
        SpecialKey::Down => Key::DownArrow,
        SpecialKey::End => Key::End,
        SpecialKey::Enter => Key::Return,
        SpecialKey::Esc => Key::Escape,
        SpecialKey::Function(n) => function_key(n)?,
        SpecialKey::Home => Key::Home,
        SpecialKey::Left => Key::LeftArrow,
        SpecialKey::MediaNext => Key::MediaNextTrack,
        SpecialKey::MediaPlayPause => Key::MediaPlayPause,
        SpecialKey::MediaPrevious => Key::MediaPrevTrack,
        SpecialKey::MediaVolumeDown => Key::VolumeDown,
        SpecialKey::MediaVolumeMute => Key::VolumeMute,
        SpecialKey::MediaVolumeUp => Key::VolumeUp,
        SpecialKey::PageDown => Key::PageDown,
        SpecialKey::PageUp => Key::PageUp,
        SpecialKey::Right => Key::RightArrow,
        SpecialKey::Shift => Key::Shift,
        SpecialKey::ShiftR => Key::RShift,
        SpecialKey::Space => Key::Space,
        SpecialKey::Tab => Key::Tab,
        SpecialKey::Up => Key::UpArrow,
        #[cfg(not(target_os = "macos"))]
        SpecialKey::Insert => Key::Insert,
        #[cfg(not(target_os = "macos"))]
        SpecialKey::NumLock => Key::Numlock,
        #[cfg(not(target_os = "macos"))]
        SpecialKey::Pause => Key::Pause,
        #[cfg(not(target_os = "macos"))]
        SpecialKey::PrintScreen => Key::PrintScr,
        #[cfg(not(target_os = "macos"))]
        SpecialKey::ScrollLock => Key::ScrollLock,
        // Menu everywhere, lock/insert keys on macOS.
        _ => return None,
    };
    Some(mapped)
}

fn function_key(n: u8) -> Option<Key> {
    let key = match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        12 => Key::F12,
        13 => Key::F13,
        14 => Key::F14,
        15 => Key::F15,
        16 => Key::F16,
        17 => Key::F17,
        18 => Key::F18,
        19 => Key::F19,
        20 => Key::F20,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_map_to_lowercase_unicode() {
        assert_eq!(enigo_key(KeyId::Char('T')), Some(Key::Unicode('t')));
        assert_eq!(enigo_key(KeyId::Char('1')), Some(Key::Unicode('1')));
    }

    #[test]
    fn modifiers_map_to_sided_keys() {
        assert_eq!(enigo_key(KeyId::Special(SpecialKey::Ctrl)), Some(Key::Control));
        assert_eq!(enigo_key(KeyId::Special(SpecialKey::CtrlR)), Some(Key::RControl));
        assert_eq!(enigo_key(KeyId::Special(SpecialKey::ShiftR)), Some(Key::RShift));
    }

    #[test]
    fn function_keys_cover_f1_to_f20() {
        assert_eq!(
            enigo_key(KeyId::Special(SpecialKey::Function(20))),
            Some(Key::F20)
        );
        assert_eq!(enigo_key(KeyId::Special(SpecialKey::Function(21))), None);
    }

    #[test]
    fn menu_is_not_emulated() {
        assert_eq!(enigo_key(KeyId::Special(SpecialKey::Menu)), None);
    }
}
