//! Key identifiers, key combinations and the global keyboard observer.
//!
//! # Combo strings
//!
//! Combos are written as key names joined by `+`, e.g. `"ctrl + t"` or
//! `"f + r + y + 1 + page_down + ctrl_r"`.  Each token is resolved against the
//! named special keys first and otherwise taken as a single literal character.
//!
//! ```
//! use talk_to_push::hotkey::{KeyCombo, KeyId, SpecialKey};
//!
//! let combo = KeyCombo::parse("t + shift");
//! assert_eq!(combo.keys(), &[KeyId::Char('t'), KeyId::Special(SpecialKey::Shift)]);
//!
//! // Formatting lists special keys before characters.
//! assert_eq!(combo.to_string(), "shift + t");
//! ```
//!
//! # Observer
//!
//! [`InputObserver`] owns the single `rdev` hook of the process and keeps a
//! [`PressedKeys`] set current.  [`capture_one`] borrows the same hook to
//! record the next key the user presses.

pub mod capture;
pub mod listener;
pub mod pressed;

pub use capture::capture_one;
pub use listener::{InputObserver, KeyEvent};
pub use pressed::PressedKeys;

use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

// ---------------------------------------------------------------------------
// KeyParseError
// ---------------------------------------------------------------------------

/// A combo token that is neither a special key name nor a single character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key name in combo '{0}'")]
    EmptyToken(String),

    #[error("unknown key name '{0}'")]
    UnknownToken(String),
}

// ---------------------------------------------------------------------------
// SpecialKey
// ---------------------------------------------------------------------------

/// Named non-character keys.
///
/// Unsided modifier names stand for the left-hand key, so `ctrl` and
/// `ctrl_l` are the same key while `ctrl_r` is a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Alt,
    AltGr,
    Backspace,
    CapsLock,
    Cmd,
    CmdR,
    Ctrl,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    /// F1 – F20.
    Function(u8),
    Home,
    Insert,
    Left,
    MediaNext,
    MediaPlayPause,
    MediaPrevious,
    MediaVolumeDown,
    MediaVolumeMute,
    MediaVolumeUp,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Shift,
    ShiftR,
    Space,
    Tab,
    Up,
}

/// Canonical names first; aliases after the canonical entry of the same key.
const SPECIAL_KEY_NAMES: &[(&str, SpecialKey)] = &[
    ("alt", SpecialKey::Alt),
    ("alt_l", SpecialKey::Alt),
    ("alt_gr", SpecialKey::AltGr),
    ("alt_r", SpecialKey::AltGr),
    ("backspace", SpecialKey::Backspace),
    ("caps_lock", SpecialKey::CapsLock),
    ("cmd", SpecialKey::Cmd),
    ("cmd_l", SpecialKey::Cmd),
    ("cmd_r", SpecialKey::CmdR),
    ("ctrl", SpecialKey::Ctrl),
    ("ctrl_l", SpecialKey::Ctrl),
    ("ctrl_r", SpecialKey::CtrlR),
    ("delete", SpecialKey::Delete),
    ("down", SpecialKey::Down),
    ("end", SpecialKey::End),
    ("enter", SpecialKey::Enter),
    ("esc", SpecialKey::Esc),
    ("home", SpecialKey::Home),
    ("insert", SpecialKey::Insert),
    ("left", SpecialKey::Left),
    ("media_next", SpecialKey::MediaNext),
    ("media_play_pause", SpecialKey::MediaPlayPause),
    ("media_previous", SpecialKey::MediaPrevious),
    ("media_volume_down", SpecialKey::MediaVolumeDown),
    ("media_volume_mute", SpecialKey::MediaVolumeMute),
    ("media_volume_up", SpecialKey::MediaVolumeUp),
    ("menu", SpecialKey::Menu),
    ("num_lock", SpecialKey::NumLock),
    ("page_down", SpecialKey::PageDown),
    ("page_up", SpecialKey::PageUp),
    ("pause", SpecialKey::Pause),
    ("print_screen", SpecialKey::PrintScreen),
    ("right", SpecialKey::Right),
    ("scroll_lock", SpecialKey::ScrollLock),
    ("shift", SpecialKey::Shift),
    ("shift_l", SpecialKey::Shift),
    ("shift_r", SpecialKey::ShiftR),
    ("space", SpecialKey::Space),
    ("tab", SpecialKey::Tab),
    ("up", SpecialKey::Up),
];

impl SpecialKey {
    /// Look up a key by name (case-insensitive), including `f1`..`f20`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();

        if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            return (1..=20).contains(&n).then_some(SpecialKey::Function(n));
        }

        SPECIAL_KEY_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, key)| *key)
    }

    /// Canonical lowercase name, as written back into combo strings.
    pub fn name(&self) -> String {
        if let SpecialKey::Function(n) = self {
            return format!("f{n}");
        }
        SPECIAL_KEY_NAMES
            .iter()
            .find(|(_, key)| key == self)
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// KeyId
// ---------------------------------------------------------------------------

/// A physical key: a named special key or a literal character.
///
/// Characters compare case-insensitively (`'T' == 't'`) but keep the case
/// they were created with.
#[derive(Debug, Clone, Copy)]
pub enum KeyId {
    Special(SpecialKey),
    Char(char),
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

impl PartialEq for KeyId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyId::Special(a), KeyId::Special(b)) => a == b,
            (KeyId::Char(a), KeyId::Char(b)) => fold_case(*a) == fold_case(*b),
            _ => false,
        }
    }
}

impl Eq for KeyId {}

impl Hash for KeyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            KeyId::Special(key) => {
                0u8.hash(state);
                key.hash(state);
            }
            KeyId::Char(c) => {
                1u8.hash(state);
                fold_case(*c).hash(state);
            }
        }
    }
}

impl KeyId {
    /// Resolve a single combo token.
    pub fn from_token(token: &str) -> Result<Self, KeyParseError> {
        let token = token.trim();
        if let Some(special) = SpecialKey::from_name(token) {
            return Ok(KeyId::Special(special));
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(KeyId::Char(c)),
            (None, _) => Err(KeyParseError::EmptyToken(token.to_string())),
            _ => Err(KeyParseError::UnknownToken(token.to_string())),
        }
    }

    /// Map an `rdev` key to a [`KeyId`].
    ///
    /// Character keys map to their unshifted lowercase character so that the
    /// press and the release of a key always produce the same id.  Returns
    /// `None` for keys with no stable identity (`Unknown`, `Function`).
    pub fn from_rdev(key: rdev::Key) -> Option<Self> {
        use rdev::Key as K;

        let special = match key {
            K::Alt => SpecialKey::Alt,
            K::AltGr => SpecialKey::AltGr,
            K::Backspace => SpecialKey::Backspace,
            K::CapsLock => SpecialKey::CapsLock,
            K::ControlLeft => SpecialKey::Ctrl,
            K::ControlRight => SpecialKey::CtrlR,
            K::Delete | K::KpDelete => SpecialKey::Delete,
            K::DownArrow => SpecialKey::Down,
            K::End => SpecialKey::End,
            K::Escape => SpecialKey::Esc,
            K::F1 => SpecialKey::Function(1),
            K::F2 => SpecialKey::Function(2),
            K::F3 => SpecialKey::Function(3),
            K::F4 => SpecialKey::Function(4),
            K::F5 => SpecialKey::Function(5),
            K::F6 => SpecialKey::Function(6),
            K::F7 => SpecialKey::Function(7),
            K::F8 => SpecialKey::Function(8),
            K::F9 => SpecialKey::Function(9),
            K::F10 => SpecialKey::Function(10),
            K::F11 => SpecialKey::Function(11),
            K::F12 => SpecialKey::Function(12),
            K::Home => SpecialKey::Home,
            K::Insert => SpecialKey::Insert,
            K::LeftArrow => SpecialKey::Left,
            K::MetaLeft => SpecialKey::Cmd,
            K::MetaRight => SpecialKey::CmdR,
            K::NumLock => SpecialKey::NumLock,
            K::PageDown => SpecialKey::PageDown,
            K::PageUp => SpecialKey::PageUp,
            K::Pause => SpecialKey::Pause,
            K::PrintScreen => SpecialKey::PrintScreen,
            K::Return | K::KpReturn => SpecialKey::Enter,
            K::RightArrow => SpecialKey::Right,
            K::ScrollLock => SpecialKey::ScrollLock,
            K::ShiftLeft => SpecialKey::Shift,
            K::ShiftRight => SpecialKey::ShiftR,
            K::Space => SpecialKey::Space,
            K::Tab => SpecialKey::Tab,
            K::UpArrow => SpecialKey::Up,
            other => return char_for_rdev(other).map(KeyId::Char),
        };
        Some(KeyId::Special(special))
    }
}

fn char_for_rdev(key: rdev::Key) -> Option<char> {
    use rdev::Key as K;

    let c = match key {
        K::KeyA => 'a',
        K::KeyB => 'b',
        K::KeyC => 'c',
        K::KeyD => 'd',
        K::KeyE => 'e',
        K::KeyF => 'f',
        K::KeyG => 'g',
        K::KeyH => 'h',
        K::KeyI => 'i',
        K::KeyJ => 'j',
        K::KeyK => 'k',
        K::KeyL => 'l',
        K::KeyM => 'm',
        K::KeyN => 'n',
        K::KeyO => 'o',
        K::KeyP => 'p',
        K::KeyQ => 'q',
        K::KeyR => 'r',
        K::KeyS => 's',
        K::KeyT => 't',
        K::KeyU => 'u',
        K::KeyV => 'v',
        K::KeyW => 'w',
        K::KeyX => 'x',
        K::KeyY => 'y',
        K::KeyZ => 'z',
        K::Num0 | K::Kp0 => '0',
        K::Num1 | K::Kp1 => '1',
        K::Num2 | K::Kp2 => '2',
        K::Num3 | K::Kp3 => '3',
        K::Num4 | K::Kp4 => '4',
        K::Num5 | K::Kp5 => '5',
        K::Num6 | K::Kp6 => '6',
        K::Num7 | K::Kp7 => '7',
        K::Num8 | K::Kp8 => '8',
        K::Num9 | K::Kp9 => '9',
        K::BackQuote => '`',
        K::Minus | K::KpMinus => '-',
        K::Equal => '=',
        K::KpPlus => '+',
        K::KpMultiply => '*',
        K::LeftBracket => '[',
        K::RightBracket => ']',
        K::SemiColon => ';',
        K::Quote => '\'',
        K::BackSlash | K::IntlBackslash => '\\',
        K::Comma => ',',
        K::Dot => '.',
        K::Slash | K::KpDivide => '/',
        _ => return None,
    };
    Some(c)
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Special(key) => f.write_str(&key.name()),
            KeyId::Char(c) => write!(f, "{c}"),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyCombo
// ---------------------------------------------------------------------------

/// Ordered list of keys pressed together.  Never contains duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCombo {
    keys: Vec<KeyId>,
}

impl KeyCombo {
    /// Build a combo from keys, dropping repeats (first occurrence wins).
    pub fn new(keys: impl IntoIterator<Item = KeyId>) -> Self {
        let mut combo = Self::default();
        for key in keys {
            if !combo.keys.contains(&key) {
                combo.keys.push(key);
            }
        }
        combo
    }

    /// Strict parse: the first unrecognised token is an error.
    ///
    /// Used by the settings window to reject typos before they are saved.
    pub fn try_parse(text: &str) -> Result<Self, KeyParseError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        split_tokens(text)
            .into_iter()
            .map(|token| match KeyId::from_token(token) {
                Err(KeyParseError::EmptyToken(_)) => {
                    Err(KeyParseError::EmptyToken(text.to_string()))
                }
                other => other,
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Lenient parse: unrecognised tokens are logged and skipped.
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }
        Self::new(split_tokens(text).into_iter().filter_map(|token| {
            KeyId::from_token(token)
                .map_err(|e| log::warn!("hotkey: ignoring key in '{text}': {e}"))
                .ok()
        }))
    }

    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyId> {
        self.keys.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Split on `" + "`, then on a bare `+` inside longer tokens (`ctrl+t`).
/// A lone `+` is the plus key itself.
fn split_tokens(text: &str) -> Vec<&str> {
    text.split(" + ")
        .flat_map(|token| {
            let trimmed = token.trim();
            if trimmed.chars().count() > 1 && trimmed.contains('+') {
                trimmed.split('+').collect::<Vec<_>>()
            } else {
                vec![trimmed]
            }
        })
        .collect()
}

impl fmt::Display for KeyCombo {
    /// Special keys first, then characters, each group in combo order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let specials = self
            .keys
            .iter()
            .filter(|k| matches!(k, KeyId::Special(_)));
        let chars = self.keys.iter().filter(|k| matches!(k, KeyId::Char(_)));

        let names: Vec<String> = specials.chain(chars).map(KeyId::to_string).collect();
        f.write_str(&names.join(" + "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
