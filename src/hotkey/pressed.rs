//! Thread-shared set of currently held keys.
//!
//! Written by the `hotkey-listener` thread, read by the activation loop every
//! cycle.  A released key lingers for a short debounce window before it stops
//! counting as pressed; a re-press inside that window cancels the release.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{KeyCombo, KeyId};

/// How long a released key still reads as pressed.
pub const RELEASE_DEBOUNCE: Duration = Duration::from_millis(10);

/// `None` = held, `Some(t)` = released at `t`, removal pending.
type KeyTable = HashMap<KeyId, Option<Instant>>;

/// Cheap-to-clone handle to the pressed-key set.
#[derive(Debug, Clone)]
pub struct PressedKeys {
    keys: Arc<Mutex<KeyTable>>,
    debounce: Duration,
}

impl Default for PressedKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::with_debounce(RELEASE_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashMap::new())),
            debounce,
        }
    }

    fn table(&self) -> MutexGuard<'_, KeyTable> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a key-down.
    pub fn press(&self, key: KeyId) {
        self.table().insert(key, None);
    }

    /// Record a key-up; the key stops counting as pressed after the debounce.
    pub fn release(&self, key: KeyId) {
        self.release_at(key, Instant::now());
    }

    pub(crate) fn release_at(&self, key: KeyId, now: Instant) {
        let mut table = self.table();
        Self::purge(&mut table, now, self.debounce);
        if let Some(state) = table.get_mut(&key) {
            *state = Some(now);
        }
    }

    fn purge(table: &mut KeyTable, now: Instant, debounce: Duration) {
        table.retain(|_, released| match released {
            Some(at) => now.saturating_duration_since(*at) < debounce,
            None => true,
        });
    }

    fn is_live(state: &Option<Instant>, now: Instant, debounce: Duration) -> bool {
        match state {
            None => true,
            Some(at) => now.saturating_duration_since(*at) < debounce,
        }
    }

    pub fn contains(&self, key: &KeyId) -> bool {
        self.contains_at(key, Instant::now())
    }

    pub(crate) fn contains_at(&self, key: &KeyId, now: Instant) -> bool {
        self.table()
            .get(key)
            .is_some_and(|state| Self::is_live(state, now, self.debounce))
    }

    /// `true` when every key of `combo` is held.  An empty combo never matches.
    pub fn all_pressed(&self, combo: &KeyCombo) -> bool {
        let now = Instant::now();
        !combo.is_empty() && combo.iter().all(|key| self.contains_at(key, now))
    }

    /// `true` when at least one key of `combo` is held.
    pub fn any_pressed(&self, combo: &KeyCombo) -> bool {
        let now = Instant::now();
        combo.iter().any(|key| self.contains_at(key, now))
    }

    /// Keys currently counting as pressed, in no particular order.
    pub fn snapshot(&self) -> Vec<KeyId> {
        let now = Instant::now();
        self.table()
            .iter()
            .filter(|(_, state)| Self::is_live(state, now, self.debounce))
            .map(|(key, _)| *key)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::SpecialKey;

    #[test]
    fn press_and_release_without_debounce() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        keys.press(KeyId::Char('m'));
        assert!(keys.contains(&KeyId::Char('m')));

        keys.release(KeyId::Char('m'));
        assert!(!keys.contains(&KeyId::Char('m')));
        assert!(keys.snapshot().is_empty());
    }

    #[test]
    fn released_key_lingers_for_debounce() {
        let keys = PressedKeys::with_debounce(Duration::from_millis(10));
        let t0 = Instant::now();
        keys.press(KeyId::Char('t'));
        keys.release_at(KeyId::Char('t'), t0);

        assert!(keys.contains_at(&KeyId::Char('t'), t0 + Duration::from_millis(5)));
        assert!(!keys.contains_at(&KeyId::Char('t'), t0 + Duration::from_millis(10)));
    }

    #[test]
    fn repress_cancels_pending_release() {
        let keys = PressedKeys::with_debounce(Duration::from_millis(10));
        let t0 = Instant::now();
        keys.press(KeyId::Char('t'));
        keys.release_at(KeyId::Char('t'), t0);
        keys.press(KeyId::Char('t'));

        assert!(keys.contains_at(&KeyId::Char('t'), t0 + Duration::from_secs(1)));
    }

    #[test]
    fn release_of_unknown_key_is_ignored() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        keys.release(KeyId::Char('x'));
        assert!(keys.snapshot().is_empty());
    }

    #[test]
    fn all_pressed_requires_every_key() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        let combo = KeyCombo::parse("ctrl + m");
        keys.press(KeyId::Char('m'));
        assert!(!keys.all_pressed(&combo));

        keys.press(KeyId::Special(SpecialKey::Ctrl));
        assert!(keys.all_pressed(&combo));
    }

    #[test]
    fn any_pressed_matches_single_key() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        keys.press(KeyId::Char('v'));
        assert!(keys.any_pressed(&KeyCombo::parse("v + b")));
        assert!(!keys.any_pressed(&KeyCombo::parse("x + y")));
    }

    #[test]
    fn empty_combo_never_matches() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        keys.press(KeyId::Char('m'));
        assert!(!keys.all_pressed(&KeyCombo::default()));
        assert!(!keys.any_pressed(&KeyCombo::default()));
    }

    #[test]
    fn uppercase_char_matches_lowercase_press() {
        let keys = PressedKeys::with_debounce(Duration::ZERO);
        keys.press(KeyId::Char('t'));
        assert!(keys.all_pressed(&KeyCombo::parse("T")));
    }

    #[test]
    fn pressed_keys_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PressedKeys>();
    }
}
