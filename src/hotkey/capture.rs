//! Record a single key from the user ("press the key you want").

use super::{InputObserver, KeyCombo, KeyEvent, KeyId};

/// Block until the next key event and return it as a one-key combo.
///
/// Characters are recorded lowercase.  If a key-up arrives before any
/// key-down (e.g. the user is still releasing the mouse-click modifier), or
/// the observer is stopped while waiting, the result is an empty combo.
///
/// Never call this on the activation loop or the UI thread; it waits for as
/// long as the user takes.
pub fn capture_one(observer: &InputObserver) -> KeyCombo {
    let rx = observer.subscribe_once();
    match rx.recv() {
        Ok(KeyEvent::Down(key)) => {
            let key = match key {
                KeyId::Char(c) => KeyId::Char(c.to_lowercase().next().unwrap_or(c)),
                special => special,
            };
            log::debug!("hotkey: captured '{key}'");
            KeyCombo::new([key])
        }
        Ok(KeyEvent::Up(_)) | Err(_) => KeyCombo::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{PressedKeys, SpecialKey};
    use std::time::Duration;

    /// Run `capture_one` on a worker thread, feed `events` once it has
    /// subscribed, and return what it captured.
    fn capture_with(events: Vec<rdev::EventType>) -> KeyCombo {
        let obs = InputObserver::detached(PressedKeys::with_debounce(Duration::ZERO));
        let feeder = obs.clone();

        let handle = std::thread::spawn(move || capture_one(&obs));
        while feeder.subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        for event in events {
            feeder.handle(&event);
        }
        handle.join().unwrap()
    }

    #[test]
    fn first_key_down_is_captured() {
        let combo = capture_with(vec![
            rdev::EventType::KeyPress(rdev::Key::ShiftLeft),
            rdev::EventType::KeyPress(rdev::Key::KeyT),
        ]);
        assert_eq!(combo.keys(), &[KeyId::Special(SpecialKey::Shift)]);
        assert_eq!(combo.to_string(), "shift");
    }

    #[test]
    fn char_key_is_captured_lowercase() {
        let combo = capture_with(vec![rdev::EventType::KeyPress(rdev::Key::KeyG)]);
        assert_eq!(combo.keys(), &[KeyId::Char('g')]);
        assert_eq!(combo.to_string(), "g");
    }

    #[test]
    fn key_up_first_yields_empty_combo() {
        let combo = capture_with(vec![rdev::EventType::KeyRelease(rdev::Key::KeyT)]);
        assert!(combo.is_empty());
    }

    #[test]
    fn stopped_observer_yields_empty_combo() {
        let obs = InputObserver::detached(PressedKeys::with_debounce(Duration::ZERO));
        let stopper = obs.clone();

        let handle = std::thread::spawn(move || capture_one(&obs));
        while stopper.subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        stopper.stop();
        assert!(handle.join().unwrap().is_empty());
    }
}
