//! Dedicated OS-thread keyboard observer using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread and
//! may only be installed once per process.  [`InputObserver`] owns that
//! thread, keeps a [`PressedKeys`] set current, and hands the next key event
//! to any one-shot subscribers (see [`crate::hotkey::capture_one`]).
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  [`InputObserver::stop`]
//! sets a flag so the callback ignores further events, but the OS thread
//! itself stays blocked in the rdev event loop until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex, PoisonError,
};

use super::{KeyId, PressedKeys};

// ---------------------------------------------------------------------------
// KeyEvent
// ---------------------------------------------------------------------------

/// A key transition as seen by one-shot subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(KeyId),
    Up(KeyId),
}

type Subscribers = Arc<Mutex<Vec<mpsc::Sender<KeyEvent>>>>;

// ---------------------------------------------------------------------------
// InputObserver
// ---------------------------------------------------------------------------

/// Handle to the running keyboard observer.  Clones share the same hook.
#[derive(Clone)]
pub struct InputObserver {
    pressed: PressedKeys,
    subscribers: Subscribers,
    stop: Arc<AtomicBool>,
}

impl InputObserver {
    /// Spawn the `hotkey-listener` thread feeding `pressed`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the OS refuses to create the thread.
    pub fn start(pressed: PressedKeys) -> std::io::Result<Self> {
        let observer = Self::detached(pressed);
        let callback_side = observer.clone();

        std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| callback_side.handle(&event.event_type));

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                }
            })?;

        log::info!("hotkey-listener: global keyboard hook installed");
        Ok(observer)
    }

    /// An observer with no hook thread; events are fed through
    /// [`handle`](Self::handle).
    pub(crate) fn detached(pressed: PressedKeys) -> Self {
        Self {
            pressed,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The pressed-key set this observer maintains.
    pub fn pressed(&self) -> &PressedKeys {
        &self.pressed
    }

    /// Register for the next key event.  The sender is dropped after one
    /// event has been delivered.
    pub fn subscribe_once(&self) -> mpsc::Receiver<KeyEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop updating the pressed set and notifying subscribers.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn handle(&self, event: &rdev::EventType) {
        if self.stop.load(Ordering::Relaxed) {
            return;
        }

        let key_event = match *event {
            rdev::EventType::KeyPress(k) => KeyId::from_rdev(k).map(KeyEvent::Down),
            rdev::EventType::KeyRelease(k) => KeyId::from_rdev(k).map(KeyEvent::Up),
            _ => None,
        };
        let Some(key_event) = key_event else {
            return;
        };

        match key_event {
            KeyEvent::Down(key) => self.pressed.press(key),
            KeyEvent::Up(key) => self.pressed.release(key),
        }

        let waiting = std::mem::take(
            &mut *self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for tx in waiting {
            // The subscriber may have given up waiting.
            let _ = tx.send(key_event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
