//! Idle / Talking state machine with a post-speech grace window.

use std::time::{Duration, Instant};

/// Whether the push-to-talk combo is logically engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Talking,
}

/// Result of feeding one level into [`ActivationState::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Idle → Talking: press the combo.
    Started,
    /// Talking → Idle: release the combo.
    Stopped,
}

/// Owned by the activation loop; never shared.
#[derive(Debug, Clone, Default)]
pub struct ActivationState {
    phase: Phase,
    last_above_threshold: Option<Instant>,
}

impl ActivationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_talking(&self) -> bool {
        self.phase == Phase::Talking
    }

    pub fn last_above_threshold(&self) -> Option<Instant> {
        self.last_above_threshold
    }

    /// Advance the machine with one level reading taken at `now`.
    ///
    /// A level strictly above `threshold` refreshes the timestamp and starts
    /// talking.  Talking stops once the time since the last loud reading
    /// strictly exceeds `delay`.
    pub fn observe(
        &mut self,
        level: f32,
        now: Instant,
        threshold: i32,
        delay: Duration,
    ) -> Transition {
        if level > threshold as f32 {
            self.last_above_threshold = Some(now);
            if self.phase == Phase::Idle {
                self.phase = Phase::Talking;
                return Transition::Started;
            }
            return Transition::None;
        }

        if self.phase == Phase::Talking && !self.within_grace(now, delay) {
            self.phase = Phase::Idle;
            return Transition::Stopped;
        }
        Transition::None
    }

    /// Indicator lamp: on while talking or inside the grace window.
    pub fn indicator(&self, now: Instant, delay: Duration) -> bool {
        self.is_talking() || self.within_grace(now, delay)
    }

    fn within_grace(&self, now: Instant, delay: Duration) -> bool {
        match self.last_above_threshold {
            Some(at) => now.saturating_duration_since(at) <= delay,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
