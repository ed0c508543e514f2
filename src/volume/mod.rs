//! Master volume of the default speaker and microphone endpoints.
//!
//! [`VolumeController`] owns both endpoints plus the [`VolumeSnapshot`] of
//! values to put back later.  Fade touches the speaker only; mute zeroes
//! both.  Either endpoint may be missing, in which case the matching
//! operations log and do nothing so push-to-talk keeps working.

#[cfg(target_os = "windows")]
mod wasapi;

use thiserror::Error;

/// Errors from a volume endpoint.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("{0} volume control is not available")]
    Unavailable(&'static str),

    #[error("{endpoint} volume call failed: {reason}")]
    Endpoint {
        endpoint: &'static str,
        reason: String,
    },
}

/// One scalar volume control in `[0, 1]`.
pub trait VolumeEndpoint {
    fn scalar(&self) -> Result<f32, VolumeError>;
    fn set_scalar(&self, value: f32) -> Result<(), VolumeError>;
}

/// Stored volumes awaiting restore.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeSnapshot {
    /// Speaker level before the current fade.
    pub original_speaker: Option<f32>,
    /// Speaker level before mute.
    pub stored_speaker: Option<f32>,
    /// Microphone level before mute.
    pub stored_microphone: Option<f32>,
}

impl VolumeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.original_speaker.is_none()
            && self.stored_speaker.is_none()
            && self.stored_microphone.is_none()
    }
}

pub struct VolumeController {
    speaker: Option<Box<dyn VolumeEndpoint>>,
    microphone: Option<Box<dyn VolumeEndpoint>>,
    snapshot: VolumeSnapshot,
}

impl VolumeController {
    pub fn new(
        speaker: Option<Box<dyn VolumeEndpoint>>,
        microphone: Option<Box<dyn VolumeEndpoint>>,
    ) -> Self {
        Self {
            speaker,
            microphone,
            snapshot: VolumeSnapshot::default(),
        }
    }

    /// A controller with no endpoints; fade and mute become no-ops.
    pub fn unavailable() -> Self {
        Self::new(None, None)
    }

    /// The default render and capture endpoints of the system.
    ///
    /// Falls back to [`VolumeController::unavailable`] (with a warning) when
    /// the platform has no supported volume API.
    pub fn system() -> Self {
        #[cfg(target_os = "windows")]
        {
            let speaker = match wasapi::WasapiEndpoint::speaker() {
                Ok(ep) => Some(Box::new(ep) as Box<dyn VolumeEndpoint>),
                Err(e) => {
                    log::warn!("volume: {e}; fade and mute disabled");
                    None
                }
            };
            let microphone = match wasapi::WasapiEndpoint::microphone() {
                Ok(ep) => Some(Box::new(ep) as Box<dyn VolumeEndpoint>),
                Err(e) => {
                    log::warn!("volume: {e}; microphone mute disabled");
                    None
                }
            };
            Self::new(speaker, microphone)
        }

        #[cfg(not(target_os = "windows"))]
        {
            log::warn!("volume: no endpoint volume API on this platform; fade and mute disabled");
            Self::unavailable()
        }
    }

    pub fn snapshot(&self) -> VolumeSnapshot {
        self.snapshot
    }

    fn speaker(&self) -> Result<&dyn VolumeEndpoint, VolumeError> {
        self.speaker
            .as_deref()
            .ok_or(VolumeError::Unavailable("speaker"))
    }

    /// Attenuate the speaker by `percent` of its current level.
    ///
    /// The pre-fade level is stored only if none is stored yet, so
    /// overlapping fades keep the true original.
    pub fn fade_speaker(&mut self, percent: u8) -> Result<(), VolumeError> {
        let speaker = self
            .speaker
            .as_deref()
            .ok_or(VolumeError::Unavailable("speaker"))?;
        let current = speaker.scalar()?;
        if self.snapshot.original_speaker.is_none() {
            self.snapshot.original_speaker = Some(current);
        }
        let factor = 1.0 - f32::from(percent.min(100)) / 100.0;
        speaker.set_scalar(current * factor)
    }

    /// Put back the pre-fade speaker level, if one is stored.
    pub fn restore_fade(&mut self) -> Result<(), VolumeError> {
        let Some(original) = self.snapshot.original_speaker else {
            return Ok(());
        };
        self.speaker()?.set_scalar(original)?;
        self.snapshot.original_speaker = None;
        Ok(())
    }

    /// Store both levels and set both endpoints to zero.
    pub fn mute_all(&mut self) -> Result<(), VolumeError> {
        let speaker = self
            .speaker
            .as_deref()
            .ok_or(VolumeError::Unavailable("speaker"))?;
        self.snapshot.stored_speaker = Some(speaker.scalar()?);
        speaker.set_scalar(0.0)?;

        if let Some(mic) = self.microphone.as_deref() {
            self.snapshot.stored_microphone = Some(mic.scalar()?);
            mic.set_scalar(0.0)?;
        }
        Ok(())
    }

    /// Restore both stored mute levels and clear them.
    pub fn unmute_all(&mut self) -> Result<(), VolumeError> {
        let speaker = self.snapshot.stored_speaker.take();
        let microphone = self.snapshot.stored_microphone.take();

        if let (Some(level), Some(ep)) = (speaker, self.speaker.as_deref()) {
            ep.set_scalar(level)?;
        }
        if let (Some(level), Some(ep)) = (microphone, self.microphone.as_deref()) {
            ep.set_scalar(level)?;
        }
        Ok(())
    }

    /// Restore everything still stored.  Mute first, then fade, so the
    /// speaker ends at its level from before both.
    pub fn restore_outstanding(&mut self) {
        if let Err(e) = self.unmute_all() {
            log::warn!("volume: restoring muted levels failed: {e}");
        }
        if let Err(e) = self.restore_fade() {
            log::warn!("volume: restoring faded speaker failed: {e}");
            self.snapshot.original_speaker = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Arc, Mutex};

    use super::{VolumeEndpoint, VolumeError};

    /// In-memory endpoint; clones share the level.
    #[derive(Clone)]
    pub struct MemoryEndpoint {
        pub level: Arc<Mutex<f32>>,
    }

    impl MemoryEndpoint {
        pub fn new(level: f32) -> Self {
            Self {
                level: Arc::new(Mutex::new(level)),
            }
        }

        pub fn get(&self) -> f32 {
            *self.level.lock().unwrap()
        }

        pub fn boxed(&self) -> Option<Box<dyn VolumeEndpoint>> {
            Some(Box::new(self.clone()))
        }
    }

    impl VolumeEndpoint for MemoryEndpoint {
        fn scalar(&self) -> Result<f32, VolumeError> {
            Ok(self.get())
        }

        fn set_scalar(&self, value: f32) -> Result<(), VolumeError> {
            *self.level.lock().unwrap() = value.clamp(0.0, 1.0);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::fake::MemoryEndpoint;
    use super::*;

    fn controller(speaker: f32, mic: f32) -> (VolumeController, MemoryEndpoint, MemoryEndpoint) {
        let s = MemoryEndpoint::new(speaker);
        let m = MemoryEndpoint::new(mic);
        (VolumeController::new(s.boxed(), m.boxed()), s, m)
    }

    #[test]
    fn fade_then_restore_is_bit_exact() {
        let (mut vc, speaker, _) = controller(0.73, 1.0);
        for _ in 0..50 {
            vc.fade_speaker(90).unwrap();
            assert!(speaker.get() < 0.1);
            vc.restore_fade().unwrap();
            assert_eq!(speaker.get().to_bits(), 0.73f32.to_bits());
        }
        assert!(vc.snapshot().is_empty());
    }

    #[test]
    fn overlapping_fades_keep_first_original() {
        let (mut vc, speaker, _) = controller(0.8, 1.0);
        vc.fade_speaker(50).unwrap();
        vc.fade_speaker(50).unwrap();
        assert!((speaker.get() - 0.2).abs() < 1e-6);
        assert_eq!(vc.snapshot().original_speaker, Some(0.8));
        vc.restore_fade().unwrap();
        assert_eq!(speaker.get(), 0.8);
    }

    #[test]
    fn mute_round_trip_restores_both() {
        let (mut vc, speaker, mic) = controller(0.6, 0.9);
        vc.mute_all().unwrap();
        assert_eq!(speaker.get(), 0.0);
        assert_eq!(mic.get(), 0.0);

        vc.unmute_all().unwrap();
        assert_eq!(speaker.get(), 0.6);
        assert_eq!(mic.get(), 0.9);
        assert!(vc.snapshot().is_empty());
    }

    #[test]
    fn restore_outstanding_undoes_mute_and_fade() {
        let (mut vc, speaker, mic) = controller(0.5, 0.4);
        vc.fade_speaker(90).unwrap();
        vc.mute_all().unwrap();

        vc.restore_outstanding();
        assert_eq!(speaker.get(), 0.5);
        assert_eq!(mic.get(), 0.4);
        assert!(vc.snapshot().is_empty());
    }

    #[test]
    fn missing_speaker_reports_unavailable() {
        let mut vc = VolumeController::unavailable();
        assert!(matches!(
            vc.fade_speaker(90),
            Err(VolumeError::Unavailable("speaker"))
        ));
        assert!(vc.restore_fade().is_ok());
        assert!(vc.unmute_all().is_ok());
        vc.restore_outstanding();
    }

    #[test]
    fn mute_without_microphone_still_mutes_speaker() {
        let speaker = MemoryEndpoint::new(0.7);
        let mut vc = VolumeController::new(speaker.boxed(), None);
        vc.mute_all().unwrap();
        assert_eq!(speaker.get(), 0.0);
        vc.unmute_all().unwrap();
        assert_eq!(speaker.get(), 0.7);
    }
}
