//! Microphone level sampling.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → mono i16 buffers (bounded channel)
//!           → MicSampler::read_level → mean |sample| over ~100 ms
//! ```
//!
//! The activation loop only sees the [`LevelSource`] trait, so tests can feed
//! it scripted levels instead of a real device.

pub mod capture;
pub mod level;

pub use capture::{
    list_microphones, CaptureError, MicSampler, MicrophoneInfo, ReadError, CHUNK_SAMPLES,
    SAMPLE_RATE,
};
pub use level::{downmix_to_mono, mean_abs_level};

/// Something that produces one signal level per blocking read.
pub trait LevelSource {
    /// Bind to input device `device_index`, replacing any open device.
    fn open(&mut self, device_index: usize) -> Result<(), CaptureError>;

    /// Block for one chunk and return its level.
    fn read_level(&mut self) -> Result<f32, ReadError>;

    /// Drop audio captured but not yet read, so the next read starts from
    /// live input.
    fn discard_pending(&mut self);

    /// Release the device.
    fn close(&mut self);
}
