//! Microphone level sampling via `cpal`.
//!
//! [`MicSampler`] owns at most one cpal input stream.  The cpal callback
//! down-mixes every buffer to mono `i16` and forwards it over a bounded
//! channel; [`MicSampler::read_level`] blocks until one chunk
//! ([`CHUNK_SAMPLES`] at [`SAMPLE_RATE`], ~100 ms) has arrived and reduces it
//! to its mean absolute amplitude.
//!
//! `cpal::Stream` is not `Send` on every platform, so a sampler must be
//! created, used and dropped on the same thread (the activation loop).

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::level::{downmix_to_mono, mean_abs_level};
use super::LevelSource;

/// Preferred capture rate in Hz.
pub const SAMPLE_RATE: u32 = 22_050;

/// Samples per level reading at [`SAMPLE_RATE`] (100 ms).
pub const CHUNK_SAMPLES: usize = 2_205;

/// A read that sees no data for this long fails.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Callback buffers held while nobody reads; further buffers are dropped.
const BACKLOG_BUFFERS: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while opening a capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device with index {0}")]
    NoDevice(usize),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query supported input configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),
}

/// Transient failure of a single level read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("no capture device is open")]
    NotOpen,

    #[error("no audio received for {0:?}")]
    Timeout(Duration),

    #[error("capture stream closed")]
    Disconnected,

    #[error("capture stream error: {0}")]
    Stream(String),
}

// ---------------------------------------------------------------------------
// Device enumeration
// ---------------------------------------------------------------------------

/// An input-capable device of the default host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneInfo {
    /// Position in [`list_microphones`]; the value passed to `open`.
    pub index: usize,
    pub name: String,
}

/// Input devices of the default host, in host order.
pub fn list_microphones() -> Result<Vec<MicrophoneInfo>, CaptureError> {
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .enumerate()
        .map(|(index, device)| MicrophoneInfo {
            index,
            name: device.name().unwrap_or_else(|_| format!("Input device {index}")),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// MicSampler
// ---------------------------------------------------------------------------

enum StreamMessage {
    Samples(Vec<i16>),
    Error(String),
}

struct ActiveStream {
    _stream: cpal::Stream,
    rx: mpsc::Receiver<StreamMessage>,
    /// Samples per reading at the negotiated rate.
    chunk_len: usize,
    pending: Vec<i16>,
    device_name: String,
}

/// Level source backed by a cpal input stream.
#[derive(Default)]
pub struct MicSampler {
    active: Option<ActiveStream>,
}

impl MicSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the open device, if any.
    pub fn device_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.device_name.as_str())
    }

    fn build(device_index: usize) -> Result<ActiveStream, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .input_devices()?
            .nth(device_index)
            .ok_or(CaptureError::NoDevice(device_index))?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| format!("Input device {device_index}"));

        let supported = preferred_config(&device)?;
        let sample_format = supported.sample_format();
        let channels = supported.channels() as usize;
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::debug!(
            "audio: '{device_name}' config: {sample_rate} Hz, {channels} channel(s), \
             {sample_format:?}"
        );

        let (tx, rx) = mpsc::sync_channel(BACKLOG_BUFFERS);
        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, tx)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, tx)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, channels, tx)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, tx)?,
            other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        Ok(ActiveStream {
            _stream: stream,
            rx,
            chunk_len: (sample_rate as usize / 10).max(1),
            pending: Vec::new(),
            device_name,
        })
    }
}

/// Mono 16-bit at [`SAMPLE_RATE`] when the device offers it, otherwise the
/// device default.
fn preferred_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let rate = cpal::SampleRate(SAMPLE_RATE);
    let exact = device.supported_input_configs()?.find(|range| {
        range.channels() == 1
            && range.sample_format() == cpal::SampleFormat::I16
            && range.min_sample_rate() <= rate
            && rate <= range.max_sample_rate()
    });

    match exact {
        Some(range) => Ok(range.with_sample_rate(rate)),
        None => Ok(device.default_input_config()?),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tx: mpsc::SyncSender<StreamMessage>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample + Send + 'static,
    i16: cpal::FromSample<T>,
{
    let err_tx = tx.clone();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<i16> = data
                .iter()
                .map(|&s| <i16 as cpal::FromSample<T>>::from_sample_(s))
                .collect();
            // Full backlog: drop the buffer, like an input overflow.
            let _ = tx.try_send(StreamMessage::Samples(downmix_to_mono(&samples, channels)));
        },
        move |err: cpal::StreamError| {
            log::error!("audio: cpal stream error: {err}");
            let _ = err_tx.try_send(StreamMessage::Error(err.to_string()));
        },
        None,
    )?;
    Ok(stream)
}

impl LevelSource for MicSampler {
    /// Open `device_index`.  The previous stream is only replaced once the
    /// new one is playing, so a failed switch keeps the old device.
    fn open(&mut self, device_index: usize) -> Result<(), CaptureError> {
        let stream = Self::build(device_index)?;
        log::info!("audio: capturing from '{}'", stream.device_name);
        self.active = Some(stream);
        Ok(())
    }

    fn read_level(&mut self) -> Result<f32, ReadError> {
        let active = self.active.as_mut().ok_or(ReadError::NotOpen)?;

        while active.pending.len() < active.chunk_len {
            match active.rx.recv_timeout(READ_TIMEOUT) {
                Ok(StreamMessage::Samples(samples)) => active.pending.extend_from_slice(&samples),
                Ok(StreamMessage::Error(message)) => return Err(ReadError::Stream(message)),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(ReadError::Timeout(READ_TIMEOUT))
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(ReadError::Disconnected),
            }
        }

        let chunk: Vec<i16> = active.pending.drain(..active.chunk_len).collect();
        Ok(mean_abs_level(&chunk))
    }

    fn discard_pending(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.pending.clear();
        while let Ok(message) = active.rx.try_recv() {
            if let StreamMessage::Error(message) = message {
                log::warn!("audio: stream error while discarding: {message}");
            }
        }
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("audio: closing '{}'", active.device_name);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
