//! Talk to Push: voice-activated push-to-talk.
//!
//! The [`engine`] samples the microphone level and, while the user speaks,
//! holds a configured key combo down (optionally fading the speakers).  The
//! [`app`] module is the egui settings window around it.

pub mod app;
pub mod audio;
pub mod config;
pub mod engine;
pub mod hotkey;
pub mod inject;
pub mod volume;
pub mod window;
