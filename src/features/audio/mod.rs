//! # Audio Feature
//!
//! Speech-to-text for voice notes.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod transcriber;

pub use transcriber::{is_audio_file, read_clip, AudioClip, AudioTranscriber, Transcriber};
