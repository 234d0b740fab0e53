//! # Feature: Audio Transcription
//!
//! Whisper transcription of local audio clips through the provider's
//! OpenAI-compatible `audio/transcriptions` endpoint.
//!
//! - **Version**: 2.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.1.0: Clip loading split from upload so repeated clips skip the request
//! - 2.0.0: Multipart upload via reqwest against the configured base URL, language hint
//! - 1.0.0: Initial release with Whisper API integration

use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Instant;
use tokio::fs;

use crate::core::{AssistantError, AssistantResult};

/// Formats Whisper accepts without conversion
const SUPPORTED_FORMATS: &[&str] = &[
    "mp3", "mp4", "m4a", "wav", "webm", "mpeg", "mpga", "ogg", "flac",
];

/// An audio clip read from disk, not yet transcribed
#[derive(Debug)]
pub struct AudioClip {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> AssistantResult<String>;
}

pub fn is_audio_file(file_path: &str) -> bool {
    extension(file_path)
        .map(|ext| SUPPORTED_FORMATS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Load a clip, rejecting unsupported formats and missing files
pub async fn read_clip(file_path: &str) -> AssistantResult<AudioClip> {
    if !is_audio_file(file_path) {
        return Err(AssistantError::Unsupported(format!(
            "{file_path} is not a supported audio format"
        )));
    }

    let bytes = fs::read(file_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssistantError::Unsupported(format!("audio file not found: {file_path}"))
        } else {
            AssistantError::from(e)
        }
    })?;

    Ok(AudioClip {
        file_name: file_name(file_path),
        bytes,
    })
}

#[derive(Clone)]
pub struct AudioTranscriber {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

impl AudioTranscriber {
    pub fn new(api_key: String, base_url: String, model: String, language: String) -> Self {
        AudioTranscriber {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            language,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for AudioTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> AssistantResult<String> {
        info!("Transcribing audio clip: {}", clip.file_name);
        let started = Instant::now();

        let part = Part::bytes(clip.bytes).file_name(clip.file_name);
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("language", self.language.clone());

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantError::Provider(format!(
                "transcription failed ({status}): {body}"
            )));
        }

        let text = body.trim().to_string();
        if text.is_empty() {
            return Err(AssistantError::MalformedOutput("empty transcription".into()));
        }
        debug!("Transcription took {}ms", started.elapsed().as_millis());
        info!("Transcription successful ({} chars)", text.len());
        Ok(text)
    }
}

fn extension(file_path: &str) -> Option<String> {
    Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn file_name(file_path: &str) -> String {
    Path::new(file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.wav")
        .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed transcript and counts uploads
    pub struct FixedTranscriber {
        pub text: String,
        pub uploads: AtomicUsize,
    }

    impl FixedTranscriber {
        pub fn new(text: &str) -> Self {
            FixedTranscriber {
                text: text.to_string(),
                uploads: AtomicUsize::new(0),
            }
        }

        pub fn uploads(&self) -> usize {
            self.uploads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _clip: AudioClip) -> AssistantResult<String> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }
}
