//! Typed failures for the assistant core
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.0.0: Replaced silent fallbacks with explicit error kinds so callers can
//!   tell provider outages from bad model output and missing tasks

use thiserror::Error;

/// Result alias used across the library layer
pub type AssistantResult<T> = std::result::Result<T, AssistantError>;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// The remote provider (LLM, search, transcription) could not be reached or answered with an error
    #[error("provider unavailable: {0}")]
    Provider(String),

    /// The provider answered but the payload was not what we asked for
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("no matching task")]
    NoMatchingTask,

    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported input: {0}")]
    Unsupported(String),
}

impl AssistantError {
    /// True when the failure came from the network/provider side rather than our data
    pub fn is_provider(&self) -> bool {
        matches!(self, AssistantError::Provider(_))
    }
}

impl From<sqlite::Error> for AssistantError {
    fn from(e: sqlite::Error) -> Self {
        AssistantError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for AssistantError {
    fn from(e: std::io::Error) -> Self {
        AssistantError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AssistantError {
    fn from(e: serde_json::Error) -> Self {
        AssistantError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(e: reqwest::Error) -> Self {
        AssistantError::Provider(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_classification() {
        assert!(AssistantError::Provider("timeout".into()).is_provider());
        assert!(!AssistantError::MalformedOutput("no json".into()).is_provider());
        assert!(!AssistantError::NoMatchingTask.is_provider());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(AssistantError::NoMatchingTask.to_string(), "no matching task");
        assert_eq!(
            AssistantError::InvalidTimestamp("25:99".into()).to_string(),
            "invalid timestamp `25:99`"
        );
    }
}
