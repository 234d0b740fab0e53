//! Per-conversation state
//!
//! Everything that used to live in ad-hoc globals (chat history, the last
//! announced alert, the last processed input and audio clip) is held here and
//! handed explicitly to the router, the command handler and the scheduler.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use crate::features::llm::{ChatMessage, ChatRole};

/// History kept in memory per session
pub const HISTORY_LIMIT: usize = 200;

/// Identical input inside this window is treated as a double submit
pub const DUPLICATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: ChatRole,
    pub content: String,
    /// Reply was built from web search results
    pub web_used: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    history: Vec<SessionMessage>,
    last_alert_fingerprint: Option<String>,
    last_input: Option<(u64, Instant)>,
    last_audio_hash: Option<u64>,
}

fn fingerprint_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(SessionMessage {
            role: ChatRole::User,
            content: content.into(),
            web_used: false,
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, web_used: bool) {
        self.push(SessionMessage {
            role: ChatRole::Assistant,
            content: content.into(),
            web_used,
        });
    }

    fn push(&mut self, message: SessionMessage) {
        if message.content.trim().is_empty() {
            return;
        }
        self.history.push(message);
        if self.history.len() > HISTORY_LIMIT {
            let overflow = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..overflow);
        }
    }

    pub fn history(&self) -> &[SessionMessage] {
        &self.history
    }

    /// Last `n` messages as model input
    pub fn recent(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.history.len().saturating_sub(n);
        self.history[start..]
            .iter()
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect()
    }

    /// False for blank text or the same text submitted again within [`DUPLICATE_WINDOW`]
    pub fn should_process_input(&mut self, text: &str, now: Instant) -> bool {
        let clean = text.trim();
        if clean.is_empty() {
            return false;
        }
        let sig = fingerprint_of(clean);
        if let Some((last_sig, last_at)) = self.last_input {
            if last_sig == sig && now.saturating_duration_since(last_at) < DUPLICATE_WINDOW {
                return false;
            }
        }
        self.last_input = Some((sig, now));
        true
    }

    /// False when this exact clip was already handled
    pub fn register_audio(&mut self, bytes: &[u8]) -> bool {
        let hash = fingerprint_of(bytes);
        if self.last_audio_hash == Some(hash) {
            return false;
        }
        self.last_audio_hash = Some(hash);
        true
    }

    /// Drop the remembered clip so it can be sent again
    pub fn forget_audio(&mut self) {
        self.last_audio_hash = None;
    }

    /// Whether `fingerprint` was the last alert announced
    pub fn alert_announced(&self, fingerprint: &str) -> bool {
        self.last_alert_fingerprint.as_deref() == Some(fingerprint)
    }

    /// Record an alert fingerprint; false if it was the last one announced
    pub fn mark_alert(&mut self, fingerprint: &str) -> bool {
        if self.alert_announced(fingerprint) {
            return false;
        }
        self.last_alert_fingerprint = Some(fingerprint.to_string());
        true
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_messages_not_recorded() {
        let mut session = Session::new();
        session.push_user("   ");
        session.push_assistant("", false);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_history_capped() {
        let mut session = Session::new();
        for i in 0..(HISTORY_LIMIT + 5) {
            session.push_user(format!("msg {i}"));
        }
        assert_eq!(session.history().len(), HISTORY_LIMIT);
        assert_eq!(session.history()[0].content, "msg 5");
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut session = Session::new();
        session.push_user("oi");
        session.push_assistant("e aí!", false);
        session.push_user("tudo bem?");
        let recent = session.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].role, ChatRole::Assistant);
        assert_eq!(recent[1].content, "tudo bem?");
    }

    #[test]
    fn test_duplicate_input_within_window_dropped() {
        let mut session = Session::new();
        let t0 = Instant::now();
        assert!(session.should_process_input("oi", t0));
        assert!(!session.should_process_input(" oi ", t0 + Duration::from_millis(300)));
        assert!(session.should_process_input("oi", t0 + Duration::from_millis(1500)));
        assert!(session.should_process_input("outra coisa", t0 + Duration::from_millis(1600)));
        assert!(!session.should_process_input("   ", t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_same_audio_ignored() {
        let mut session = Session::new();
        assert!(session.register_audio(b"clip-1"));
        assert!(!session.register_audio(b"clip-1"));
        assert!(session.register_audio(b"clip-2"));
    }

    #[test]
    fn test_alert_fingerprint() {
        let mut session = Session::new();
        assert!(session.mark_alert("abc::2026-10-17 10:00"));
        assert!(!session.mark_alert("abc::2026-10-17 10:00"));
        assert!(session.mark_alert("abc::2026-10-17 10:10"));
    }
}
