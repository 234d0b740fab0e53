//! Reply text utilities
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Character-based truncation for task previews
//! - 1.0.0: Initial release

/// Max characters of a task description shown in listings
pub const PREVIEW_LIMIT: usize = 60;

/// Truncate to at most `max_chars` characters (not bytes), adding "..." when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

pub fn preview(text: &str) -> String {
    truncate_chars(text.trim(), PREVIEW_LIMIT)
}

/// Collapse whitespace runs and trim; `None` when nothing is left
pub fn non_blank(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
