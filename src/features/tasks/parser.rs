//! Free-text task parsing
//!
//! Turns "me lembra de pagar a luz amanhã às 19h" into a description and a
//! due time without a model round-trip. Relative phrases win over clock
//! times, clock times over the default hour.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Clock times ("às 19:19", "7h30") with next-day rollover
//! - 1.1.0: English trigger phrases
//! - 1.0.0: Relative offsets ("daqui 10 min", "em 2 horas")

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::core::non_blank;

/// Where a draft's due time came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSource {
    Relative,
    Clock,
    /// Nothing in the text; the configured fallback hour was used
    Default,
    /// Extracted by the language model
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub description: String,
    pub due_at: NaiveDateTime,
    pub time_source: TimeSource,
}

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:daqui|em|in|dentro de)\s+(?:a\s+)?(um|uma|an?|\d+)\s*(minutos?|mins?|m|horas?|hrs?|h|hours?|minutes?)\b",
        )
        .expect("relative regex compiles")
    })
}

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:\b(?:às|as|at|pelas|para as)\s+)?\b([01]?\d|2[0-3])\s*(?::|h)\s*([0-5]\d)?\b")
            .expect("clock regex compiles")
    })
}

/// Hour without minutes. Unaccented "as" is also an article ("as 2 pizzas"),
/// so it only counts before "horas", a day word or the end of the text.
fn bare_hour_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:às|at|pelas)\s+([01]?\d|2[0-3])\b|as\s+([01]?\d|2[0-3])(?:\s+horas?\b|\s+(?:hoje|amanhã|amanha|today|tomorrow)\b|[\s.!?]*$))",
        )
        .expect("hour regex compiles")
    })
}

fn day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(depois de amanhã|depois de amanha|amanhã|amanha|hoje|tomorrow|today)\b")
            .expect("day regex compiles")
    })
}

fn trigger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:ei|oi|hey)\s*,?\s*)?(?:zoe\s*,?\s*)?(?:por favor\s*,?\s*)?(?:me\s+lembr[ae]r?|lembr[ae]-?me|me\s+avis[ae]r?|cria(?:r)?\s+(?:um\s+)?lembrete|lembrete|lembrar|remind\s+me|set\s+a\s+reminder|reminder)\s*(?:(?:de|da|do|que|pra|para|to|of|about|that)\b|:)?\s*",
        )
        .expect("trigger regex compiles")
    })
}

/// Lowercase, strip punctuation except `/` and `:`, collapse whitespace
pub fn clean_text(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric()
                || "áàâãéèêíìîóòôõúùûç/:".contains(c)
                || c.is_whitespace()
            {
                c
            } else {
                ' '
            }
        })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Offsets like "daqui 10 min", "em 2 horas", "in 5 minutes"
pub fn parse_relative(text: &str) -> Option<Duration> {
    let t = clean_text(text);
    if t.contains("daqui um minuto") || t.contains("daqui 1 minuto") || t.contains("em 1 minuto") {
        return Some(Duration::minutes(1));
    }

    let caps = relative_re().captures(&t)?;
    let amount = match &caps[1] {
        "um" | "uma" | "a" | "an" => 1,
        n => n.parse::<i64>().ok()?,
    };
    let unit = &caps[2];
    if unit.starts_with('h') {
        Some(Duration::hours(amount))
    } else {
        Some(Duration::minutes(amount))
    }
}

/// Day offset implied by "hoje"/"amanhã"/"depois de amanhã"; `None` when unspecified
fn day_offset(text: &str) -> Option<i64> {
    let t = clean_text(text);
    let caps = day_re().captures(&t)?;
    let word = caps[1].to_string();
    Some(if word.starts_with("depois") {
        2
    } else if word.starts_with("amanh") || word == "tomorrow" {
        1
    } else {
        0
    })
}

fn clock_from_text(text: &str) -> Option<NaiveTime> {
    let t = clean_text(text);
    if let Some(caps) = clock_re().captures(&t) {
        let hour = caps[1].parse::<u32>().ok()?;
        let minute = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    let caps = bare_hour_re().captures(&t)?;
    let hour = caps.get(1).or_else(|| caps.get(2))?.as_str().parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, 0, 0)
}

fn at_time(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    NaiveDateTime::new(date, time)
}

/// Absolute clock time ("às 19:19", "7h30"). Without an explicit day a time
/// already past today rolls to tomorrow.
pub fn parse_clock_time(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = clock_from_text(text)?;
    let explicit_day = day_offset(text);
    let date = now.date() + Duration::days(explicit_day.unwrap_or(0));
    let candidate = at_time(date, time);
    if candidate < now && explicit_day.unwrap_or(0) == 0 {
        Some(candidate + Duration::days(1))
    } else {
        Some(candidate)
    }
}

/// Strip trigger phrase, time and day expressions; falls back to the raw text
pub fn extract_description(text: &str) -> String {
    let stripped = trigger_re().replace(text, "");
    let stripped = relative_re().replace_all(&stripped, " ");
    let stripped = clock_re().replace_all(&stripped, " ");
    let stripped = bare_hour_re().replace_all(&stripped, " ");
    let stripped = day_re().replace_all(&stripped, " ");

    let cleaned = non_blank(&stripped)
        .map(|s| {
            s.trim_matches(|c: char| ",.;:!?-".contains(c) || c.is_whitespace())
                .to_string()
        })
        .map(strip_dangling_connectors)
        .filter(|s| !s.is_empty());

    cleaned.unwrap_or_else(|| text.trim().to_string())
}

fn strip_dangling_connectors(text: String) -> String {
    const CONNECTORS: &[&str] = &["de", "da", "do", "a", "para", "pra", "at", "to", "on", "e"];
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while words
        .last()
        .map(|w| CONNECTORS.contains(&w.to_lowercase().as_str()))
        .unwrap_or(false)
    {
        words.pop();
    }
    words.join(" ")
}

/// True when the text names a time we can parse without a model
pub fn has_explicit_time(text: &str) -> bool {
    parse_relative(text).is_some() || clock_from_text(text).is_some()
}

/// Build a draft from free text; missing time falls back to `default_hour` on the same day
/// (or the next day if that hour has already passed)
pub fn extract_task(text: &str, now: NaiveDateTime, default_hour: u32) -> TaskDraft {
    let description = extract_description(text);

    if let Some(delta) = parse_relative(text) {
        return TaskDraft {
            description,
            due_at: now + delta,
            time_source: TimeSource::Relative,
        };
    }

    if let Some(due_at) = parse_clock_time(text, now) {
        return TaskDraft {
            description,
            due_at,
            time_source: TimeSource::Clock,
        };
    }

    TaskDraft {
        description,
        due_at: default_due(text, now, default_hour),
        time_source: TimeSource::Default,
    }
}

fn default_due(text: &str, now: NaiveDateTime, default_hour: u32) -> NaiveDateTime {
    let explicit_day = day_offset(text).unwrap_or(0);
    let time = NaiveTime::from_hms_opt(default_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let candidate = at_time(now.date() + Duration::days(explicit_day), time);
    if candidate < now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}
