//! Deterministic routing rules, checked in order before any model call
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.3.0: Snooze checked before done; negated done phrases ignored
//! - 1.2.0: Snooze and silence rules
//! - 1.1.0: Reminder and done triggers parse the task locally
//! - 1.0.0: `/web`, `/chat` and factual keyword shortcuts

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

use super::{Action, RouteDecision, RouteSource};
use crate::features::tasks::extract_task;
use crate::features::tasks::parser::clean_text;

/// Snooze length when the user doesn't say one
pub const DEFAULT_SNOOZE_MINUTES: i64 = 30;

const FACTUAL_KEYWORDS: &[&str] = &[
    "cotação",
    "cotacao",
    "preço",
    "preco",
    "clima",
    "noticia",
    "notícia",
    "quem ganhou",
    "resultado",
    "últimas",
    "ultimas",
    "atualização",
    "atualizacao",
    "weather",
    "news",
];

fn web_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*/web\s+(.+)$").expect("web regex compiles"))
}

fn chat_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*/chat(?:\s+|$)").expect("chat regex compiles"))
}

fn remind_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:me\s+lembr[ae]r?|lembr[ae]-?me|lembrete|me\s+avis[ae]|remind\s+me)\b")
            .expect("remind regex compiles")
    })
}

fn done_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:j[aá]\s+fiz|feito|conclu[ií]|terminei|done|finished)\b")
            .expect("done regex compiles")
    })
}

/// "ainda não terminei" contains a done trigger
fn not_done_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:n[aã]o|nem|not)\s+(?:\w+\s+)?(?:fiz|feito|conclu[ií]|terminei|done|finished)\b")
            .expect("not-done regex compiles")
    })
}

fn snooze_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:adiar|adia|adie|soneca|snooze)\b").expect("snooze regex compiles")
    })
}

fn snooze_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d+)\s*(minutos?|mins?|m|minutes?|horas?|hrs?|h|hours?)\b")
            .expect("snooze amount regex compiles")
    })
}

fn silence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:silenciar|silencia|silencie|mute)\b").expect("silence regex compiles")
    })
}

/// "para de me lembrar" also contains a reminder trigger
fn stop_reminding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:para|pare|parar)\s+de\s+me\s+lembrar\b").expect("stop regex compiles")
    })
}

/// Minutes named in a snooze request, e.g. "adia 15 min" or "snooze 2h"
pub fn snooze_minutes(text: &str) -> Option<i64> {
    let caps = snooze_amount_re().captures(text)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str();
    if unit.starts_with('h') {
        Some(amount * 60)
    } else {
        Some(amount)
    }
}

/// First matching rule wins; `None` means the model has to decide
pub fn match_rules(text: &str, now: NaiveDateTime, default_hour: u32) -> Option<RouteDecision> {
    if let Some(caps) = web_command_re().captures(text) {
        let query = caps.get(1).map(|m| m.as_str().trim().to_string());
        return Some(RouteDecision {
            search_query: query,
            ..RouteDecision::new(Action::WebSearch, RouteSource::Rule("web_command"))
        });
    }

    if chat_command_re().is_match(text) {
        return Some(RouteDecision::new(Action::Chat, RouteSource::Rule("chat_command")));
    }

    let clean = clean_text(text);

    let stop_reminding = stop_reminding_re().is_match(&clean);

    if remind_re().is_match(&clean) && !stop_reminding {
        return Some(RouteDecision {
            draft: Some(extract_task(text, now, default_hour)),
            ..RouteDecision::new(Action::TaskCreate, RouteSource::Rule("remind_trigger"))
        });
    }

    if snooze_re().is_match(&clean) {
        return Some(RouteDecision {
            minutes: Some(snooze_minutes(&clean).unwrap_or(DEFAULT_SNOOZE_MINUTES)),
            ..RouteDecision::new(Action::TaskSnooze, RouteSource::Rule("snooze_trigger"))
        });
    }

    if done_re().is_match(&clean) && !not_done_re().is_match(&clean) {
        return Some(RouteDecision::new(Action::TaskDone, RouteSource::Rule("done_trigger")));
    }

    if stop_reminding || silence_re().is_match(&clean) {
        return Some(RouteDecision::new(Action::TaskSilence, RouteSource::Rule("silence_trigger")));
    }

    if FACTUAL_KEYWORDS.iter().any(|k| clean.contains(k)) {
        return Some(RouteDecision {
            search_query: Some(text.trim().to_string()),
            ..RouteDecision::new(Action::WebSearch, RouteSource::Rule("factual_keyword"))
        });
    }

    None
}
