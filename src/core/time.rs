//! Wall-clock helpers
//!
//! Task timestamps are naive `YYYY-MM-DD HH:MM` strings interpreted in one
//! fixed UTC offset. Everything below works on `NaiveDateTime` so the
//! reminder and router logic can be driven by a fixed "now" in tests.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Quiet hours window supports non-wrapping ranges and can be disabled
//! - 1.0.0: Initial release

use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, Timelike, Utc};

use super::error::{AssistantError, AssistantResult};

/// Storage format for every persisted timestamp
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Seconds-resolution format used by the event log
pub const EVENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Brasília time
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;

pub fn format_minute(dt: &NaiveDateTime) -> String {
    dt.format(MINUTE_FORMAT).to_string()
}

pub fn parse_minute(s: &str) -> AssistantResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), MINUTE_FORMAT)
        .map_err(|_| AssistantError::InvalidTimestamp(s.to_string()))
}

/// Drop seconds and sub-second precision
pub fn floor_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Source of "now" in the configured fixed zone
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Clock {
    pub fn new(offset: FixedOffset) -> Self {
        Clock { offset }
    }

    /// Build from a whole-hour offset such as `-3`; out-of-range values fall back to UTC
    pub fn from_offset_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        Clock { offset }
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    pub fn now_floor_minute(&self) -> NaiveDateTime {
        floor_minute(self.now())
    }
}

/// Time-of-day window during which proactive reminders are suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: u32,
    pub end: u32,
}

impl Default for QuietHours {
    fn default() -> Self {
        QuietHours { start: 22, end: 7 }
    }
}

impl QuietHours {
    pub fn new(start: u32, end: u32) -> Self {
        QuietHours {
            start: start % 24,
            end: end % 24,
        }
    }

    pub fn contains(&self, now: &NaiveDateTime) -> bool {
        let h = now.hour();
        if self.start == self.end {
            false
        } else if self.start > self.end {
            // wraps midnight
            h >= self.start || h < self.end
        } else {
            h >= self.start && h < self.end
        }
    }
}

/// Push a past time into the future: first try +12h (ambiguous AM/PM), then +1 day
pub fn roll_forward(dt: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
    if dt >= now {
        return dt;
    }
    let half_day = dt + Duration::hours(12);
    if half_day >= now {
        return half_day;
    }
    dt + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        parse_minute(s).unwrap()
    }

    #[test]
    fn test_format_parse_roundtrip_shape() {
        let dt = at("2026-10-17 19:19");
        assert_eq!(format_minute(&dt), "2026-10-17 19:19");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_minute("amanhã cedo"),
            Err(AssistantError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_floor_minute() {
        let dt = NaiveDateTime::parse_from_str("2026-10-17 08:15:42", EVENT_FORMAT).unwrap();
        assert_eq!(format_minute(&floor_minute(dt)), "2026-10-17 08:15");
        assert_eq!(floor_minute(dt).second(), 0);
    }

    #[test]
    fn test_quiet_hours_wraps_midnight() {
        let quiet = QuietHours::default();
        assert!(quiet.contains(&at("2026-10-17 22:00")));
        assert!(quiet.contains(&at("2026-10-17 23:59")));
        assert!(quiet.contains(&at("2026-10-18 03:30")));
        assert!(quiet.contains(&at("2026-10-18 06:59")));
        assert!(!quiet.contains(&at("2026-10-18 07:00")));
        assert!(!quiet.contains(&at("2026-10-17 21:59")));
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let quiet = QuietHours::new(13, 15);
        assert!(quiet.contains(&at("2026-10-17 13:00")));
        assert!(!quiet.contains(&at("2026-10-17 15:00")));
        assert!(!quiet.contains(&at("2026-10-17 12:59")));
    }

    #[test]
    fn test_quiet_hours_disabled_when_equal() {
        let quiet = QuietHours::new(0, 0);
        assert!(!quiet.contains(&at("2026-10-17 00:30")));
    }

    #[test]
    fn test_roll_forward() {
        let now = at("2026-10-17 15:00");
        // already in the future
        assert_eq!(roll_forward(at("2026-10-17 16:00"), now), at("2026-10-17 16:00"));
        // 03:30 said in the afternoon means 15:30
        assert_eq!(roll_forward(at("2026-10-17 03:30"), now), at("2026-10-17 15:30"));
        // 02:00 + 12h is still past, so tomorrow
        assert_eq!(roll_forward(at("2026-10-17 02:00"), now), at("2026-10-18 02:00"));
    }

    #[test]
    fn test_clock_offset_applied() {
        let utc = Clock::from_offset_hours(0).now();
        let brt = Clock::from_offset_hours(-3).now();
        let diff = (utc - brt).num_minutes();
        assert!((179..=181).contains(&diff));
    }
}
