//! Local wall-clock timestamp parsing shared by both datasets.
//!
//! Exports carry naive local times with no offset; values are kept as
//! [`NaiveDateTime`] and never shifted to another timezone.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// Day key produced for rows whose timestamp could not be parsed.
pub const INVALID_DAY: &str = "Invalid Date";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a timestamp such as `2020-02-13T17:23:49` or `2020-02-13 17:23`.
///
/// A bare `YYYY-MM-DD` resolves to midnight. Returns `None` when no known
/// layout matches.
pub fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Calendar day as `YYYY-MM-DD`, or [`INVALID_DAY`] for a missing timestamp.
pub fn format_day(timestamp: Option<&NaiveDateTime>) -> String {
    match timestamp {
        Some(ts) => ts.format("%Y-%m-%d").to_string(),
        None => INVALID_DAY.to_string(),
    }
}

/// Hours since local midnight with minute resolution (`17:23` -> `17.383`).
///
/// Seconds are discarded. A missing timestamp yields `NaN`.
pub fn hour_of_day(timestamp: Option<&NaiveDateTime>) -> f64 {
    match timestamp {
        Some(ts) => ts.hour() as f64 + ts.minute() as f64 / 60.0,
        None => f64::NAN,
    }
}
