// MecmLog - core/timestamp.rs
//
// Interpretation of the textual `"<date> <time>"` timestamp as a point in
// time, used for chronological sorting and the time-context window.
//
// Entries keep their timestamp verbatim; this module is the only place that
// reads meaning into it. Interpretation fails closed: text that cannot be
// read yields `None`, and `None` sorts after every interpretable timestamp.
//
// The trailing `+NNN` / `-NNN` bias CMTrace appends to the time field is
// accepted but ignored. All entries are compared as naive local times, which
// keeps ordering consistent with the timestamps the user sees.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Interpret a `"<date> <time>"` timestamp.
///
/// Accepted forms, tried in order:
///   1. `MM-DD-YYYY HH:MM:SS[.fff][+bias]` (also `/` separated, 1-digit month,
///      day and hour): the Configuration Manager client format.
///   2. `YYYY-MM-DD HH:MM:SS[.fff]`.
///
/// Returns `None` for anything else, including out-of-range field values.
pub fn interpret(timestamp: &str) -> Option<NaiveDateTime> {
    static CM_FORMAT: OnceLock<Regex> = OnceLock::new();

    let re = CM_FORMAT.get_or_init(|| {
        Regex::new(
            r"^\s*(\d{1,2})[-/](\d{1,2})[-/](\d{4})\s+(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?(?:[+-]\d{1,4})?\s*$",
        )
        .expect("timestamp::interpret: invalid regex")
    });

    if let Some(caps) = re.captures(timestamp) {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let month = num(1)?;
        let day = num(2)?;
        let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
        let hour = num(4)?;
        let minute = num(5)?;
        let second = num(6)?;
        let nanos = match caps.get(7) {
            Some(frac) => fraction_to_nanos(frac.as_str())?,
            None => 0,
        };
        return NaiveDate::from_ymd_opt(year, month, day)?.and_hms_nano_opt(hour, minute, second, nanos);
    }

    let trimmed = timestamp.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Convert a 1-9 digit fractional-second string to nanoseconds.
fn fraction_to_nanos(digits: &str) -> Option<u32> {
    let value: u32 = digits.parse().ok()?;
    let scale = 10u32.checked_pow(9 - digits.len() as u32)?;
    value.checked_mul(scale)
}

/// Total order over interpreted timestamps: earlier first, uninterpretable
/// (`None`) after everything else. Two `None`s compare equal so a stable sort
/// keeps their original relative order.
pub fn compare_sort_keys(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// True when `time` lies within `window_secs` of `anchor`, boundary inclusive.
pub fn within_window(time: NaiveDateTime, anchor: NaiveDateTime, window_secs: i64) -> bool {
    let delta = time.signed_duration_since(anchor);
    let span = chrono::Duration::seconds(window_secs);
    -span <= delta && delta <= span
}

/// Label for the time-range indicator, e.g.
/// `"Time Range: 14:25 - 14:35 (centered on 14:30)"`.
pub fn window_label(anchor: NaiveDateTime, window_secs: i64) -> String {
    let span = chrono::Duration::seconds(window_secs);
    let before = anchor - span;
    let after = anchor + span;
    format!(
        "Time Range: {} - {} (centered on {})",
        before.format("%H:%M"),
        after.format("%H:%M"),
        anchor.format("%H:%M")
    )
}
