//! Time-window resolution.
//!
//! Turns authored time-of-day strings (`"7"`, `"07:30"`, `"7:30:15"`) and
//! entity-time references into concrete [`Window`]s anchored to the current
//! day, shifting them across midnight when needed.
//!
//! Malformed time strings never fail: they resolve to midnight.

use std::cmp::Ordering;

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::TimeResolutionError;
use crate::time::LocalTimestamp;

/// Default length of the window synthesized for trigger schedules without an end.
pub const DEFAULT_TRIGGER_WINDOW_MINUTES: i64 = 10;

/// A resolved `[start, end)` window with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: LocalTimestamp,
    pub end: LocalTimestamp,
}

impl Window {
    /// Whether `now` lies inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, now: LocalTimestamp) -> bool {
        is_time_in_range(now, self.start, self.end)
    }

    /// Progress of `now` through the window, clamped to `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: LocalTimestamp) -> f64 {
        calculate_progress(now, self.start, self.end)
    }
}

/// A schedule boundary as authored: either a literal time string or a
/// reference to an entity whose state holds the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeRef {
    Literal(String),
    Entity { entity_id: String },
}

impl From<&str> for TimeRef {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl std::fmt::Display for TimeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Entity { entity_id } => write!(f, "entity({entity_id})"),
        }
    }
}

/// Keep only the time-of-day part of a date-time string such as
/// `2024-05-01 07:30:00` or `2024-05-01T07:30:00+02:00`.
fn time_part(raw: &str) -> &str {
    let raw = raw.trim();
    let tail = raw.rsplit(['T', ' ']).next().unwrap_or(raw);
    tail.split(['+', '-', 'Z', '.']).next().unwrap_or(tail)
}

/// Split `H[:M[:S]]` into components, zero-filling the missing ones.
///
/// Returns `None` when a component is not a number or is out of range.
#[must_use]
pub fn time_components(raw: &str) -> Option<(u32, u32, u32)> {
    let mut parts = time_part(raw).split(':');
    let mut next = || -> Option<u32> {
        match parts.next() {
            Some(part) => part.trim().parse().ok(),
            None => Some(0),
        }
    };
    let hours = next()?;
    let minutes = next()?;
    let seconds = next()?;
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some((hours, minutes, seconds))
}

/// Parse a time-of-day string, falling back to midnight when malformed.
#[must_use]
pub fn parse_time(raw: &str) -> NaiveTime {
    time_components(raw)
        .and_then(|(h, m, s)| NaiveTime::from_hms_opt(h, m, s))
        .unwrap_or(NaiveTime::MIN)
}

/// Zero-pad a partial time string into `HH:MM:SS`.
///
/// Idempotent: normalizing an already normalized string returns it unchanged.
#[must_use]
pub fn normalize_time(raw: &str) -> String {
    parse_time(raw).format("%H:%M:%S").to_string()
}

/// Compare time-of-day only, or date and time when `with_day` is set.
#[must_use]
pub fn compare_time(a: LocalTimestamp, b: LocalTimestamp, with_day: bool) -> Ordering {
    let by_time = a
        .time()
        .num_seconds_from_midnight()
        .cmp(&b.time().num_seconds_from_midnight());
    if with_day {
        a.date().cmp(&b.date()).then(by_time)
    } else {
        by_time
    }
}

/// Half-open range check: `start <= now < end`.
#[must_use]
pub fn is_time_in_range(now: LocalTimestamp, start: LocalTimestamp, end: LocalTimestamp) -> bool {
    compare_time(now, start, true) != Ordering::Less
        && compare_time(now, end, true) == Ordering::Less
}

/// Whether `now` is within `window` of `target`, in either direction.
#[must_use]
pub fn is_within_window(now: LocalTimestamp, target: LocalTimestamp, window: Duration) -> bool {
    (now - target).abs() <= window
}

/// Anchor a start/end pair to the day of `now`.
///
/// When the window spans midnight (`start >= end` by time of day), `now`
/// either belongs to the tail of yesterday's window (start moves back a day)
/// or to tonight's window (end moves forward a day). A non-spanning window
/// whose end is more than twelve hours behind `now` moves to tomorrow.
#[must_use]
pub fn handle_midnight_span(start: NaiveTime, end: NaiveTime, now: LocalTimestamp) -> Window {
    let today = now.date();
    let mut window = Window {
        start: today.and_time(start),
        end: today.and_time(end),
    };
    if start >= end {
        if now.time() <= end {
            window.start -= Duration::days(1);
        } else {
            window.end += Duration::days(1);
        }
    } else if now - window.end > Duration::hours(12) {
        window.start += Duration::days(1);
        window.end += Duration::days(1);
    }
    window
}

/// Resolve authored start/end strings into a window for the day of `now`.
///
/// Without an end, the window closes `default_window_minutes` after start.
#[must_use]
pub fn calculate_schedule_times(
    start: &str,
    end: Option<&str>,
    now: LocalTimestamp,
    default_window_minutes: i64,
) -> Window {
    let start = parse_time(start);
    let end = match end {
        Some(end) => parse_time(end),
        None => {
            start
                .overflowing_add_signed(Duration::minutes(default_window_minutes))
                .0
        }
    };
    handle_midnight_span(start, end, now)
}

/// Linear progress of `now` from `start` to `end`, clamped to `[0, 1]`.
///
/// Returns exactly `0.0` at or before `start` and `1.0` at or after `end`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_progress(now: LocalTimestamp, start: LocalTimestamp, end: LocalTimestamp) -> f64 {
    if now <= start {
        return 0.0;
    }
    if now >= end {
        return 1.0;
    }
    let elapsed = (now - start).num_milliseconds() as f64;
    let total = (end - start).num_milliseconds() as f64;
    (elapsed / total).clamp(0.0, 1.0)
}

/// Resolve a [`TimeRef`] into a time string.
///
/// - a literal containing `:` is returned as-is
/// - a literal without `:` is tried as an entity id, falling back to itself
/// - an entity reference must resolve, otherwise it is an error
///
/// # Errors
///
/// Returns [`TimeResolutionError`] when an entity reference has no state.
pub fn resolve_time_ref<F>(time: &TimeRef, lookup: F) -> Result<String, TimeResolutionError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |id: &str| lookup(id).filter(|state| !state.is_empty());
    match time {
        TimeRef::Literal(value) if value.contains(':') => Ok(value.clone()),
        TimeRef::Literal(value) => Ok(lookup(value).unwrap_or_else(|| value.clone())),
        TimeRef::Entity { entity_id } => lookup(entity_id).ok_or_else(|| TimeResolutionError {
            entity_id: entity_id.clone(),
        }),
    }
}
