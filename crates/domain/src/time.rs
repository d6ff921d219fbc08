//! Time and timestamp helpers.
//!
//! Presence bookkeeping uses UTC [`Timestamp`]s. Schedules are authored in
//! wall-clock time, so schedule evaluation works on [`LocalTimestamp`]s.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// UTC timestamp used for presence transitions and debounce windows.
pub type Timestamp = DateTime<Utc>;

/// Wall-clock date and time used by schedule windows.
pub type LocalTimestamp = NaiveDateTime;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current wall-clock time in the host time zone.
#[must_use]
pub fn local_now() -> LocalTimestamp {
    Local::now().naive_local()
}
