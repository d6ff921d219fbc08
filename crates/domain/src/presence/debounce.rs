//! Reset debounce: collapses bursts of reset signals into the first one.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::SensorReading;
use crate::time::Timestamp;

/// Seconds during which repeated resets are ignored.
pub const RESET_DEBOUNCE_SECS: i64 = 30;

fn window() -> Duration {
    Duration::seconds(RESET_DEBOUNCE_SECS)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetDebounce {
    pub active: bool,
    pub start_time: Option<Timestamp>,
}

impl ResetDebounce {
    /// Pass a reading through the debounce; a reset seen while the window is
    /// open becomes [`SensorReading::Ignored`].
    pub fn filter(&mut self, reading: SensorReading, now: Timestamp) -> SensorReading {
        if self.active && self.start_time.is_none_or(|start| now - start > window()) {
            self.active = false;
            self.start_time = None;
        }
        if reading != SensorReading::Reset {
            return reading;
        }
        if self.active {
            return SensorReading::Ignored;
        }
        self.active = true;
        self.start_time = Some(now);
        reading
    }

    /// Time left in the debounce window.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        match (self.active, self.start_time) {
            (true, Some(start)) => (window() - (now - start)).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }
}
