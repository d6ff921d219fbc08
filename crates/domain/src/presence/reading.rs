//! Sensor readings, the per-topic sensor map, and presence states.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical presence state of a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    #[default]
    Off,
    On,
    Unknown,
    PendingOff,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Unknown => "unknown",
            Self::PendingOff => "pending_off",
        })
    }
}

/// A normalized sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorReading {
    On,
    Off,
    Unknown,
    /// Clears every sensor of the topic and forces it off.
    Reset,
    /// A reset swallowed by the debounce window.
    Ignored,
}

impl SensorReading {
    /// Normalize a raw sensor state; anything unrecognised is `Unknown`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" | "home" | "detected" | "true" => Self::On,
            "off" | "not_home" | "clear" | "false" => Self::Off,
            "reset" => Self::Reset,
            "ignored" => Self::Ignored,
            _ => Self::Unknown,
        }
    }
}

/// Aggregate presence signal of all sensors of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    On,
    Off,
    Unknown,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        })
    }
}

/// Last known reading of every sensor of one topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorPresenceMap(BTreeMap<String, SensorReading>);

impl SensorPresenceMap {
    /// Record a reading. Only `on`, `off` and `unknown` are stored.
    pub fn update(&mut self, entity_id: &str, reading: SensorReading) {
        if matches!(
            reading,
            SensorReading::On | SensorReading::Off | SensorReading::Unknown
        ) {
            self.0.insert(entity_id.to_string(), reading);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<SensorReading> {
        self.0.get(entity_id).copied()
    }

    /// `Unknown` when every sensor is unknown, `On` when any is on,
    /// `Off` otherwise.
    #[must_use]
    pub fn aggregate(&self) -> Aggregate {
        if self.0.values().all(|r| *r == SensorReading::Unknown) {
            Aggregate::Unknown
        } else if self.0.values().any(|r| *r == SensorReading::On) {
            Aggregate::On
        } else {
            Aggregate::Off
        }
    }
}
