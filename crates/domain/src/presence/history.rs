//! Bounded transition history of a topic.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::PresenceState;
use crate::time::Timestamp;

/// Maximum number of transitions kept per topic.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub state: PresenceState,
    pub timestamp: Timestamp,
}

/// Ring buffer of the latest [`HISTORY_CAPACITY`] transitions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionHistory(VecDeque<TransitionRecord>);

impl TransitionHistory {
    /// Append a transition, evicting the oldest one when full.
    pub fn push(&mut self, state: PresenceState, timestamp: Timestamp) {
        if self.0.len() == HISTORY_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(TransitionRecord { state, timestamp });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.0.iter()
    }

    /// Whether the three latest transitions are on, unknown, off.
    #[must_use]
    pub fn is_on_unknown_off_sequence(&self) -> bool {
        let mut latest = self.0.iter().rev().map(|r| r.state);
        matches!(
            (latest.next(), latest.next(), latest.next()),
            (
                Some(PresenceState::Off),
                Some(PresenceState::Unknown),
                Some(PresenceState::On)
            )
        )
    }
}
