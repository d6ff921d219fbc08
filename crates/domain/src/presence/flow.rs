//! Flow info and the presence transition table.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{Aggregate, PresenceState};
use crate::time::Timestamp;

/// Cooldown used when a topic configures none.
pub const DEFAULT_COOL_DOWN_SECS: i64 = 10 * 60;
/// Upper bound of any cooldown.
pub const MAX_COOL_DOWN_SECS: i64 = 30 * 60;

/// Cooldown after a presence period of length `dwell`.
///
/// `min(MAX, base + sqrt(floor(dwell minutes)) * 120)` seconds, so it never
/// decreases with dwell time and never exceeds [`MAX_COOL_DOWN_SECS`].
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_cool_down(dwell: Duration, base: Duration) -> Duration {
    let minutes = dwell.num_minutes().max(0) as f64;
    let base_ms = base.num_milliseconds().max(0) as f64;
    let cool_down_ms = base_ms + minutes.sqrt() * 120_000.0;
    let capped = cool_down_ms.min((MAX_COOL_DOWN_SECS * 1000) as f64);
    Duration::milliseconds(capped.round() as i64)
}

/// What the state machine asks the entity set to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceCommand {
    TurnOn,
    TurnOff,
}

impl PresenceCommand {
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
        }
    }
}

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PresenceState,
    pub to: PresenceState,
    pub command: Option<PresenceCommand>,
    /// When set, the topic must be re-checked after this delay.
    pub recheck_after: Option<Duration>,
}

impl Transition {
    #[must_use]
    pub fn unchanged(state: PresenceState) -> Self {
        Self {
            from: state,
            to: state,
            command: None,
            recheck_after: None,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Human readable label such as `on → pending_off`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// Persisted presence context of one topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    pub state: PresenceState,
    pub last_on: Option<Timestamp>,
    pub last_off: Option<Timestamp>,
    pub cool_down_end_time: Option<Timestamp>,
    pub delay_ms: i64,
}

impl FlowInfo {
    /// Time left before a pending off settles.
    #[must_use]
    pub fn cool_down_remaining(&self, now: Timestamp) -> Duration {
        self.cool_down_end_time
            .map_or(Duration::zero(), |end| (end - now).max(Duration::zero()))
    }

    #[must_use]
    pub fn in_cool_down(&self, now: Timestamp) -> bool {
        self.cool_down_remaining(now) > Duration::zero()
    }

    fn clear_cool_down(&mut self) {
        self.cool_down_end_time = None;
        self.delay_ms = 0;
    }

    /// Step the machine with a fresh aggregate signal.
    pub fn apply(&mut self, aggregate: Aggregate, base: Duration, now: Timestamp) -> Transition {
        let from = self.state;
        let mut transition = Transition::unchanged(from);
        match (aggregate, from) {
            (Aggregate::On, PresenceState::On) => {}
            (Aggregate::On, _) => {
                self.clear_cool_down();
                self.last_on = Some(now);
                self.state = PresenceState::On;
                transition.command = Some(PresenceCommand::TurnOn);
            }
            (Aggregate::Off, PresenceState::On) => {
                let dwell = self.last_on.map_or(Duration::zero(), |on| now - on);
                let delay = calculate_cool_down(dwell, base);
                self.last_off = Some(now);
                self.cool_down_end_time = Some(now + delay);
                self.delay_ms = delay.num_milliseconds();
                self.state = PresenceState::PendingOff;
                transition.command = Some(PresenceCommand::TurnOff);
                transition.recheck_after = Some(delay);
            }
            (Aggregate::Off | Aggregate::Unknown, PresenceState::PendingOff) => {
                return self.expire(now);
            }
            (Aggregate::Off, PresenceState::Unknown) => {
                self.last_off = Some(now);
                self.state = PresenceState::Off;
                transition.command = Some(PresenceCommand::TurnOff);
            }
            (Aggregate::Unknown, PresenceState::On) => {
                self.state = PresenceState::Unknown;
            }
            (Aggregate::Off | Aggregate::Unknown, PresenceState::Off)
            | (Aggregate::Unknown, PresenceState::Unknown) => {}
        }
        transition.to = self.state;
        transition
    }

    /// Settle a pending off once its cooldown has elapsed. A no-op in any
    /// other state, so stale re-checks are harmless.
    pub fn expire(&mut self, now: Timestamp) -> Transition {
        let from = self.state;
        if from != PresenceState::PendingOff {
            return Transition::unchanged(from);
        }
        if self.in_cool_down(now) {
            let mut transition = Transition::unchanged(from);
            transition.recheck_after = Some(self.cool_down_remaining(now));
            return transition;
        }
        self.clear_cool_down();
        self.state = PresenceState::Off;
        Transition {
            from,
            to: PresenceState::Off,
            command: None,
            recheck_after: None,
        }
    }

    /// Force the topic off. Emits an off command only when entities may
    /// still be on.
    pub fn reset(&mut self) -> Transition {
        let from = self.state;
        self.clear_cool_down();
        self.state = PresenceState::Off;
        Transition {
            from,
            to: PresenceState::Off,
            command: matches!(from, PresenceState::On | PresenceState::Unknown)
                .then_some(PresenceCommand::TurnOff),
            recheck_after: None,
        }
    }
}
