//! Presence — per-topic state machine with cooldown-debounced turn-off.
//!
//! A *topic* groups several binary sensors that drive one set of entities.
//! Every sensor event updates the topic's [`SensorPresenceMap`], the map is
//! reduced to an [`Aggregate`], and [`FlowInfo::apply`] moves the topic
//! between [`PresenceState`]s, emitting at most one [`PresenceCommand`].
//!
//! ```text
//!          aggregate on                    aggregate off
//!   OFF ─────────────────▶ ON ───────────────────────────▶ PENDING_OFF
//!    ▲                     ▲ │ aggregate unknown                │
//!    │ aggregate off       │ ▼                                  │ cooldown elapsed
//!    └──────────────── UNKNOWN                                  ▼
//!                                                              OFF
//! ```

mod debounce;
mod flow;
mod history;
mod reading;

pub use debounce::{RESET_DEBOUNCE_SECS, ResetDebounce};
pub use flow::{
    DEFAULT_COOL_DOWN_SECS, FlowInfo, MAX_COOL_DOWN_SECS, PresenceCommand, Transition,
    calculate_cool_down,
};
pub use history::{HISTORY_CAPACITY, TransitionHistory, TransitionRecord};
pub use reading::{Aggregate, PresenceState, SensorPresenceMap, SensorReading};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Every persisted piece of one topic, loaded and saved together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicContext {
    pub flow: FlowInfo,
    pub sensors: SensorPresenceMap,
    pub history: TransitionHistory,
    pub debounce: ResetDebounce,
}

impl TopicContext {
    /// Feed one sensor reading through debounce, aggregation and the
    /// state machine.
    pub fn process(
        &mut self,
        entity_id: &str,
        reading: SensorReading,
        base_cool_down: Duration,
        now: Timestamp,
    ) -> Transition {
        let reading = self.debounce.filter(reading, now);
        let transition = match reading {
            SensorReading::Ignored => Transition::unchanged(self.flow.state),
            SensorReading::Reset => {
                self.sensors.clear();
                self.flow.reset()
            }
            reading => {
                self.sensors.update(entity_id, reading);
                self.flow
                    .apply(self.sensors.aggregate(), base_cool_down, now)
            }
        };
        if transition.changed() {
            self.history.push(transition.to, now);
        }
        transition
    }

    /// Re-check a pending cooldown against the live flow state.
    pub fn recheck(&mut self, now: Timestamp) -> Transition {
        let transition = self.flow.expire(now);
        if transition.changed() {
            self.history.push(transition.to, now);
        }
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Duration {
        Duration::seconds(300)
    }

    fn t0() -> Timestamp {
        chrono::DateTime::parse_from_rfc3339("2024-05-10T08:00:00Z")
            .unwrap()
            .into()
    }

    #[test]
    fn should_follow_bathroom_motion_scenario() {
        let mut ctx = TopicContext::default();
        ctx.sensors
            .update("binary_sensor.motion_b", SensorReading::Off);

        let on = ctx.process("binary_sensor.motion_a", SensorReading::On, base(), t0());
        assert_eq!(on.to, PresenceState::On);
        assert_eq!(on.command, Some(PresenceCommand::TurnOn));

        let off_at = t0() + Duration::seconds(10);
        let off = ctx.process("binary_sensor.motion_a", SensorReading::Off, base(), off_at);
        assert_eq!(off.to, PresenceState::PendingOff);
        assert_eq!(off.command, Some(PresenceCommand::TurnOff));
        assert_eq!(ctx.flow.cool_down_end_time, Some(off_at + base()));

        let during = ctx.recheck(t0() + Duration::seconds(200));
        assert_eq!(during.to, PresenceState::PendingOff);
        assert!(during.command.is_none());

        let after = ctx.recheck(off_at + Duration::seconds(301));
        assert_eq!(after.to, PresenceState::Off);
        assert!(after.command.is_none());
    }

    #[test]
    fn should_cancel_pending_off_when_presence_returns() {
        let mut ctx = TopicContext::default();
        ctx.process("binary_sensor.a", SensorReading::On, base(), t0());
        ctx.process(
            "binary_sensor.a",
            SensorReading::Off,
            base(),
            t0() + Duration::seconds(5),
        );

        let back = ctx.process(
            "binary_sensor.a",
            SensorReading::On,
            base(),
            t0() + Duration::seconds(60),
        );
        assert_eq!(back.from, PresenceState::PendingOff);
        assert_eq!(back.to, PresenceState::On);
        assert!(ctx.flow.cool_down_end_time.is_none());

        let stale = ctx.recheck(t0() + Duration::seconds(400));
        assert_eq!(stale.to, PresenceState::On);
        assert!(stale.command.is_none());
    }

    #[test]
    fn should_ignore_repeated_reset_within_debounce_window() {
        let mut ctx = TopicContext::default();
        ctx.process("binary_sensor.a", SensorReading::On, base(), t0());

        let first = ctx.process(
            "binary_sensor.a",
            SensorReading::Reset,
            base(),
            t0() + Duration::seconds(1),
        );
        assert_eq!(first.to, PresenceState::Off);
        assert_eq!(first.command, Some(PresenceCommand::TurnOff));
        assert!(ctx.sensors.is_empty());

        ctx.process(
            "binary_sensor.a",
            SensorReading::On,
            base(),
            t0() + Duration::seconds(2),
        );
        let second = ctx.process(
            "binary_sensor.a",
            SensorReading::Reset,
            base(),
            t0() + Duration::seconds(10),
        );
        assert_eq!(second.to, PresenceState::On);
        assert!(second.command.is_none());
    }

    #[test]
    fn should_record_on_unknown_off_sequence_in_history() {
        let mut ctx = TopicContext::default();
        ctx.process("binary_sensor.a", SensorReading::On, base(), t0());
        ctx.process(
            "binary_sensor.a",
            SensorReading::Unknown,
            base(),
            t0() + Duration::seconds(5),
        );
        let off = ctx.process(
            "binary_sensor.a",
            SensorReading::Off,
            base(),
            t0() + Duration::seconds(9),
        );
        assert_eq!(off.from, PresenceState::Unknown);
        assert_eq!(off.command, Some(PresenceCommand::TurnOff));
        assert!(ctx.history.is_on_unknown_off_sequence());
    }
}
