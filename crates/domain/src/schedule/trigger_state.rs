//! Trigger-state tracking: one-shot on/off edges per schedule and entity.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{EntityMatcher, NormalizedSchedule, determine_action};
use crate::action::Action;
use crate::entity::Entity;
use crate::time::LocalTimestamp;
use crate::window::is_within_window;

/// Age after which an entry is dropped regardless of its edges.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// When the on and off edges of one schedule cycle fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerStateEntry {
    pub on: Option<LocalTimestamp>,
    pub off: Option<LocalTimestamp>,
}

impl TriggerStateEntry {
    /// Most recent edge.
    #[must_use]
    pub fn latest(&self) -> Option<LocalTimestamp> {
        self.on.max(self.off)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.off.is_none()
    }
}

/// Persisted table of trigger entries keyed by `{schedule}_{entity}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerStates(BTreeMap<String, TriggerStateEntry>);

impl TriggerStates {
    #[must_use]
    pub fn key(schedule: &str, entity_id: &str) -> String {
        format!("{schedule}_{entity_id}")
    }

    #[must_use]
    pub fn get(&self, schedule: &str, entity_id: &str) -> Option<&TriggerStateEntry> {
        self.0.get(&Self::key(schedule, entity_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trigger semantics for one entity.
    ///
    /// Within `window` of the start the on-action fires once; within `window`
    /// of the end the off-action fires once and wins if both fire in the same
    /// call. An edge is recorded only when an action is emitted. The entry is
    /// dropped once `now` is past the end window, and restarted when its
    /// latest edge predates the current cycle's start window.
    pub fn evaluate(
        &mut self,
        entity: &Entity,
        schedule: &NormalizedSchedule,
        matcher: Option<&EntityMatcher>,
        now: LocalTimestamp,
        window: Duration,
    ) -> Option<Action> {
        let key = Self::key(&schedule.name, &entity.entity_id);
        let start = schedule.window.start;
        let end = schedule.window.end;

        let mut entry = self.0.get(&key).copied().unwrap_or_default();
        if entry.latest().is_some_and(|latest| latest < start - window) {
            entry = TriggerStateEntry::default();
        }

        let mut action = None;
        if is_within_window(now, start, window) && entry.on.is_none() {
            if let Some(on) = determine_action(entity, schedule, matcher, true) {
                entry.on = Some(now);
                action = Some(on);
            }
        }
        if is_within_window(now, end, window) && entry.off.is_none() {
            if let Some(off) = determine_action(entity, schedule, matcher, false) {
                entry.off = Some(now);
                action = Some(off);
            }
        }

        if now > end + window || entry.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, entry);
        }
        action
    }

    /// Drop entries whose latest edge is older than `max_age`. Returns how
    /// many were removed.
    pub fn cleanup(&mut self, now: LocalTimestamp, max_age: Duration) -> usize {
        let before = self.0.len();
        self.0.retain(|_, entry| {
            entry
                .latest()
                .is_some_and(|latest| now - latest <= max_age)
        });
        before - self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ScheduleDefinition, ScheduleKind};
    use chrono::NaiveDate;

    fn day_start() -> LocalTimestamp {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn evening_lights() -> ScheduleDefinition {
        ScheduleDefinition::builder()
            .name("evening")
            .entity("light.porch")
            .kind(ScheduleKind::Trigger)
            .start("07:00")
            .end("22:00")
            .build()
            .unwrap()
    }

    fn evaluate(
        states: &mut TriggerStates,
        definition: &ScheduleDefinition,
        entity: &Entity,
        now: LocalTimestamp,
    ) -> Option<Action> {
        let schedule =
            NormalizedSchedule::from_definition(definition, 0, now, 10, |_| None).unwrap();
        let matcher = schedule.matcher_for(&entity.entity_id).cloned();
        states.evaluate(
            entity,
            &schedule,
            matcher.as_ref(),
            now,
            Duration::minutes(10),
        )
    }

    #[test]
    fn should_fire_exactly_one_on_and_one_off_per_day() {
        let definition = evening_lights();
        let mut states = TriggerStates::default();
        let mut entity = Entity::new("light.porch", "off");
        let mut services = Vec::new();

        for minute in 0..(2 * 24 * 60) {
            let now = day_start() + Duration::minutes(minute);
            if let Some(action) = evaluate(&mut states, &definition, &entity, now) {
                let on = action.service == "turn_on";
                entity.state = if on { "on" } else { "off" }.to_string();
                services.push((minute / (24 * 60), action.service));
            }
        }

        for day in 0..2 {
            let today: Vec<&str> = services
                .iter()
                .filter(|(d, _)| *d == day)
                .map(|(_, s)| s.as_str())
                .collect();
            assert_eq!(today, vec!["turn_on", "turn_off"], "day {day}");
        }
    }

    #[test]
    fn should_not_record_edge_when_no_action_needed() {
        let definition = evening_lights();
        let mut states = TriggerStates::default();
        let entity = Entity::new("light.porch", "on");
        let now = day_start() + Duration::hours(7);
        assert!(evaluate(&mut states, &definition, &entity, now).is_none());
        assert!(states.get("evening", "light.porch").is_none());
    }

    #[test]
    fn should_fire_off_edge_when_start_and_end_windows_overlap() {
        let definition = ScheduleDefinition::builder()
            .name("short")
            .entity("switch.pump")
            .start("07:00")
            .build()
            .unwrap();
        let mut states = TriggerStates::default();
        let entity = Entity::new("switch.pump", "on");
        let now = day_start() + Duration::hours(7);
        let action = evaluate(&mut states, &definition, &entity, now).unwrap();
        assert_eq!(action.service, "turn_off");
        let entry = states.get("short", "switch.pump").unwrap();
        assert!(entry.on.is_none());
        assert_eq!(entry.off, Some(now));
    }

    #[test]
    fn should_drop_entries_older_than_max_age() {
        let mut states = TriggerStates::default();
        states.0.insert(
            TriggerStates::key("a", "light.x"),
            TriggerStateEntry {
                on: Some(day_start()),
                off: None,
            },
        );
        states.0.insert(
            TriggerStates::key("b", "light.y"),
            TriggerStateEntry {
                on: Some(day_start() + Duration::hours(20)),
                off: None,
            },
        );
        let removed = states.cleanup(day_start() + Duration::hours(25), Duration::hours(24));
        assert_eq!(removed, 1);
        assert!(states.get("b", "light.y").is_some());
    }
}
