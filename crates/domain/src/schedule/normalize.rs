//! Schedule normalization: authored definitions → per-cycle windows.

use chrono::Duration;

use super::{
    Condition, EntityMatcher, Interpolation, ScheduleDefinition, ScheduleKind, StateOverrides,
    TagTable,
};
use crate::error::HomeRulesError;
use crate::time::LocalTimestamp;
use crate::window::{Window, calculate_schedule_times, resolve_time_ref};

/// A schedule resolved for one evaluation cycle.
#[derive(Debug, Clone)]
pub struct NormalizedSchedule {
    /// Position in the definition list; earlier wins precedence ties.
    pub index: usize,
    pub name: String,
    pub matchers: Vec<EntityMatcher>,
    pub tags: Vec<String>,
    pub window: Window,
    pub precedence: i32,
    pub kind: ScheduleKind,
    pub conditions: Vec<Condition>,
    pub interpolation: Interpolation,
    pub default_states: StateOverrides,
    pub unidirectional: bool,
}

impl NormalizedSchedule {
    /// Resolve times and compile matchers of `definition` for the day of `now`.
    ///
    /// Trigger schedules without an end get a window of
    /// `trigger_window_minutes` after their start.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::TimeResolution`] when an entity-time
    /// reference cannot be resolved, or [`HomeRulesError::Pattern`] when a
    /// matcher does not compile.
    pub fn from_definition<F>(
        definition: &ScheduleDefinition,
        index: usize,
        now: LocalTimestamp,
        trigger_window_minutes: i64,
        lookup: F,
    ) -> Result<Self, HomeRulesError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let start = resolve_time_ref(&definition.start, &lookup)?;
        let end = definition
            .end
            .as_ref()
            .map(|end| resolve_time_ref(end, &lookup))
            .transpose()?;
        let default_window = match definition.kind {
            ScheduleKind::Trigger => trigger_window_minutes,
            ScheduleKind::Continuous => 0,
        };
        let window = calculate_schedule_times(&start, end.as_deref(), now, default_window);
        Ok(Self {
            index,
            name: definition.name.clone(),
            matchers: EntityMatcher::compile_all(&definition.entities)?,
            tags: definition.tags.clone(),
            window,
            precedence: definition.precedence,
            kind: definition.kind,
            conditions: definition.conditions.clone(),
            interpolation: definition.interpolation,
            default_states: definition.default_states.clone(),
            unidirectional: definition.unidirectional,
        })
    }

    /// Whether `now` lies inside the schedule window.
    #[must_use]
    pub fn is_active(&self, now: LocalTimestamp) -> bool {
        self.window.contains(now)
    }

    /// The first matcher accepting the entity, if any.
    #[must_use]
    pub fn matcher_for(&self, entity_id: &str) -> Option<&EntityMatcher> {
        self.matchers.iter().find(|m| m.is_match(entity_id))
    }

    /// Whether the schedule targets the entity, by id or by tag.
    #[must_use]
    pub fn targets(&self, entity_id: &str, tags: &TagTable) -> bool {
        self.matcher_for(entity_id).is_some() || tags.matches(entity_id, &self.tags)
    }

    #[must_use]
    pub fn start_time(&self) -> String {
        self.window.start.format("%H:%M:%S").to_string()
    }

    #[must_use]
    pub fn end_time(&self) -> String {
        self.window.end.format("%H:%M:%S").to_string()
    }

    pub(crate) fn preamble(&self) -> Duration {
        Duration::minutes(i64::from(self.interpolation.preamble_minutes))
    }

    pub(crate) fn postamble(&self) -> Duration {
        Duration::minutes(i64::from(self.interpolation.postamble_minutes))
    }
}
