//! Schedule service — one evaluation cycle over every schedule.
//!
//! A cycle resolves entity-time references, normalizes the definitions for
//! `now`, drops schedules whose conditions fail, then picks one schedule per
//! candidate entity and applies its continuous or trigger semantics. A
//! schedule that fails to normalize is skipped for the cycle only.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Duration;
use homerules_domain::action::{Action, group_actions};
use homerules_domain::entity::Entity;
use homerules_domain::error::{HomeRulesError, ValidationError};
use homerules_domain::id::EvaluationId;
use homerules_domain::schedule::{
    Condition, DEFAULT_MAX_AGE_HOURS, DEFAULT_PRESENCE_ENTITY, NormalizedSchedule,
    ScheduleDefinition, ScheduleEvent, ScheduleKind, TagTable, TriggerStates, all_satisfied,
    calculate_schedule_events, evaluate_continuous, matching_schedules,
};
use homerules_domain::static_state::{EntityFilter, StaticBlacklist, StaticStates};
use homerules_domain::time::LocalTimestamp;
use homerules_domain::window::{DEFAULT_TRIGGER_WINDOW_MINUTES, TimeRef};
use serde::{Deserialize, Serialize};

use crate::keyed_lock::KeyedMutex;
use crate::ports::{ContextKey, ContextStore, EntitySnapshot, load, save};

/// Tunables of the schedule cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Entity whose state feeds `presence` conditions.
    pub presence_entity: String,
    /// Half-width of the trigger edge windows, and the length of the window
    /// synthesized for trigger schedules without an end.
    pub trigger_window_minutes: i64,
    pub trigger_state_max_age: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            presence_entity: DEFAULT_PRESENCE_ENTITY.to_string(),
            trigger_window_minutes: DEFAULT_TRIGGER_WINDOW_MINUTES,
            trigger_state_max_age: Duration::hours(DEFAULT_MAX_AGE_HOURS),
        }
    }
}

/// Inbound tick. Without `entities`, candidates are discovered from the
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTick {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
    /// Entities to leave alone for this tick only.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSchedule {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMatchInfo {
    pub entity_id: String,
    pub schedule: String,
    pub active: bool,
    pub precedence: i32,
    pub selected: bool,
}

/// Diagnostics of one schedule cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleDebug {
    pub evaluation_id: EvaluationId,
    pub schedules_defined: usize,
    pub entities_checked: usize,
    pub entities_filtered: usize,
    pub actions_generated: usize,
    pub trigger_states_removed: usize,
    pub current_time: String,
    pub active_schedules: Vec<ActiveSchedule>,
    pub skipped_schedules: Vec<String>,
    pub matches: Vec<EntityMatchInfo>,
}

/// Outcome of one schedule cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleReport {
    pub actions: Vec<Action>,
    pub events: Vec<ScheduleEvent>,
    pub debug: ScheduleDebug,
}

/// Application service evaluating schedules against entity snapshots.
pub struct ScheduleService<S, C> {
    snapshot: S,
    store: C,
    definitions: Vec<ScheduleDefinition>,
    tags: TagTable,
    settings: ScheduleSettings,
    locks: KeyedMutex,
}

impl<S, C> ScheduleService<S, C>
where
    S: EntitySnapshot + Send + Sync,
    C: ContextStore + Send + Sync,
{
    /// Create a service for the given definitions and tag table.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] for an invalid or duplicated
    /// definition, or [`HomeRulesError::Pattern`] when a tag pattern does
    /// not compile.
    pub fn new(
        snapshot: S,
        store: C,
        definitions: Vec<ScheduleDefinition>,
        tags: &BTreeMap<String, Vec<String>>,
        settings: ScheduleSettings,
    ) -> Result<Self, HomeRulesError> {
        let mut names = HashSet::new();
        for definition in &definitions {
            definition.validate()?;
            if !names.insert(definition.name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    kind: "schedule",
                    name: definition.name.clone(),
                }
                .into());
            }
        }
        Ok(Self {
            snapshot,
            store,
            definitions,
            tags: TagTable::compile(tags)?,
            settings,
            locks: KeyedMutex::new(),
        })
    }

    #[must_use]
    pub fn definitions(&self) -> &[ScheduleDefinition] {
        &self.definitions
    }

    /// Run one evaluation cycle at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot or the context store fails.
    /// Per-schedule failures are logged and skipped.
    #[tracing::instrument(skip(self, tick), fields(evaluation_id = tracing::field::Empty))]
    pub async fn evaluate(
        &self,
        tick: ScheduleTick,
        now: LocalTimestamp,
    ) -> Result<ScheduleReport, HomeRulesError> {
        let evaluation_id = EvaluationId::new();
        tracing::Span::current().record("evaluation_id", tracing::field::display(evaluation_id));

        let states = self.referenced_states().await?;
        let lookup = |entity_id: &str| states.get(entity_id).cloned();
        let presence = states
            .get(&self.settings.presence_entity)
            .map(String::as_str);

        let mut schedules = Vec::with_capacity(self.definitions.len());
        let mut skipped_schedules = Vec::new();
        for (index, definition) in self.definitions.iter().enumerate() {
            match NormalizedSchedule::from_definition(
                definition,
                index,
                now,
                self.settings.trigger_window_minutes,
                lookup,
            ) {
                Ok(schedule) if all_satisfied(&schedule.conditions, presence, lookup) => {
                    schedules.push(schedule);
                }
                Ok(schedule) => {
                    tracing::debug!(schedule = %schedule.name, "conditions not met");
                }
                Err(err) => {
                    tracing::warn!(schedule = %definition.name, error = %err, "skipping schedule");
                    skipped_schedules.push(definition.name.clone());
                }
            }
        }

        let candidates = match tick.entities {
            Some(entities) => entities,
            None => self.discover(&schedules).await?,
        };
        let candidates: Vec<Entity> = candidates
            .into_iter()
            .filter(Entity::is_available)
            .collect();

        let static_states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        let blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        let filter = EntityFilter {
            states: &static_states,
            blacklist: &blacklist,
            additional: &tick.blacklist,
        };

        let _guard = self.locks.lock(ContextKey::TRIGGERED_SCHEDULES).await;
        let mut triggers: TriggerStates = load(&self.store, ContextKey::TRIGGERED_SCHEDULES).await?;
        let trigger_states_removed = triggers.cleanup(now, self.settings.trigger_state_max_age);
        let window = Duration::minutes(self.settings.trigger_window_minutes);

        let mut actions = Vec::new();
        let mut matches = Vec::new();
        let mut entities_filtered = 0;
        for entity in &candidates {
            if filter.should_filter(&entity.entity_id) {
                entities_filtered += 1;
                continue;
            }
            let matching = matching_schedules(&entity.entity_id, &schedules, &self.tags);
            for (rank, schedule) in matching.iter().enumerate() {
                matches.push(EntityMatchInfo {
                    entity_id: entity.entity_id.clone(),
                    schedule: schedule.name.clone(),
                    active: schedule.is_active(now),
                    precedence: schedule.precedence,
                    selected: rank == 0,
                });
            }
            let Some(schedule) = matching.first() else {
                continue;
            };
            let matcher = schedule.matcher_for(&entity.entity_id);
            let action = match schedule.kind {
                ScheduleKind::Continuous => evaluate_continuous(entity, schedule, matcher, now),
                ScheduleKind::Trigger => triggers.evaluate(entity, schedule, matcher, now, window),
            };
            if let Some(action) = action {
                tracing::debug!(
                    entity_id = %entity.entity_id,
                    schedule = %schedule.name,
                    %action,
                    "schedule action"
                );
                actions.push(action);
            }
        }
        save(&self.store, ContextKey::TRIGGERED_SCHEDULES, &triggers).await?;

        let actions = group_actions(actions);
        let events = schedules
            .iter()
            .flat_map(|schedule| calculate_schedule_events(schedule, now))
            .collect();
        if !actions.is_empty() {
            tracing::info!(count = actions.len(), "schedule actions emitted");
        }

        let debug = ScheduleDebug {
            evaluation_id,
            schedules_defined: self.definitions.len(),
            entities_checked: candidates.len(),
            entities_filtered,
            actions_generated: actions.len(),
            trigger_states_removed,
            current_time: now.format("%H:%M:%S").to_string(),
            active_schedules: schedules
                .iter()
                .filter(|schedule| schedule.is_active(now))
                .map(|schedule| ActiveSchedule {
                    name: schedule.name.clone(),
                    kind: schedule.kind,
                    start: schedule.start_time(),
                    end: schedule.end_time(),
                })
                .collect(),
            skipped_schedules,
            matches,
        };
        Ok(ScheduleReport {
            actions,
            events,
            debug,
        })
    }

    /// States of every entity the definitions refer to: entity times,
    /// `state` conditions and the presence entity.
    async fn referenced_states(&self) -> Result<HashMap<String, String>, HomeRulesError> {
        let mut ids: HashSet<&str> = HashSet::new();
        ids.insert(&self.settings.presence_entity);
        for definition in &self.definitions {
            for time in std::iter::once(&definition.start).chain(definition.end.as_ref()) {
                match time {
                    TimeRef::Entity { entity_id } => {
                        ids.insert(entity_id);
                    }
                    TimeRef::Literal(value) if !value.contains(':') && value.contains('.') => {
                        ids.insert(value);
                    }
                    TimeRef::Literal(_) => {}
                }
            }
            for condition in &definition.conditions {
                if let Condition::State { entity_id, .. } = condition
                    && !entity_id.is_empty()
                {
                    ids.insert(entity_id);
                }
            }
        }

        let mut states = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.snapshot.get_entity(id).await? {
                states.insert(entity.entity_id, entity.state);
            }
        }
        Ok(states)
    }

    /// Candidates for a tick without an entity batch: exact ids directly,
    /// regexes and tag patterns by listing, de-duplicated by id.
    async fn discover(
        &self,
        schedules: &[NormalizedSchedule],
    ) -> Result<Vec<Entity>, HomeRulesError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut keep = |entity: Entity, found: &mut Vec<Entity>| {
            if seen.insert(entity.entity_id.clone()) {
                found.push(entity);
            }
        };

        for schedule in schedules {
            for matcher in &schedule.matchers {
                match matcher.exact_id() {
                    Some(id) => {
                        if let Some(entity) = self.snapshot.get_entity(id).await? {
                            keep(entity, &mut found);
                        }
                    }
                    None => {
                        for entity in self
                            .snapshot
                            .get_entities_by_pattern(matcher.pattern())
                            .await?
                        {
                            keep(entity, &mut found);
                        }
                    }
                }
            }
        }
        if schedules.iter().any(|schedule| !schedule.tags.is_empty()) {
            for pattern in self.tags.patterns() {
                for entity in self.snapshot.get_entities_by_pattern(pattern).await? {
                    keep(entity, &mut found);
                }
            }
        }
        tracing::debug!(count = found.len(), "discovered candidate entities");
        Ok(found)
    }
}
