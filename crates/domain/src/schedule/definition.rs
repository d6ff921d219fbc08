//! Schedule definitions as authored in configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Condition;
use crate::error::{HomeRulesError, ValidationError};
use crate::window::TimeRef;

/// Activation semantics of a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Re-enforced on every evaluation.
    Continuous,
    /// Fires once per activation edge.
    #[default]
    Trigger,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Continuous => "continuous",
            Self::Trigger => "trigger",
        })
    }
}

/// State, service and data to apply for one side (on or off) of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl EntityStateSpec {
    #[must_use]
    pub fn state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Optional on/off specs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<EntityStateSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off: Option<EntityStateSpec>,
}

impl StateOverrides {
    #[must_use]
    pub fn get(&self, active: bool) -> Option<&EntityStateSpec> {
        if active {
            self.on.as_ref()
        } else {
            self.off.as_ref()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.off.is_none()
    }
}

/// One or several entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::One(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        };
        items.iter().map(String::as_str)
    }
}

/// How a schedule selects entities.
///
/// A plain string is an exact entity id, or a regular expression when it
/// starts with `regex:`. The object form attaches per-entity overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityMatch {
    Id(String),
    Config {
        entity_id: OneOrMany,
        #[serde(default, skip_serializing_if = "StateOverrides::is_empty")]
        states: StateOverrides,
    },
}

impl From<&str> for EntityMatch {
    fn from(value: &str) -> Self {
        Self::Id(value.to_string())
    }
}

/// Ramp event settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpolation {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub preamble_minutes: u32,
    #[serde(default)]
    pub postamble_minutes: u32,
    /// When `false`, ramp events are not emitted even if enabled.
    #[serde(default = "default_true")]
    pub events: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Interpolation {
    fn default() -> Self {
        Self {
            enabled: true,
            preamble_minutes: 0,
            postamble_minutes: 0,
            events: true,
        }
    }
}

/// A schedule as authored, before its times are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityMatch>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start: TimeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeRef>,
    #[serde(default)]
    pub precedence: i32,
    #[serde(default, rename = "type")]
    pub kind: ScheduleKind,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default, alias = "defaultStates")]
    pub default_states: StateOverrides,
    /// Never act on the inactive side, e.g. lock but never unlock.
    #[serde(default)]
    pub unidirectional: bool,
}

impl ScheduleDefinition {
    /// Create a builder for constructing a [`ScheduleDefinition`].
    #[must_use]
    pub fn builder() -> ScheduleDefinitionBuilder {
        ScheduleDefinitionBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - a continuous schedule has no end ([`ValidationError::MissingEnd`])
    /// - neither entities nor tags are given ([`ValidationError::NoTargets`])
    pub fn validate(&self) -> Result<(), HomeRulesError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.kind == ScheduleKind::Continuous && self.end.is_none() {
            return Err(ValidationError::MissingEnd {
                schedule: self.name.clone(),
            }
            .into());
        }
        if self.entities.is_empty() && self.tags.is_empty() {
            return Err(ValidationError::NoTargets {
                schedule: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`ScheduleDefinition`].
#[derive(Debug, Default)]
pub struct ScheduleDefinitionBuilder {
    name: Option<String>,
    entities: Vec<EntityMatch>,
    tags: Vec<String>,
    start: Option<TimeRef>,
    end: Option<TimeRef>,
    precedence: i32,
    kind: ScheduleKind,
    conditions: Vec<Condition>,
    interpolation: Interpolation,
    default_states: StateOverrides,
    unidirectional: bool,
}

impl ScheduleDefinitionBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn entity(mut self, entity: impl Into<EntityMatch>) -> Self {
        self.entities.push(entity.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn start(mut self, start: impl Into<TimeRef>) -> Self {
        self.start = Some(start.into());
        self
    }

    #[must_use]
    pub fn end(mut self, end: impl Into<TimeRef>) -> Self {
        self.end = Some(end.into());
        self
    }

    #[must_use]
    pub fn precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ScheduleKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    #[must_use]
    pub fn default_on(mut self, spec: EntityStateSpec) -> Self {
        self.default_states.on = Some(spec);
        self
    }

    #[must_use]
    pub fn default_off(mut self, spec: EntityStateSpec) -> Self {
        self.default_states.off = Some(spec);
        self
    }

    #[must_use]
    pub fn unidirectional(mut self, unidirectional: bool) -> Self {
        self.unidirectional = unidirectional;
        self
    }

    /// Consume the builder, validate, and return a [`ScheduleDefinition`].
    ///
    /// A missing start defaults to midnight.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<ScheduleDefinition, HomeRulesError> {
        let schedule = ScheduleDefinition {
            name: self.name.unwrap_or_default(),
            entities: self.entities,
            tags: self.tags,
            start: self.start.unwrap_or_else(|| TimeRef::from("00:00")),
            end: self.end,
            precedence: self.precedence,
            kind: self.kind,
            conditions: self.conditions,
            interpolation: self.interpolation,
            default_states: self.default_states,
            unidirectional: self.unidirectional,
        };
        schedule.validate()?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_trigger_kind() {
        let schedule = ScheduleDefinition::builder()
            .name("night_lock")
            .entity("lock.front_door")
            .start("23:00")
            .build()
            .unwrap();
        assert_eq!(schedule.kind, ScheduleKind::Trigger);
        assert!(schedule.interpolation.enabled);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = ScheduleDefinition::builder().entity("light.a").build();
        assert!(matches!(
            result,
            Err(HomeRulesError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_require_end_for_continuous_schedule() {
        let result = ScheduleDefinition::builder()
            .name("plants")
            .entity("switch.grow")
            .kind(ScheduleKind::Continuous)
            .start("06:00")
            .build();
        assert!(matches!(
            result,
            Err(HomeRulesError::Validation(ValidationError::MissingEnd { .. }))
        ));
    }

    #[test]
    fn should_require_entities_or_tags() {
        let result = ScheduleDefinition::builder()
            .name("empty")
            .start("06:00")
            .build();
        assert!(matches!(
            result,
            Err(HomeRulesError::Validation(ValidationError::NoTargets { .. }))
        ));
    }

    #[test]
    fn should_deserialize_authored_schedule() {
        let json = serde_json::json!({
            "name": "day_status",
            "entities": ["input_select.day_status"],
            "start": {"entity_id": "sensor.wakeup_time"},
            "end": {"entity_id": "sensor.sleep_time"},
            "precedence": 50,
            "type": "continuous",
            "interpolation": {"enabled": true, "preamble_minutes": 60, "postamble_minutes": 60},
            "defaultStates": {
                "on": {"state": "day", "service": "select_option", "domain": "input_select", "data": {"option": "day"}},
                "off": {"state": "night", "service": "select_option", "data": {"option": "night"}}
            }
        });
        let schedule: ScheduleDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(schedule.kind, ScheduleKind::Continuous);
        assert_eq!(schedule.interpolation.preamble_minutes, 60);
        let on = schedule.default_states.on.as_ref().unwrap();
        assert_eq!(on.state.as_deref(), Some("day"));
        assert_eq!(on.data.get("option"), Some(&Value::from("day")));
        schedule.validate().unwrap();
    }

    #[test]
    fn should_deserialize_entity_config_with_overrides() {
        let json = serde_json::json!({
            "entity_id": ["cover.a", "cover.b"],
            "states": {"on": {"state": "open"}}
        });
        let matcher: EntityMatch = serde_json::from_value(json).unwrap();
        let EntityMatch::Config { entity_id, states } = matcher else {
            panic!("expected config form");
        };
        assert_eq!(entity_id.iter().count(), 2);
        assert!(states.on.is_some());
        assert!(states.off.is_none());
    }
}
