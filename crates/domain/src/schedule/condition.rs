//! Condition — a guard that must hold for a schedule to be considered.

use serde::{Deserialize, Serialize};

/// Entity whose state carries the household presence mode.
pub const DEFAULT_PRESENCE_ENTITY: &str = "input_select.home_status";

/// A predicate that must hold for a schedule to apply.
///
/// All conditions of a schedule must be satisfied (logical AND).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Requires the presence entity to be in the given state.
    Presence { value: String },
    /// Requires an arbitrary entity to be in the given state.
    State {
        #[serde(default)]
        entity_id: String,
        value: String,
    },
}

impl Condition {
    /// Evaluate against the current presence state and an entity lookup.
    ///
    /// A `State` condition without an entity id always holds.
    pub fn is_satisfied<F>(&self, presence: Option<&str>, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Self::Presence { value } => presence == Some(value.as_str()),
            Self::State { entity_id, .. } if entity_id.is_empty() => true,
            Self::State { entity_id, value } => lookup(entity_id).as_deref() == Some(value),
        }
    }
}

/// Evaluate every condition; an empty list holds.
pub fn all_satisfied<F>(conditions: &[Condition], presence: Option<&str>, lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    conditions
        .iter()
        .all(|condition| condition.is_satisfied(presence, &lookup))
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Presence { value } => write!(f, "presence({value})"),
            Self::State { entity_id, value } => write!(f, "state({entity_id}, {value})"),
        }
    }
}
