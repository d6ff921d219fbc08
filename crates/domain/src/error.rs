//! Common error types used across the workspace.
//!
//! Each failure family has its own typed error, converted into
//! [`HomeRulesError`] via `#[from]`.

/// Top-level error for the rules engine.
#[derive(Debug, thiserror::Error)]
pub enum HomeRulesError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("time resolution error")]
    TimeResolution(#[from] TimeResolutionError),

    #[error("invalid pattern")]
    Pattern(#[from] PatternError),

    #[error("storage error")]
    Storage(#[from] StorageError),
}

/// Invariant violations detected when building configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("schedule {schedule} is continuous and requires an end time")]
    MissingEnd { schedule: String },

    #[error("schedule {schedule} has neither entity matchers nor tags")]
    NoTargets { schedule: String },

    #[error("presence topic {topic} has no target entities")]
    NoTopicEntities { topic: String },

    #[error("duplicate {kind} name {name}")]
    DuplicateName { kind: &'static str, name: String },
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An entity-time reference could not be resolved to a time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entity '{entity_id}' not found or has no state")]
pub struct TimeResolutionError {
    pub entity_id: String,
}

/// A matcher or tag pattern failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid pattern '{pattern}'")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Failures of the persistent context store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to encode value for key {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode value for key {key}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
