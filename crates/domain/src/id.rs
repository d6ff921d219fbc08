//! Evaluation identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one evaluation (a sensor event or a schedule tick) in debug
/// payloads and tracing spans. Serialized as a bare UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(uuid::Uuid);

impl Default for EvaluationId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl EvaluationId {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_stamp_each_evaluation_differently() {
        assert_ne!(EvaluationId::new(), EvaluationId::new());
    }

    #[test]
    fn should_serialize_as_plain_uuid_string() {
        let id = EvaluationId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
