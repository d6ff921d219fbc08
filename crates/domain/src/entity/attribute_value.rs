//! Typed attribute values attached to entities.

use serde::{Deserialize, Serialize};

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Numeric view of the value, accepting integers, floats and numeric strings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::String(value) => value.trim().parse().ok(),
            Self::Json(value) => value.as_f64(),
            Self::Bool(_) => None,
        }
    }

    /// Integer view of the value; floats are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) => Some(*value as i64),
            Self::String(value) => value.trim().parse().ok(),
            Self::Json(value) => value.as_i64(),
            Self::Bool(_) => None,
        }
    }

    /// Whether the value is a list containing `needle` as a string.
    #[must_use]
    pub fn contains_str(&self, needle: &str) -> bool {
        match self {
            Self::Json(serde_json::Value::Array(items)) => {
                items.iter().any(|item| item.as_str() == Some(needle))
            }
            Self::String(value) => value == needle,
            _ => false,
        }
    }
}
