//! Entity — a read-only snapshot of one device or sensor.
//!
//! Entities are supplied by the snapshot provider; the engine never mutates
//! them. The domain is derived from the id prefix (`light.kitchen` → `light`).

mod attribute_value;
mod domain;

pub use attribute_value::AttributeValue;
pub use domain::{Domain, DomainStates};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// State reported by entities that cannot currently be reached.
pub const STATE_UNAVAILABLE: &str = "unavailable";
/// State reported by entities whose value is not known yet.
pub const STATE_UNKNOWN: &str = "unknown";

/// A snapshot of one entity's state and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl Entity {
    /// Create an entity without attributes.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute, consuming and returning the entity.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// The raw domain prefix of the id, or the whole id when it has no dot.
    #[must_use]
    pub fn domain_name(&self) -> &str {
        domain_of(&self.entity_id)
    }

    /// The typed domain of this entity.
    #[must_use]
    pub fn domain(&self) -> Domain {
        Domain::from_entity_id(&self.entity_id)
    }

    /// Whether the entity reports a usable state.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.state.as_str(), STATE_UNAVAILABLE | STATE_UNKNOWN | "")
    }

    /// Look up an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// The domain prefix of an entity id.
#[must_use]
pub fn domain_of(entity_id: &str) -> &str {
    entity_id
        .split_once('.')
        .map_or(entity_id, |(domain, _)| domain)
}
