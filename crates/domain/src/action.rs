//! Actions — the service calls the engine emits.
//!
//! An [`Action`] is the only externally visible output of an evaluation.
//! Actions that share `domain`, `service` and every data field other than the
//! target are merged by [`group_actions`] into one multi-target call.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity or a list of entities targeted by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityTarget {
    One(String),
    Many(Vec<String>),
}

impl EntityTarget {
    /// Iterate over the targeted entity ids.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::One(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        };
        items.iter().map(String::as_str)
    }

    fn from_ids(mut ids: Vec<String>) -> Self {
        if ids.len() == 1 {
            Self::One(ids.remove(0))
        } else {
            Self::Many(ids)
        }
    }
}

/// Service data: the target plus arbitrary extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    pub entity_id: EntityTarget,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A service call for the device-dispatch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub domain: String,
    pub service: String,
    pub data: ActionData,
}

impl Action {
    /// Build a single-target action without extra data.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data: ActionData {
                entity_id: EntityTarget::One(entity_id.into()),
                extra: Map::new(),
            },
        }
    }

    /// Build an action targeting several entities at once.
    #[must_use]
    pub fn for_entities(
        domain: impl Into<String>,
        service: impl Into<String>,
        entity_ids: Vec<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data: ActionData {
                entity_id: EntityTarget::from_ids(entity_ids),
                extra: Map::new(),
            },
        }
    }

    /// Add one extra data field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.extra.insert(key.into(), value);
        self
    }

    /// Merge every field of `data`; a non-object value is ignored.
    #[must_use]
    pub fn with_data_map(mut self, data: &Value) -> Self {
        if let Value::Object(fields) = data {
            for (key, value) in fields {
                if key != "entity_id" {
                    self.data.extra.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    /// Ids of the targeted entities.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.data.entity_id.iter()
    }

    fn same_call(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.service == other.service
            && self.data.extra == other.data.extra
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets = self.entity_ids().collect::<Vec<_>>().join(", ");
        write!(f, "{}.{}({targets})", self.domain, self.service)
    }
}

/// Merge actions sharing domain, service and extra data into multi-target
/// actions, keeping first-seen order and dropping duplicate targets.
#[must_use]
pub fn group_actions(actions: Vec<Action>) -> Vec<Action> {
    let mut groups: Vec<(Action, Vec<String>)> = Vec::new();
    for action in actions {
        let ids: Vec<String> = action.entity_ids().map(str::to_string).collect();
        let group = match groups.iter().position(|(head, _)| head.same_call(&action)) {
            Some(index) => &mut groups[index].1,
            None => {
                groups.push((action, Vec::new()));
                let last = groups.len() - 1;
                &mut groups[last].1
            }
        };
        for id in ids {
            if !group.contains(&id) {
                group.push(id);
            }
        }
    }
    groups
        .into_iter()
        .map(|(mut action, ids)| {
            action.data.entity_id = EntityTarget::from_ids(ids);
            action
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_single_target_with_flattened_data() {
        let action = Action::new("light", "turn_on", "light.kitchen")
            .with_data("brightness", Value::from(128));
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "domain": "light",
                "service": "turn_on",
                "data": {"entity_id": "light.kitchen", "brightness": 128}
            })
        );
    }

    #[test]
    fn should_merge_actions_with_identical_call() {
        let grouped = group_actions(vec![
            Action::new("switch", "turn_on", "switch.a"),
            Action::new("switch", "turn_on", "switch.b"),
        ]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(
            grouped[0].data.entity_id,
            EntityTarget::Many(vec!["switch.a".to_string(), "switch.b".to_string()])
        );
    }

    #[test]
    fn should_keep_actions_apart_when_data_differs() {
        let grouped = group_actions(vec![
            Action::new("light", "turn_on", "light.a").with_data("brightness", Value::from(10)),
            Action::new("light", "turn_on", "light.b").with_data("brightness", Value::from(20)),
            Action::new("light", "turn_off", "light.c"),
        ]);
        assert_eq!(grouped.len(), 3);
    }

    #[test]
    fn should_preserve_first_seen_order_and_drop_duplicate_targets() {
        let grouped = group_actions(vec![
            Action::new("lock", "lock", "lock.front"),
            Action::new("switch", "turn_on", "switch.a"),
            Action::new("lock", "lock", "lock.front"),
        ]);
        assert_eq!(grouped[0].domain, "lock");
        assert_eq!(
            grouped[0].data.entity_id,
            EntityTarget::One("lock.front".to_string())
        );
        assert_eq!(grouped[1].domain, "switch");
    }

    #[test]
    fn should_ignore_entity_id_when_merging_data_map() {
        let action = Action::new("input_select", "select_option", "input_select.day_status")
            .with_data_map(&serde_json::json!({"option": "day", "entity_id": "other"}));
        assert_eq!(action.data.extra.get("option"), Some(&Value::from("day")));
        assert!(!action.data.extra.contains_key("entity_id"));
    }

    #[test]
    fn should_display_domain_service_and_targets() {
        let action = Action::for_entities(
            "homeassistant",
            "turn_off",
            vec!["light.a".to_string(), "fan.b".to_string()],
        );
        assert_eq!(action.to_string(), "homeassistant.turn_off(light.a, fan.b)");
    }
}
