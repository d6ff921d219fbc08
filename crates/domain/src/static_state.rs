//! Static-state overrides and blacklists.
//!
//! Both tables are namespaced so that independent features can pin or
//! exclude entities without stepping on each other. An entity present in any
//! namespace of either table is left alone by schedule evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Namespace used when a caller does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// `namespace → entity_id → pinned state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticStates(BTreeMap<String, BTreeMap<String, String>>);

impl StaticStates {
    pub fn set(&mut self, namespace: &str, entity_id: &str, state: &str) {
        self.0
            .entry(namespace.to_string())
            .or_default()
            .insert(entity_id.to_string(), state.to_string());
    }

    /// Remove a pinned state; empty namespaces are dropped.
    pub fn remove(&mut self, namespace: &str, entity_id: &str) -> bool {
        let Some(entries) = self.0.get_mut(namespace) else {
            return false;
        };
        let removed = entries.remove(entity_id).is_some();
        if entries.is_empty() {
            self.0.remove(namespace);
        }
        removed
    }

    /// Pinned state of an entity, searching one namespace or all of them.
    #[must_use]
    pub fn get(&self, entity_id: &str, namespace: Option<&str>) -> Option<&str> {
        let found = match namespace {
            Some(ns) => self.0.get(ns).and_then(|entries| entries.get(entity_id)),
            None => self.0.values().find_map(|entries| entries.get(entity_id)),
        };
        found.map(String::as_str)
    }

    #[must_use]
    pub fn namespace(&self, namespace: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(namespace)
    }

    pub fn clear_namespace(&mut self, namespace: &str) {
        self.0.remove(namespace);
    }

    fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.0
            .values()
            .flat_map(|entries| entries.keys().map(String::as_str))
    }
}

/// `namespace → {entity_id}` of entities excluded from schedules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticBlacklist(BTreeMap<String, BTreeSet<String>>);

impl StaticBlacklist {
    pub fn add(&mut self, namespace: &str, entity_id: &str) {
        self.0
            .entry(namespace.to_string())
            .or_default()
            .insert(entity_id.to_string());
    }

    pub fn remove(&mut self, namespace: &str, entity_id: &str) -> bool {
        let Some(entries) = self.0.get_mut(namespace) else {
            return false;
        };
        let removed = entries.remove(entity_id);
        if entries.is_empty() {
            self.0.remove(namespace);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, entity_id: &str, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) => self.0.get(ns).is_some_and(|set| set.contains(entity_id)),
            None => self.0.values().any(|set| set.contains(entity_id)),
        }
    }

    pub fn clear_namespace(&mut self, namespace: &str) {
        self.0.remove(namespace);
    }

    fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.0.values().flat_map(|set| set.iter().map(String::as_str))
    }
}

/// Decides which entities a schedule evaluation must skip.
#[derive(Debug, Clone, Copy)]
pub struct EntityFilter<'a> {
    pub states: &'a StaticStates,
    pub blacklist: &'a StaticBlacklist,
    /// Per-evaluation exclusions supplied with the tick.
    pub additional: &'a [String],
}

impl EntityFilter<'_> {
    /// Whether the entity is excluded by the tick, a blacklist or a pinned state.
    #[must_use]
    pub fn should_filter(&self, entity_id: &str) -> bool {
        self.additional.iter().any(|id| id == entity_id)
            || self.blacklist.contains(entity_id, None)
            || self.states.get(entity_id, None).is_some()
    }

    /// Every entity excluded by either table.
    #[must_use]
    pub fn filtered_entities(&self) -> BTreeSet<String> {
        self.states
            .entity_ids()
            .chain(self.blacklist.entity_ids())
            .chain(self.additional.iter().map(String::as_str))
            .map(str::to_string)
            .collect()
    }
}
