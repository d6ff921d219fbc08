//! [`EntitySnapshot`] over the latest state pushed for each entity.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use homerules_app::ports::EntitySnapshot;
use homerules_domain::entity::{AttributeValue, Entity, domain_of};
use homerules_domain::error::HomeRulesError;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::RwLock;

/// A state change reported for one entity. Attributes are merged into the
/// known ones; dropping an attribute takes a full
/// [`InMemoryEntityStore::upsert`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityUpdate {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

/// Entity table ordered by id, so listings are stable.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<BTreeMap<String, Entity>>,
}

impl InMemoryEntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already holding the given entities.
    #[must_use]
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let entities = entities
            .into_iter()
            .map(|entity| (entity.entity_id.clone(), entity))
            .collect();
        Self {
            entities: RwLock::new(entities),
        }
    }

    /// Insert or fully replace an entity.
    pub async fn upsert(&self, entity: Entity) {
        self.entities
            .write()
            .await
            .insert(entity.entity_id.clone(), entity);
    }

    /// Apply a state change, creating the entity when unknown.
    /// Returns the state it had before.
    pub async fn apply(&self, update: EntityUpdate) -> Option<String> {
        let mut entities = self.entities.write().await;
        let previous = entities.get(&update.entity_id).map(|e| e.state.clone());
        let entity = entities
            .entry(update.entity_id.clone())
            .or_insert_with(|| Entity::new(update.entity_id.clone(), update.state.clone()));
        entity.state = update.state;
        entity.attributes.extend(update.attributes);
        tracing::debug!(
            entity_id = %update.entity_id,
            ?previous,
            state = %entity.state,
            "entity updated"
        );
        previous
    }

    pub async fn remove(&self, entity_id: &str) -> Option<Entity> {
        self.entities.write().await.remove(entity_id)
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}

impl EntitySnapshot for InMemoryEntityStore {
    fn get_entity(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send {
        let entity_id = entity_id.to_string();
        async move { Ok(self.entities.read().await.get(&entity_id).cloned()) }
    }

    fn get_entities_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        let domain = domain.to_string();
        async move {
            Ok(self
                .entities
                .read()
                .await
                .values()
                .filter(|entity| domain_of(&entity.entity_id) == domain)
                .cloned()
                .collect())
        }
    }

    fn get_entities_by_pattern(
        &self,
        pattern: &Regex,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        let pattern = pattern.clone();
        async move {
            Ok(self
                .entities
                .read()
                .await
                .values()
                .filter(|entity| pattern.is_match(&entity.entity_id))
                .cloned()
                .collect())
        }
    }
}
