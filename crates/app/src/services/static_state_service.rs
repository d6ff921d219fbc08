//! Static state service — pin entities to a state or blacklist them so the
//! schedule cycle leaves them alone.

use std::collections::BTreeSet;

use homerules_domain::error::{HomeRulesError, ValidationError};
use homerules_domain::static_state::{
    DEFAULT_NAMESPACE, EntityFilter, StaticBlacklist, StaticStates,
};

use crate::keyed_lock::KeyedMutex;
use crate::ports::{ContextKey, ContextStore, load, save};

/// Application service over the persisted static-state and blacklist tables.
pub struct StaticStateService<C> {
    store: C,
    locks: KeyedMutex,
}

fn namespace_or_default(namespace: Option<&str>) -> &str {
    namespace.unwrap_or(DEFAULT_NAMESPACE)
}

fn require_entity_id(entity_id: &str) -> Result<(), HomeRulesError> {
    if entity_id.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    Ok(())
}

impl<C: ContextStore + Send + Sync> StaticStateService<C> {
    pub fn new(store: C) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
        }
    }

    /// Pin an entity to a state.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] for an empty entity id, or a
    /// storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn set_static_state(
        &self,
        entity_id: &str,
        state: &str,
        namespace: Option<&str>,
    ) -> Result<(), HomeRulesError> {
        require_entity_id(entity_id)?;
        let _guard = self.locks.lock(ContextKey::STATIC_STATES).await;
        let mut states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        states.set(namespace_or_default(namespace), entity_id, state);
        save(&self.store, ContextKey::STATIC_STATES, &states).await?;
        tracing::info!("static state set");
        Ok(())
    }

    /// Unpin an entity. Returns whether it was pinned.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn remove_static_state(
        &self,
        entity_id: &str,
        namespace: Option<&str>,
    ) -> Result<bool, HomeRulesError> {
        let _guard = self.locks.lock(ContextKey::STATIC_STATES).await;
        let mut states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        let removed = states.remove(namespace_or_default(namespace), entity_id);
        if removed {
            save(&self.store, ContextKey::STATIC_STATES, &states).await?;
        }
        Ok(removed)
    }

    /// Blacklist an entity.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] for an empty entity id, or a
    /// storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_blacklist(
        &self,
        entity_id: &str,
        namespace: Option<&str>,
    ) -> Result<(), HomeRulesError> {
        require_entity_id(entity_id)?;
        let _guard = self.locks.lock(ContextKey::STATIC_BLACKLIST).await;
        let mut blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        blacklist.add(namespace_or_default(namespace), entity_id);
        save(&self.store, ContextKey::STATIC_BLACKLIST, &blacklist).await
    }

    /// Remove an entity from the blacklist. Returns whether it was listed.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn remove_from_blacklist(
        &self,
        entity_id: &str,
        namespace: Option<&str>,
    ) -> Result<bool, HomeRulesError> {
        let _guard = self.locks.lock(ContextKey::STATIC_BLACKLIST).await;
        let mut blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        let removed = blacklist.remove(namespace_or_default(namespace), entity_id);
        if removed {
            save(&self.store, ContextKey::STATIC_BLACKLIST, &blacklist).await?;
        }
        Ok(removed)
    }

    /// Drop every pinned state and blacklist entry of a namespace.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn clear_namespace(&self, namespace: &str) -> Result<(), HomeRulesError> {
        let _states_guard = self.locks.lock(ContextKey::STATIC_STATES).await;
        let _blacklist_guard = self.locks.lock(ContextKey::STATIC_BLACKLIST).await;

        let mut states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        states.clear_namespace(namespace);
        save(&self.store, ContextKey::STATIC_STATES, &states).await?;

        let mut blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        blacklist.clear_namespace(namespace);
        save(&self.store, ContextKey::STATIC_BLACKLIST, &blacklist).await
    }

    /// State an entity is pinned to, searching every namespace when
    /// `namespace` is `None`.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    pub async fn static_state(
        &self,
        entity_id: &str,
        namespace: Option<&str>,
    ) -> Result<Option<String>, HomeRulesError> {
        let states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        Ok(states.get(entity_id, namespace).map(str::to_string))
    }

    /// Whether the schedule cycle must skip the entity.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    pub async fn should_filter(
        &self,
        entity_id: &str,
        additional: &[String],
    ) -> Result<bool, HomeRulesError> {
        let states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        let blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        let filter = EntityFilter {
            states: &states,
            blacklist: &blacklist,
            additional,
        };
        Ok(filter.should_filter(entity_id))
    }

    /// Every entity the schedule cycle would skip.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    pub async fn filtered_entities(
        &self,
        additional: &[String],
    ) -> Result<BTreeSet<String>, HomeRulesError> {
        let states: StaticStates = load(&self.store, ContextKey::STATIC_STATES).await?;
        let blacklist: StaticBlacklist = load(&self.store, ContextKey::STATIC_BLACKLIST).await?;
        let filter = EntityFilter {
            states: &states,
            blacklist: &blacklist,
            additional,
        };
        Ok(filter.filtered_entities())
    }
}
