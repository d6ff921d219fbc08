//! Entity snapshot port — read-only view of live device and sensor state.

use std::future::Future;

use homerules_domain::entity::Entity;
use homerules_domain::error::HomeRulesError;
use regex::Regex;

/// Read access to entity state. Snapshots may lag live state slightly.
pub trait EntitySnapshot {
    /// Get one entity by its id.
    fn get_entity(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send;

    /// Get every entity of a domain (`light`, `switch`, ...).
    fn get_entities_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send;

    /// Get every entity whose id matches the pattern.
    fn get_entities_by_pattern(
        &self,
        pattern: &Regex,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send;
}

impl<T: EntitySnapshot + Send + Sync> EntitySnapshot for std::sync::Arc<T> {
    fn get_entity(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send {
        (**self).get_entity(entity_id)
    }

    fn get_entities_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        (**self).get_entities_by_domain(domain)
    }

    fn get_entities_by_pattern(
        &self,
        pattern: &Regex,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        (**self).get_entities_by_pattern(pattern)
    }
}
