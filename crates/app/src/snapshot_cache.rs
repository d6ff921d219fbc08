//! Short-lived cache in front of an [`EntitySnapshot`] for bulk lookups.
//!
//! Single-entity reads go straight through; domain and pattern listings are
//! served from memory until the TTL elapses.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use homerules_domain::entity::Entity;
use homerules_domain::error::HomeRulesError;
use regex::Regex;
use tokio::time::Instant;

use crate::ports::EntitySnapshot;

/// Default lifetime of a cached listing.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(5);

/// Caching decorator for any [`EntitySnapshot`].
pub struct CachedSnapshot<S> {
    inner: S,
    ttl: Duration,
    listings: Mutex<HashMap<String, (Instant, Vec<Entity>)>>,
}

impl<S> CachedSnapshot<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            listings: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached listing.
    pub fn invalidate(&self) {
        self.listings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn cached(&self, key: &str) -> Option<Vec<Entity>> {
        let listings = self
            .listings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        listings
            .get(key)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, entities)| entities.clone())
    }

    fn store(&self, key: String, entities: &[Entity]) {
        self.listings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, (Instant::now(), entities.to_vec()));
    }
}

impl<S: EntitySnapshot + Send + Sync> EntitySnapshot for CachedSnapshot<S> {
    fn get_entity(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send {
        self.inner.get_entity(entity_id)
    }

    fn get_entities_by_domain(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        async move {
            let key = format!("domain:{domain}");
            if let Some(entities) = self.cached(&key) {
                return Ok(entities);
            }
            let entities = self.inner.get_entities_by_domain(domain).await?;
            self.store(key, &entities);
            Ok(entities)
        }
    }

    fn get_entities_by_pattern(
        &self,
        pattern: &Regex,
    ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
        async move {
            let key = format!("pattern:{}", pattern.as_str());
            if let Some(entities) = self.cached(&key) {
                return Ok(entities);
            }
            let entities = self.inner.get_entities_by_pattern(pattern).await?;
            self.store(key, &entities);
            Ok(entities)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSnapshot {
        calls: AtomicUsize,
    }

    impl EntitySnapshot for CountingSnapshot {
        fn get_entity(
            &self,
            entity_id: &str,
        ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send {
            let entity = Entity::new(entity_id, "on");
            async { Ok(Some(entity)) }
        }

        fn get_entities_by_domain(
            &self,
            domain: &str,
        ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entity = Entity::new(format!("{domain}.one"), "on");
            async { Ok(vec![entity]) }
        }

        fn get_entities_by_pattern(
            &self,
            _pattern: &Regex,
        ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Vec::new()) }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_serve_listing_from_cache_within_ttl() {
        let cache = CachedSnapshot::new(CountingSnapshot::default(), DEFAULT_SNAPSHOT_TTL);
        cache.get_entities_by_domain("light").await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        let lights = cache.get_entities_by_domain("light").await.unwrap();
        assert_eq!(lights[0].entity_id, "light.one");
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refetch_after_ttl() {
        let cache = CachedSnapshot::new(CountingSnapshot::default(), DEFAULT_SNAPSHOT_TTL);
        cache.get_entities_by_domain("light").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.get_entities_by_domain("light").await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn should_key_patterns_separately_and_invalidate() {
        let cache = CachedSnapshot::new(CountingSnapshot::default(), DEFAULT_SNAPSHOT_TTL);
        let lights = Regex::new("^light\\.").unwrap();
        let locks = Regex::new("^lock\\.").unwrap();
        cache.get_entities_by_pattern(&lights).await.unwrap();
        cache.get_entities_by_pattern(&locks).await.unwrap();
        cache.get_entities_by_pattern(&lights).await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);

        cache.invalidate();
        cache.get_entities_by_pattern(&lights).await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 3);
    }
}
