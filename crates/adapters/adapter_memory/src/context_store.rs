//! [`ContextStore`] backed by a map guarded by an async lock.

use std::collections::HashMap;
use std::future::Future;

use homerules_app::ports::ContextStore;
use homerules_domain::error::HomeRulesError;
use serde_json::Value;
use tokio::sync::RwLock;

/// Context store living for the duration of the process.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    /// Copy of every stored key and value, sorted by key.
    pub async fn dump(&self) -> Vec<(String, Value)> {
        let values = self.values.read().await;
        let mut entries: Vec<(String, Value)> = values
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl ContextStore for InMemoryContextStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, HomeRulesError>> + Send {
        let key = key.to_string();
        async move { Ok(self.values.read().await.get(&key).cloned()) }
    }

    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), HomeRulesError>> + Send {
        let key = key.to_string();
        async move {
            tracing::trace!(%key, "context value stored");
            self.values.write().await.insert(key, value);
            Ok(())
        }
    }
}
