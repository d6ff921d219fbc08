//! Context store port — the persisted key-value state of the engine.
//!
//! Keys are namespaced per topic or table (see [`ContextKey`]); the engine is
//! the only writer of its own keys and writes are last-write-wins.

use std::future::Future;

use homerules_domain::error::{HomeRulesError, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Key-value persistence for engine state.
pub trait ContextStore {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, HomeRulesError>> + Send;

    /// Replace the value stored under `key`.
    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), HomeRulesError>> + Send;
}

impl<T: ContextStore + Send + Sync> ContextStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, HomeRulesError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), HomeRulesError>> + Send {
        (**self).set(key, value)
    }
}

/// Well-known context keys.
pub struct ContextKey;

impl ContextKey {
    pub const TRIGGERED_SCHEDULES: &'static str = "triggeredSchedules";
    pub const STATIC_STATES: &'static str = "staticStates";
    pub const STATIC_BLACKLIST: &'static str = "staticBlacklist";

    #[must_use]
    pub fn flow_info(topic: &str) -> String {
        format!("flowInfo.{topic}")
    }

    #[must_use]
    pub fn presence_states(topic: &str) -> String {
        format!("presenceStates.{topic}")
    }

    #[must_use]
    pub fn transition_history(topic: &str) -> String {
        format!("transitionHistory.{topic}")
    }

    #[must_use]
    pub fn reset_debounce(topic: &str) -> String {
        format!("resetDebounce.{topic}")
    }
}

/// Load and decode a value, falling back to its default when absent.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] when the stored value has the wrong
/// shape, or any error of the store itself.
pub async fn load<T, C>(store: &C, key: &str) -> Result<T, HomeRulesError>
where
    T: DeserializeOwned + Default,
    C: ContextStore + Sync,
{
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|source| {
            StorageError::Decode {
                key: key.to_string(),
                source,
            }
            .into()
        }),
    }
}

/// Encode and store a value.
///
/// # Errors
///
/// Returns [`StorageError::Encode`] when the value cannot be encoded, or
/// any error of the store itself.
pub async fn save<T, C>(store: &C, key: &str, value: &T) -> Result<(), HomeRulesError>
where
    T: Serialize + Sync,
    C: ContextStore + Sync,
{
    let value = serde_json::to_value(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore {
        values: Mutex<HashMap<String, Value>>,
    }

    impl ContextStore for MapStore {
        fn get(
            &self,
            key: &str,
        ) -> impl Future<Output = Result<Option<Value>, HomeRulesError>> + Send {
            let value = self.values.lock().unwrap().get(key).cloned();
            async { Ok(value) }
        }

        fn set(
            &self,
            key: &str,
            value: Value,
        ) -> impl Future<Output = Result<(), HomeRulesError>> + Send {
            self.values.lock().unwrap().insert(key.to_string(), value);
            async { Ok(()) }
        }
    }

    #[tokio::test]
    async fn should_default_when_key_missing() {
        let store = MapStore::default();
        let loaded: Vec<String> = load(&store, "missing").await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn should_round_trip_through_store() {
        let store = MapStore::default();
        save(&store, "list", &vec!["a".to_string()]).await.unwrap();
        let loaded: Vec<String> = load(&store, "list").await.unwrap();
        assert_eq!(loaded, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn should_report_decode_error_with_key() {
        let store = MapStore::default();
        store.set("list", Value::from(42)).await.unwrap();
        let result: Result<Vec<String>, _> = load(&store, "list").await;
        assert!(matches!(
            result,
            Err(HomeRulesError::Storage(StorageError::Decode { ref key, .. })) if key == "list"
        ));
    }

    #[test]
    fn should_namespace_topic_keys() {
        assert_eq!(ContextKey::flow_info("bath"), "flowInfo.bath");
        assert_eq!(ContextKey::presence_states("bath"), "presenceStates.bath");
        assert_eq!(
            ContextKey::transition_history("bath"),
            "transitionHistory.bath"
        );
        assert_eq!(ContextKey::reset_debounce("bath"), "resetDebounce.bath");
    }
}
