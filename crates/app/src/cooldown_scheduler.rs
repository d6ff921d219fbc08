//! Cancellable deferred re-checks for presence cooldowns.
//!
//! Scheduling a key replaces (aborts) any pending task for the same key, so
//! at most one re-check per topic is ever outstanding. A task that fires
//! anyway must re-read live state; it never trusts what it captured.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Keyed set of delayed tasks.
#[derive(Debug, Default)]
pub struct CooldownScheduler {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl CooldownScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any pending task for `key`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = Arc::clone(&self.tasks);
        let owned_key = key.to_string();
        // Held across spawn and insert so the task cannot clear its entry first.
        let mut pending = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut tasks = tasks.lock().unwrap_or_else(PoisonError::into_inner);
                // Only clear the entry if a replacement has not taken it.
                if tasks
                    .get(&owned_key)
                    .is_some_and(|handle| handle.id() == tokio::task::id())
                {
                    tasks.remove(&owned_key);
                }
            }
            task.await;
        });
        let previous = pending.insert(key.to_string(), handle);
        drop(pending);
        if let Some(previous) = previous {
            previous.abort();
            tracing::debug!(key, "replaced pending re-check");
        }
    }

    /// Abort the pending task for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a task is pending for `key`.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Abort every pending task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
