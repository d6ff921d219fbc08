//! # homerules-adapter-memory
//!
//! Process-lifetime implementations of the engine's persistence and
//! snapshot ports.
//!
//! ## Responsibilities
//!
//! - Hold the engine context (flow info, presence tables, trigger states,
//!   static states) as JSON values keyed by context key
//! - Hold the latest known state of every entity and answer snapshot
//!   queries by id, domain, or id pattern
//! - Apply incoming state updates to the entity table
//!
//! ## Dependency rule
//!
//! Depends on `homerules-app` (port traits) and `homerules-domain` only.
//! Nothing survives a restart; state is rebuilt from the next events.

mod context_store;
mod entity_store;

pub use context_store::InMemoryContextStore;
pub use entity_store::{EntityUpdate, InMemoryEntityStore};
