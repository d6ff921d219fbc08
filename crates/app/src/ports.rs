//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod context_store;
pub mod outbound;
pub mod snapshot;

pub use context_store::{ContextKey, ContextStore, load, save};
pub use outbound::OutboundPublisher;
pub use snapshot::EntitySnapshot;
