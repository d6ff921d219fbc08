//! # homerules-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EntitySnapshot` — read-only entity lookups by id, domain or pattern
//!   - `ContextStore` — persisted key-value engine state
//!   - `OutboundPublisher` — delivery of actions and diagnostics
//! - Define **driving/inbound ports** as use-case structs:
//!   - `PresenceService` — sensor events through the presence state machine
//!   - `ScheduleService` — schedule ticks through matching and activation
//!   - `StaticStateService` — pinned states and blacklists
//!   - `RampService` — sunrise/sunset light fades
//! - Provide **in-process infrastructure** that doesn't need IO: per-key
//!   locks, the snapshot cache, cooldown re-check tasks, the outbound bus
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `homerules-domain` only (plus `tokio` for locks, timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod cooldown_scheduler;
pub mod keyed_lock;
pub mod outbound;
pub mod ports;
pub mod services;
pub mod snapshot_cache;
