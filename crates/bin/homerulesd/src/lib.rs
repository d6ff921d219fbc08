//! # homerulesd — home rules daemon
//!
//! Composition root that wires the rules engine to its adapters.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Construct the in-memory context and entity stores (adapters)
//! - Construct application services, injecting stores via port traits
//! - Decode JSON-lines inbound messages and route them to services
//! - Tick the schedule cycle and forward its events to the ramp consumer
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

pub mod config;
pub mod daemon;
pub mod inbound;
