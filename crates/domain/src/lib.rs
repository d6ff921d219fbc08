//! # homerules-domain
//!
//! Pure domain model for the homerules rules engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Resolve time-of-day strings and entity-time references into concrete windows
//! - Define **Entities** (read-only snapshots of devices and sensors) and the
//!   closed table of per-domain states and services
//! - Define **Actions** (service calls) and batch them across entities
//! - Run the **Presence** state machine (aggregate, cooldown, debounce)
//! - Define **Schedules** and evaluate them (matching, precedence, continuous
//!   and trigger activation, ramp events)
//! - Hold the static-state and blacklist tables that exclude entities
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod entity;
pub mod presence;
pub mod ramp;
pub mod schedule;
pub mod static_state;
pub mod window;
