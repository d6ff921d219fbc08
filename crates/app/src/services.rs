//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod presence_service;
pub mod ramp_service;
pub mod schedule_service;
pub mod static_state_service;
