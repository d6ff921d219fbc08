//! Schedules — time-windowed, precedence-ranked rules targeting entities.
//!
//! ```text
//!  ScheduleDefinition ──normalize(now)──▶ NormalizedSchedule
//!                                               │
//!            entity ──match / conditions──▶ resolve (highest precedence)
//!                                               │
//!                     ┌─────────────────────────┴───────────────┐
//!                continuous                                  trigger
//!            enforce every cycle                 once per edge (TriggerStates)
//!                     └─────────────────────────┬───────────────┘
//!                                            Action
//! ```

mod activation;
mod condition;
mod definition;
mod event;
mod matcher;
mod normalize;
mod resolve;
mod trigger_state;

pub use activation::{determine_action, evaluate_continuous};
pub use condition::{Condition, DEFAULT_PRESENCE_ENTITY, all_satisfied};
pub use definition::{
    EntityMatch, EntityStateSpec, Interpolation, OneOrMany, ScheduleDefinition,
    ScheduleDefinitionBuilder, ScheduleKind, StateOverrides,
};
pub use event::{EventPhase, ScheduleEvent, ScheduleEventKind, calculate_schedule_events};
pub use matcher::{EntityMatcher, REGEX_PREFIX, TagTable};
pub use normalize::NormalizedSchedule;
pub use resolve::{matching_schedules, resolve};
pub use trigger_state::{DEFAULT_MAX_AGE_HOURS, TriggerStateEntry, TriggerStates};
