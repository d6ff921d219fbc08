//! Outbound messages and an in-process bus backed by a tokio broadcast channel.

use std::future::Future;

use homerules_domain::action::Action;
use homerules_domain::error::HomeRulesError;
use homerules_domain::schedule::ScheduleEvent;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ports::OutboundPublisher;
use crate::services::presence_service::{PresenceDebug, PresenceReport};
use crate::services::ramp_service::{RampDebug, RampReport};
use crate::services::schedule_service::{ScheduleDebug, ScheduleReport};

/// Everything the engine emits, one JSON object per message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Presence {
        actions: Vec<Action>,
        debug: PresenceDebug,
    },
    Schedule {
        actions: Vec<Action>,
        events: Vec<ScheduleEvent>,
        debug: ScheduleDebug,
    },
    Ramp {
        actions: Vec<Action>,
        debug: RampDebug,
    },
}

impl Outbound {
    /// Actions carried by the message.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        match self {
            Self::Presence { actions, .. }
            | Self::Schedule { actions, .. }
            | Self::Ramp { actions, .. } => actions,
        }
    }
}

impl From<PresenceReport> for Outbound {
    fn from(report: PresenceReport) -> Self {
        Self::Presence {
            actions: report.actions,
            debug: report.debug,
        }
    }
}

impl From<ScheduleReport> for Outbound {
    fn from(report: ScheduleReport) -> Self {
        Self::Schedule {
            actions: report.actions,
            events: report.events,
            debug: report.debug,
        }
    }
}

impl From<RampReport> for Outbound {
    fn from(report: RampReport) -> Self {
        Self::Ramp {
            actions: report.actions,
            debug: report.debug,
        }
    }
}

/// In-process outbound bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the message is simply dropped).
pub struct InProcessOutboundBus {
    sender: broadcast::Sender<Outbound>,
}

impl InProcessOutboundBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.sender.subscribe()
    }
}

impl OutboundPublisher for InProcessOutboundBus {
    fn publish(
        &self,
        message: Outbound,
    ) -> impl Future<Output = Result<(), HomeRulesError>> + Send {
        let _ = self.sender.send(message);
        async { Ok(()) }
    }
}
