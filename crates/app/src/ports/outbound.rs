//! Outbound port — where actions and diagnostics leave the engine.

use std::future::Future;

use homerules_domain::error::HomeRulesError;

use crate::outbound::Outbound;

/// Delivers outbound messages to the device-dispatch and telemetry side.
pub trait OutboundPublisher {
    /// Publish one message to every current subscriber.
    fn publish(&self, message: Outbound) -> impl Future<Output = Result<(), HomeRulesError>> + Send;
}

impl<T: OutboundPublisher + Send + Sync> OutboundPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        message: Outbound,
    ) -> impl Future<Output = Result<(), HomeRulesError>> + Send {
        (**self).publish(message)
    }
}
