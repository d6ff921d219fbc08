//! The wired engine: memory adapters, services and the outbound bus.

use std::sync::Arc;

use homerules_adapter_memory::{InMemoryContextStore, InMemoryEntityStore};
use homerules_app::outbound::{InProcessOutboundBus, Outbound};
use homerules_app::ports::OutboundPublisher;
use homerules_app::services::presence_service::PresenceService;
use homerules_app::services::ramp_service::RampService;
use homerules_app::services::schedule_service::{ScheduleService, ScheduleTick};
use homerules_app::services::static_state_service::StaticStateService;
use homerules_app::snapshot_cache::CachedSnapshot;
use homerules_domain::error::HomeRulesError;
use homerules_domain::time::{LocalTimestamp, Timestamp};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::inbound::{Inbound, InboundError};

const OUTBOUND_CAPACITY: usize = 256;

type Store = Arc<InMemoryContextStore>;
type Snapshot = Arc<CachedSnapshot<Arc<InMemoryEntityStore>>>;
type Bus = Arc<InProcessOutboundBus>;

pub struct Daemon {
    entities: Arc<InMemoryEntityStore>,
    snapshot: Snapshot,
    bus: Bus,
    presence: Arc<PresenceService<Store, Bus>>,
    schedules: ScheduleService<Snapshot, Store>,
    static_states: StaticStateService<Store>,
    ramp: Option<RampService<Snapshot>>,
}

impl Daemon {
    /// Wire every service over the given stores.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError`] when a topic, schedule or tag pattern of
    /// the configuration is invalid.
    pub fn new(
        config: &Config,
        entities: Arc<InMemoryEntityStore>,
        store: Store,
    ) -> Result<Self, HomeRulesError> {
        let snapshot = Arc::new(CachedSnapshot::new(
            Arc::clone(&entities),
            config.snapshot_ttl(),
        ));
        let bus = Arc::new(InProcessOutboundBus::new(OUTBOUND_CAPACITY));

        let presence = Arc::new(PresenceService::new(
            Arc::clone(&store),
            Arc::clone(&bus),
            config.topic_configs(),
        )?);
        let schedules = ScheduleService::new(
            Arc::clone(&snapshot),
            Arc::clone(&store),
            config.schedules.clone(),
            &config.tags,
            config.schedule_settings(),
        )?;
        let static_states = StaticStateService::new(store);
        let ramp = config
            .ramp_settings()
            .map(|settings| RampService::new(Arc::clone(&snapshot), settings));

        tracing::info!(
            topics = config.topics.len(),
            schedules = config.schedules.len(),
            ramp = ramp.is_some(),
            "engine wired"
        );

        Ok(Self {
            entities,
            snapshot,
            bus,
            presence,
            schedules,
            static_states,
            ramp,
        })
    }

    /// Subscribe to every outbound message published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.bus.subscribe()
    }

    /// Decode and handle one JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`InboundError`] when the line is malformed or the engine
    /// rejects it.
    pub async fn handle_line(
        &self,
        line: &str,
        now: Timestamp,
        local: LocalTimestamp,
    ) -> Result<(), InboundError> {
        let message = Inbound::parse(line)?;
        self.handle(message, now, local).await?;
        Ok(())
    }

    /// Handle one inbound message. `now` drives presence, `local` drives
    /// schedule windows.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError`] for an unknown topic, an invalid command
    /// or a storage failure.
    pub async fn handle(
        &self,
        message: Inbound,
        now: Timestamp,
        local: LocalTimestamp,
    ) -> Result<(), HomeRulesError> {
        match message {
            Inbound::Sensor(event) => {
                let report = self.presence.handle_sensor_event(&event, now).await?;
                self.bus.publish(Outbound::from(report)).await
            }
            Inbound::Tick(tick) => self.tick(tick, local).await,
            Inbound::State(update) => {
                self.entities.apply(update).await;
                self.snapshot.invalidate();
                Ok(())
            }
            Inbound::SetStaticState {
                entity_id,
                state,
                namespace,
            } => {
                self.static_states
                    .set_static_state(&entity_id, &state, namespace.as_deref())
                    .await
            }
            Inbound::RemoveStaticState {
                entity_id,
                namespace,
            } => {
                self.static_states
                    .remove_static_state(&entity_id, namespace.as_deref())
                    .await?;
                Ok(())
            }
            Inbound::AddToBlacklist {
                entity_id,
                namespace,
            } => {
                self.static_states
                    .add_to_blacklist(&entity_id, namespace.as_deref())
                    .await
            }
            Inbound::RemoveFromBlacklist {
                entity_id,
                namespace,
            } => {
                self.static_states
                    .remove_from_blacklist(&entity_id, namespace.as_deref())
                    .await?;
                Ok(())
            }
            Inbound::ClearNamespace { namespace } => {
                self.static_states.clear_namespace(&namespace).await
            }
        }
    }

    /// Run one schedule cycle, then feed its events to the ramp consumer.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError`] when the snapshot or the context store
    /// fails.
    pub async fn tick(
        &self,
        tick: ScheduleTick,
        local: LocalTimestamp,
    ) -> Result<(), HomeRulesError> {
        let report = self.schedules.evaluate(tick, local).await?;
        let ramp = match &self.ramp {
            Some(ramp) => ramp.handle_events(&report.events).await?,
            None => None,
        };
        self.bus.publish(Outbound::from(report)).await?;
        if let Some(ramp) = ramp {
            self.bus.publish(Outbound::from(ramp)).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn entities(&self) -> &InMemoryEntityStore {
        &self.entities
    }

    #[must_use]
    pub fn is_recheck_pending(&self, topic: &str) -> bool {
        self.presence.is_recheck_pending(topic)
    }

    /// Abort pending cooldown re-checks.
    pub fn shutdown(&self) {
        self.presence.shutdown();
    }
}
