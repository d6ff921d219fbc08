//! Presence service — sensor events in, grouped turn on/off actions out.
//!
//! Each topic's context is loaded, stepped and saved under a per-topic lock.
//! When a topic enters its cooldown, a re-check is scheduled; the re-check
//! reads the live context again, so one made stale by a newer event does
//! nothing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Duration;
use homerules_domain::action::{Action, group_actions};
use homerules_domain::error::{HomeRulesError, NotFoundError, ValidationError};
use homerules_domain::id::EvaluationId;
use homerules_domain::presence::{
    Aggregate, DEFAULT_COOL_DOWN_SECS, PresenceState, SensorPresenceMap, SensorReading,
    TopicContext, Transition,
};
use homerules_domain::time::{Timestamp, now};
use serde::{Deserialize, Serialize};

use crate::cooldown_scheduler::CooldownScheduler;
use crate::keyed_lock::KeyedMutex;
use crate::outbound::Outbound;
use crate::ports::{ContextKey, ContextStore, OutboundPublisher, load, save};

/// Domain used for the grouped turn on/off calls of a topic.
pub const PRESENCE_ACTION_DOMAIN: &str = "homeassistant";

/// A sensor group and the entities it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub entities: Vec<String>,
    pub cool_down: Duration,
}

impl TopicConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, entities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entities,
            cool_down: Duration::seconds(DEFAULT_COOL_DOWN_SECS),
        }
    }

    #[must_use]
    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    /// Check topic invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty name or an empty entity list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.entities.is_empty() {
            return Err(ValidationError::NoTopicEntities {
                topic: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// A sensor state change routed to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub topic: String,
    pub entity_id: String,
    pub new_state: String,
}

/// Diagnostics of one presence evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceDebug {
    pub evaluation_id: EvaluationId,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub previous: PresenceState,
    pub state: PresenceState,
    pub aggregate: Aggregate,
    pub transition: String,
    pub cool_down_remaining_ms: i64,
    pub sensors: SensorPresenceMap,
    pub on_unknown_off_sequence: bool,
    pub timestamp: Timestamp,
}

/// Outcome of one presence evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceReport {
    pub actions: Vec<Action>,
    pub debug: PresenceDebug,
}

/// Application service driving the presence state machine of every topic.
pub struct PresenceService<C, P> {
    store: C,
    publisher: P,
    topics: HashMap<String, TopicConfig>,
    locks: KeyedMutex,
    scheduler: CooldownScheduler,
}

impl<C, P> PresenceService<C, P>
where
    C: ContextStore + Send + Sync + 'static,
    P: OutboundPublisher + Send + Sync + 'static,
{
    /// Create a service for the given topics.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::Validation`] when a topic is invalid or two
    /// topics share a name.
    pub fn new(store: C, publisher: P, topics: Vec<TopicConfig>) -> Result<Self, HomeRulesError> {
        let mut by_name = HashMap::with_capacity(topics.len());
        for topic in topics {
            topic.validate()?;
            if by_name.contains_key(&topic.name) {
                return Err(ValidationError::DuplicateName {
                    kind: "topic",
                    name: topic.name,
                }
                .into());
            }
            by_name.insert(topic.name.clone(), topic);
        }
        Ok(Self {
            store,
            publisher,
            topics: by_name,
            locks: KeyedMutex::new(),
            scheduler: CooldownScheduler::new(),
        })
    }

    #[must_use]
    pub fn topic(&self, name: &str) -> Option<&TopicConfig> {
        self.topics.get(name)
    }

    fn require_topic(&self, name: &str) -> Result<&TopicConfig, HomeRulesError> {
        self.topics.get(name).ok_or_else(|| {
            NotFoundError {
                entity: "Topic",
                id: name.to_string(),
            }
            .into()
        })
    }

    /// Feed one sensor event through the topic's state machine.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::NotFound`] for an unknown topic, or a
    /// storage error from the context store.
    #[tracing::instrument(
        skip(self, event),
        fields(topic = %event.topic, entity_id = %event.entity_id)
    )]
    pub async fn handle_sensor_event(
        self: &Arc<Self>,
        event: &SensorEvent,
        now: Timestamp,
    ) -> Result<PresenceReport, HomeRulesError> {
        let topic = self.require_topic(&event.topic)?;
        let reading = SensorReading::normalize(&event.new_state);

        let _guard = self.locks.lock(&topic.name).await;
        let mut context = self.load_context(&topic.name).await?;
        let transition = context.process(&event.entity_id, reading, topic.cool_down, now);
        self.save_context(&topic.name, &context).await?;

        tracing::debug!(?reading, transition = %transition.label(), "sensor processed");
        Ok(self.finish(topic, Some(&event.entity_id), &context, transition, now))
    }

    /// Settle a pending cooldown if it has elapsed; reschedules otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`HomeRulesError::NotFound`] for an unknown topic, or a
    /// storage error from the context store.
    #[tracing::instrument(skip(self))]
    pub async fn recheck(
        self: &Arc<Self>,
        topic: &str,
        now: Timestamp,
    ) -> Result<PresenceReport, HomeRulesError> {
        let topic = self.require_topic(topic)?;

        let _guard = self.locks.lock(&topic.name).await;
        let mut context = self.load_context(&topic.name).await?;
        let transition = context.recheck(now);
        if transition.changed() {
            self.save_context(&topic.name, &context).await?;
        }
        Ok(self.finish(topic, None, &context, transition, now))
    }

    /// Current persisted context of a topic.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the context store.
    pub async fn topic_context(&self, topic: &str) -> Result<TopicContext, HomeRulesError> {
        self.load_context(topic).await
    }

    /// Whether a cooldown re-check is pending for the topic.
    #[must_use]
    pub fn is_recheck_pending(&self, topic: &str) -> bool {
        self.scheduler.is_pending(topic)
    }

    /// Abort every pending re-check.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn finish(
        self: &Arc<Self>,
        topic: &TopicConfig,
        entity_id: Option<&str>,
        context: &TopicContext,
        transition: Transition,
        now: Timestamp,
    ) -> PresenceReport {
        match transition.recheck_after {
            Some(delay) => self.schedule_recheck(&topic.name, delay),
            None if context.flow.state != PresenceState::PendingOff => {
                self.scheduler.cancel(&topic.name);
            }
            None => {}
        }

        let mut actions = Vec::new();
        if let Some(command) = transition.command {
            tracing::info!(
                topic = %topic.name,
                transition = %transition.label(),
                service = command.service(),
                "presence transition"
            );
            actions.push(Action::for_entities(
                PRESENCE_ACTION_DOMAIN,
                command.service(),
                topic.entities.clone(),
            ));
        } else if transition.changed() {
            tracing::info!(
                topic = %topic.name,
                transition = %transition.label(),
                "presence transition"
            );
        }

        PresenceReport {
            actions: group_actions(actions),
            debug: PresenceDebug {
                evaluation_id: EvaluationId::new(),
                topic: topic.name.clone(),
                entity_id: entity_id.map(str::to_string),
                previous: transition.from,
                state: transition.to,
                aggregate: context.sensors.aggregate(),
                transition: transition.label(),
                cool_down_remaining_ms: context.flow.cool_down_remaining(now).num_milliseconds(),
                sensors: context.sensors.clone(),
                on_unknown_off_sequence: context.history.is_on_unknown_off_sequence(),
                timestamp: now,
            },
        }
    }

    fn schedule_recheck(self: &Arc<Self>, topic: &str, delay: Duration) {
        let delay = delay.to_std().unwrap_or_default();
        tracing::debug!(topic, delay_ms = delay.as_millis(), "scheduling cooldown re-check");
        let task = Self::recheck_task(Arc::clone(self), topic.to_string());
        self.scheduler.schedule(topic, delay, task);
    }

    fn recheck_task(service: Arc<Self>, topic: String) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            match service.recheck(&topic, now()).await {
                Ok(report) => {
                    let published = service
                        .publisher
                        .publish(Outbound::from(report))
                        .await;
                    if let Err(err) = published {
                        tracing::warn!(topic, error = %err, "failed to publish re-check outcome");
                    }
                }
                Err(err) => tracing::warn!(topic, error = %err, "cooldown re-check failed"),
            }
        })
    }

    async fn load_context(&self, topic: &str) -> Result<TopicContext, HomeRulesError> {
        Ok(TopicContext {
            flow: load(&self.store, &ContextKey::flow_info(topic)).await?,
            sensors: load(&self.store, &ContextKey::presence_states(topic)).await?,
            history: load(&self.store, &ContextKey::transition_history(topic)).await?,
            debounce: load(&self.store, &ContextKey::reset_debounce(topic)).await?,
        })
    }

    async fn save_context(
        &self,
        topic: &str,
        context: &TopicContext,
    ) -> Result<(), HomeRulesError> {
        save(&self.store, &ContextKey::flow_info(topic), &context.flow).await?;
        save(
            &self.store,
            &ContextKey::presence_states(topic),
            &context.sensors,
        )
        .await?;
        save(
            &self.store,
            &ContextKey::transition_history(topic),
            &context.history,
        )
        .await?;
        save(
            &self.store,
            &ContextKey::reset_debounce(topic),
            &context.debounce,
        )
        .await
    }
}
