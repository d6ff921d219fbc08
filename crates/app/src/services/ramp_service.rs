//! Ramp service — turns one schedule's sunrise and sunset events into light
//! fades, only while the household is home.

use homerules_domain::action::{Action, group_actions};
use homerules_domain::entity::Entity;
use homerules_domain::error::HomeRulesError;
use homerules_domain::ramp::{RampPhase, RampTarget, ramp_action};
use homerules_domain::schedule::{
    DEFAULT_PRESENCE_ENTITY, EventPhase, ScheduleEvent, ScheduleEventKind,
};
use serde::Serialize;

use crate::ports::EntitySnapshot;

pub const DEFAULT_HOME_STATE: &str = "home";

/// Which schedule drives the fades and which lights follow.
#[derive(Debug, Clone, PartialEq)]
pub struct RampSettings {
    pub schedule: String,
    pub presence_entity: String,
    pub home_state: String,
    /// Lights woken at sunrise.
    pub sunrise_entities: Vec<String>,
    /// Lights faded at sunset; every light currently on when empty.
    pub sunset_entities: Vec<String>,
    pub target: RampTarget,
}

impl RampSettings {
    #[must_use]
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            presence_entity: DEFAULT_PRESENCE_ENTITY.to_string(),
            home_state: DEFAULT_HOME_STATE.to_string(),
            sunrise_entities: Vec::new(),
            sunset_entities: Vec::new(),
            target: RampTarget::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RampDebug {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RampPhase>,
    pub t: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub entities_found: usize,
    pub actions_generated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RampReport {
    pub actions: Vec<Action>,
    pub debug: RampDebug,
}

pub struct RampService<S> {
    snapshot: S,
    settings: RampSettings,
}

impl<S: EntitySnapshot + Send + Sync> RampService<S> {
    pub fn new(snapshot: S, settings: RampSettings) -> Self {
        Self { snapshot, settings }
    }

    fn phase_of(&self, event: &ScheduleEvent) -> Option<RampPhase> {
        if event.schedule != self.settings.schedule {
            return None;
        }
        match (event.kind, event.phase) {
            (ScheduleEventKind::RampUp, EventPhase::Sunrise) => Some(RampPhase::Sunrise),
            (ScheduleEventKind::RampDown, EventPhase::Sunset) => Some(RampPhase::Sunset),
            _ => None,
        }
    }

    /// React to the first sunrise or sunset event of the configured schedule.
    /// Returns `None` when no event concerns this service.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot fails.
    #[tracing::instrument(skip_all, fields(schedule = %self.settings.schedule))]
    pub async fn handle_events(
        &self,
        events: &[ScheduleEvent],
    ) -> Result<Option<RampReport>, HomeRulesError> {
        let Some((phase, event)) = events
            .iter()
            .find_map(|event| self.phase_of(event).map(|phase| (phase, event)))
        else {
            return Ok(None);
        };

        let presence_state = self
            .snapshot
            .get_entity(&self.settings.presence_entity)
            .await?
            .map(|entity| entity.state);
        let mut debug = RampDebug {
            phase: Some(phase),
            t: event.t,
            presence_state: presence_state.clone(),
            ..RampDebug::default()
        };
        if presence_state.as_deref() != Some(self.settings.home_state.as_str()) {
            tracing::debug!(?presence_state, "not home, skipping ramp");
            debug.reason = Some("not_home".to_string());
            return Ok(Some(RampReport {
                actions: Vec::new(),
                debug,
            }));
        }

        let lights = self.targets(phase).await?;
        let actions: Vec<Action> = lights
            .iter()
            .filter_map(|light| ramp_action(light, phase, event.t, self.settings.target))
            .collect();
        debug.entities_found = lights.len();
        debug.actions_generated = actions.len();
        tracing::debug!(?phase, t = event.t, actions = actions.len(), "ramp step");

        Ok(Some(RampReport {
            actions: group_actions(actions),
            debug,
        }))
    }

    async fn targets(&self, phase: RampPhase) -> Result<Vec<Entity>, HomeRulesError> {
        let configured = match phase {
            RampPhase::Sunrise => &self.settings.sunrise_entities,
            RampPhase::Sunset => &self.settings.sunset_entities,
        };
        if configured.is_empty() && phase == RampPhase::Sunset {
            let mut lights = self.snapshot.get_entities_by_domain("light").await?;
            lights.retain(|light| light.state == "on");
            return Ok(lights);
        }
        let mut lights = Vec::with_capacity(configured.len());
        for entity_id in configured {
            if let Some(light) = self.snapshot.get_entity(entity_id).await? {
                lights.push(light);
            }
        }
        Ok(lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homerules_domain::entity::AttributeValue;
    use regex::Regex;
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSnapshot {
        entities: Mutex<BTreeMap<String, Entity>>,
    }

    impl FakeSnapshot {
        fn insert(&self, entity: Entity) {
            self.entities
                .lock()
                .unwrap()
                .insert(entity.entity_id.clone(), entity);
        }
    }

    impl EntitySnapshot for FakeSnapshot {
        fn get_entity(
            &self,
            entity_id: &str,
        ) -> impl Future<Output = Result<Option<Entity>, HomeRulesError>> + Send {
            let entity = self.entities.lock().unwrap().get(entity_id).cloned();
            async { Ok(entity) }
        }

        fn get_entities_by_domain(
            &self,
            domain: &str,
        ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
            let found: Vec<Entity> = self
                .entities
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.domain_name() == domain)
                .cloned()
                .collect();
            async { Ok(found) }
        }

        fn get_entities_by_pattern(
            &self,
            _pattern: &Regex,
        ) -> impl Future<Output = Result<Vec<Entity>, HomeRulesError>> + Send {
            async { Ok(Vec::new()) }
        }
    }

    fn event(kind: ScheduleEventKind, t: f64) -> ScheduleEvent {
        ScheduleEvent {
            schedule: "day_status".to_string(),
            kind,
            t,
            time: chrono::NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(6, 30, 0)
                .unwrap(),
            phase: kind.phase(),
        }
    }

    fn dimmable(id: &str, state: &str, brightness: i64) -> Entity {
        Entity::new(id, state)
            .with_attribute("supported_features", AttributeValue::Int(1))
            .with_attribute("brightness", AttributeValue::Int(brightness))
    }

    fn make_service(presence: &str) -> RampService<FakeSnapshot> {
        let snapshot = FakeSnapshot::default();
        snapshot.insert(Entity::new(DEFAULT_PRESENCE_ENTITY, presence));
        snapshot.insert(dimmable("light.bedroom", "off", 0));
        snapshot.insert(dimmable("light.living", "on", 201));
        snapshot.insert(dimmable("light.hall", "off", 0));
        let mut settings = RampSettings::new("day_status");
        settings.sunrise_entities = vec!["light.bedroom".to_string()];
        RampService::new(snapshot, settings)
    }

    #[tokio::test]
    async fn should_ignore_unrelated_events() {
        let svc = make_service("home");
        let events = vec![event(ScheduleEventKind::Active, 0.2)];
        assert!(svc.handle_events(&events).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_wake_sunrise_lights_when_home() {
        let svc = make_service("home");
        let report = svc
            .handle_events(&[event(ScheduleEventKind::RampUp, 0.5)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(
            report.actions[0].to_string(),
            "light.turn_on(light.bedroom)"
        );
        assert_eq!(report.actions[0].data.extra["brightness"], 128);
        assert_eq!(report.debug.phase, Some(RampPhase::Sunrise));
    }

    #[tokio::test]
    async fn should_fade_lights_that_are_on_at_sunset() {
        let svc = make_service("home");
        let report = svc
            .handle_events(&[event(ScheduleEventKind::RampDown, 0.5)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.debug.entities_found, 1);
        assert_eq!(report.actions[0].to_string(), "light.turn_on(light.living)");
        assert_eq!(report.actions[0].data.extra["brightness"], 101);
    }

    #[tokio::test]
    async fn should_do_nothing_when_away() {
        let svc = make_service("away");
        let report = svc
            .handle_events(&[event(ScheduleEventKind::RampUp, 0.5)])
            .await
            .unwrap()
            .unwrap();
        assert!(report.actions.is_empty());
        assert_eq!(report.debug.reason.as_deref(), Some("not_home"));
        assert_eq!(report.debug.presence_state.as_deref(), Some("away"));
    }
}
