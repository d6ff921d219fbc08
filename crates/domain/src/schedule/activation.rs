//! Activation: decide the corrective action for one entity and schedule.

use serde_json::Value;

use super::{EntityMatcher, NormalizedSchedule};
use crate::action::Action;
use crate::entity::{Domain, Entity};
use crate::time::LocalTimestamp;

/// The action that moves `entity` to the schedule's on or off side.
///
/// Per-entity overrides win over the schedule's default states, which win
/// over the domain table. Returns `None` when the entity is already in the
/// target state, when the domain has no service for it, or for the inactive
/// side of a unidirectional schedule.
#[must_use]
pub fn determine_action(
    entity: &Entity,
    schedule: &NormalizedSchedule,
    matcher: Option<&EntityMatcher>,
    active: bool,
) -> Option<Action> {
    if !active && schedule.unidirectional {
        return None;
    }
    let domain = entity.domain();
    let spec = matcher
        .and_then(|m| m.states.get(active))
        .or_else(|| schedule.default_states.get(active));

    let target = spec
        .and_then(|s| s.state.as_deref())
        .unwrap_or_else(|| domain.target_state(active));
    if entity.state == target {
        return None;
    }

    let service = match spec.and_then(|s| s.service.as_deref()) {
        Some(service) => service,
        None => domain.service_for_state(target)?,
    };

    let action_domain = spec
        .and_then(|s| s.domain.as_deref())
        .unwrap_or_else(|| entity.domain_name());
    let mut action = Action::new(action_domain, service, entity.entity_id.clone());
    if let Some(spec) = spec {
        action.data.extra.extend(spec.data.clone());
    }
    if domain == Domain::Climate && service == "set_hvac_mode" {
        action = action.with_data("hvac_mode", Value::from(target));
    }
    Some(action)
}

/// Continuous semantics: enforce the side matching the current window.
#[must_use]
pub fn evaluate_continuous(
    entity: &Entity,
    schedule: &NormalizedSchedule,
    matcher: Option<&EntityMatcher>,
    now: LocalTimestamp,
) -> Option<Action> {
    determine_action(entity, schedule, matcher, schedule.is_active(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::EntityTarget;
    use crate::schedule::{
        EntityMatch, EntityStateSpec, OneOrMany, ScheduleDefinition, ScheduleKind, StateOverrides,
    };
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> LocalTimestamp {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn normalize(definition: &ScheduleDefinition, now: LocalTimestamp) -> NormalizedSchedule {
        NormalizedSchedule::from_definition(definition, 0, now, 10, |_| None).unwrap()
    }

    fn plants_global() -> ScheduleDefinition {
        ScheduleDefinition::builder()
            .name("plants_global")
            .entity("regex:^switch\\.garden")
            .kind(ScheduleKind::Continuous)
            .precedence(100)
            .start("06:00")
            .end("23:00")
            .build()
            .unwrap()
    }

    #[test]
    fn should_turn_on_garden_switch_inside_window() {
        let schedule = normalize(&plants_global(), at(10, 0));
        let entity = Entity::new("switch.garden_grow", "off");
        let action = evaluate_continuous(
            &entity,
            &schedule,
            schedule.matcher_for("switch.garden_grow"),
            at(10, 0),
        )
        .unwrap();
        assert_eq!(action.domain, "switch");
        assert_eq!(action.service, "turn_on");
        assert_eq!(
            action.data.entity_id,
            EntityTarget::One("switch.garden_grow".to_string())
        );
        assert!(action.data.extra.is_empty());
    }

    #[test]
    fn should_do_nothing_when_already_in_target_state() {
        let schedule = normalize(&plants_global(), at(10, 0));
        let entity = Entity::new("switch.garden_grow", "on");
        let action = evaluate_continuous(&entity, &schedule, None, at(10, 0));
        assert!(action.is_none());
    }

    #[test]
    fn should_correct_drift_outside_window() {
        let schedule = normalize(&plants_global(), at(23, 30));
        let entity = Entity::new("switch.garden_grow", "on");
        let action = evaluate_continuous(&entity, &schedule, None, at(23, 30)).unwrap();
        assert_eq!(action.service, "turn_off");
    }

    #[test]
    fn should_prefer_entity_override_over_default_states() {
        let definition = ScheduleDefinition::builder()
            .name("blinds")
            .entity(EntityMatch::Config {
                entity_id: OneOrMany::One("cover.office".to_string()),
                states: StateOverrides {
                    on: Some(EntityStateSpec::state("open").with_service("open_cover_tilt")),
                    off: None,
                },
            })
            .kind(ScheduleKind::Continuous)
            .start("08:00")
            .end("20:00")
            .default_on(EntityStateSpec::state("open").with_service("set_cover_position"))
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(9, 0));
        let entity = Entity::new("cover.office", "closed");
        let action = evaluate_continuous(
            &entity,
            &schedule,
            schedule.matcher_for("cover.office"),
            at(9, 0),
        )
        .unwrap();
        assert_eq!(action.service, "open_cover_tilt");
    }

    #[test]
    fn should_fall_back_to_domain_table() {
        let definition = ScheduleDefinition::builder()
            .name("locks")
            .entity("lock.front")
            .kind(ScheduleKind::Continuous)
            .start("22:00")
            .end("06:00")
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(23, 0));
        let entity = Entity::new("lock.front", "unlocked");
        let action = evaluate_continuous(&entity, &schedule, None, at(23, 0)).unwrap();
        assert_eq!(action.domain, "lock");
        assert_eq!(action.service, "lock");
    }

    #[test]
    fn should_set_hvac_mode_for_climate() {
        let definition = ScheduleDefinition::builder()
            .name("heating")
            .entity("climate.living")
            .kind(ScheduleKind::Continuous)
            .start("06:00")
            .end("22:00")
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(7, 0));
        let entity = Entity::new("climate.living", "off");
        let action = evaluate_continuous(&entity, &schedule, None, at(7, 0)).unwrap();
        assert_eq!(action.service, "set_hvac_mode");
        assert_eq!(
            action.data.extra.get("hvac_mode"),
            Some(&Value::from("heat"))
        );
    }

    #[test]
    fn should_use_custom_domain_and_data() {
        let definition = ScheduleDefinition::builder()
            .name("day_status")
            .entity("input_select.day_status")
            .kind(ScheduleKind::Continuous)
            .start("07:00")
            .end("22:00")
            .default_on(
                EntityStateSpec::state("day")
                    .with_service("select_option")
                    .with_domain("input_select")
                    .with_data("option", Value::from("day")),
            )
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(8, 0));
        let entity = Entity::new("input_select.day_status", "night");
        let action = evaluate_continuous(&entity, &schedule, None, at(8, 0)).unwrap();
        assert_eq!(action.domain, "input_select");
        assert_eq!(action.data.extra.get("option"), Some(&Value::from("day")));
    }

    #[test]
    fn should_skip_inactive_side_of_unidirectional_schedule() {
        let definition = ScheduleDefinition::builder()
            .name("night_lock")
            .entity("lock.front")
            .kind(ScheduleKind::Continuous)
            .start("23:00")
            .end("23:01")
            .unidirectional(true)
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(12, 0));
        let entity = Entity::new("lock.front", "locked");
        let action = evaluate_continuous(&entity, &schedule, None, at(12, 0));
        assert!(action.is_none());
    }

    #[test]
    fn should_skip_domains_without_service() {
        let definition = ScheduleDefinition::builder()
            .name("sensors")
            .entity("binary_sensor.door")
            .kind(ScheduleKind::Continuous)
            .start("06:00")
            .end("22:00")
            .build()
            .unwrap();
        let schedule = normalize(&definition, at(7, 0));
        let entity = Entity::new("binary_sensor.door", "off");
        let action = evaluate_continuous(&entity, &schedule, None, at(7, 0));
        assert!(action.is_none());
    }
}
