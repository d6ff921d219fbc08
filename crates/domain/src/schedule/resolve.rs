//! Precedence resolution: exactly one schedule per entity, or none.

use super::{NormalizedSchedule, TagTable};

/// Every schedule targeting the entity, highest precedence first. Equal
/// precedences keep definition order.
#[must_use]
pub fn matching_schedules<'a>(
    entity_id: &str,
    schedules: &'a [NormalizedSchedule],
    tags: &TagTable,
) -> Vec<&'a NormalizedSchedule> {
    let mut matches: Vec<&NormalizedSchedule> = schedules
        .iter()
        .filter(|schedule| schedule.targets(entity_id, tags))
        .collect();
    matches.sort_by(|a, b| b.precedence.cmp(&a.precedence).then(a.index.cmp(&b.index)));
    matches
}

/// The winning schedule for the entity.
#[must_use]
pub fn resolve<'a>(
    entity_id: &str,
    schedules: &'a [NormalizedSchedule],
    tags: &TagTable,
) -> Option<&'a NormalizedSchedule> {
    matching_schedules(entity_id, schedules, tags)
        .into_iter()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ScheduleDefinition, ScheduleKind};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn normalized(definitions: &[ScheduleDefinition]) -> Vec<NormalizedSchedule> {
        let now = NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        definitions
            .iter()
            .enumerate()
            .map(|(i, d)| NormalizedSchedule::from_definition(d, i, now, 10, |_| None).unwrap())
            .collect()
    }

    fn schedule(name: &str, entity: &str, precedence: i32) -> ScheduleDefinition {
        ScheduleDefinition::builder()
            .name(name)
            .entity(entity)
            .kind(ScheduleKind::Continuous)
            .start("06:00")
            .end("23:00")
            .precedence(precedence)
            .build()
            .unwrap()
    }

    #[test]
    fn should_pick_highest_precedence_regardless_of_order() {
        let schedules = normalized(&[
            schedule("low", "regex:^switch\\.", 10),
            schedule("high", "switch.garden_grow", 100),
            schedule("mid", "regex:garden", 50),
        ]);
        let winner = resolve("switch.garden_grow", &schedules, &TagTable::default()).unwrap();
        assert_eq!(winner.name, "high");
    }

    #[test]
    fn should_prefer_earliest_defined_on_ties() {
        let schedules = normalized(&[
            schedule("first", "regex:^light\\.", 20),
            schedule("second", "light.hall", 20),
        ]);
        let winner = resolve("light.hall", &schedules, &TagTable::default()).unwrap();
        assert_eq!(winner.name, "first");
    }

    #[test]
    fn should_return_none_when_nothing_matches() {
        let schedules = normalized(&[schedule("only", "light.hall", 1)]);
        let resolved = resolve("light.kitchen", &schedules, &TagTable::default());
        assert!(resolved.is_none());
    }

    #[test]
    fn should_match_schedules_through_tags() {
        let tagged = ScheduleDefinition::builder()
            .name("plants")
            .tag("plants")
            .kind(ScheduleKind::Continuous)
            .start("06:00")
            .end("23:00")
            .precedence(5)
            .build()
            .unwrap();
        let schedules = normalized(&[tagged]);
        let mut defs = BTreeMap::new();
        defs.insert("plants".to_string(), vec!["grow".to_string()]);
        let tags = TagTable::compile(&defs).unwrap();
        assert!(resolve("switch.grow_light", &schedules, &tags).is_some());
        assert_eq!(matching_schedules("switch.fan", &schedules, &tags).len(), 0);
    }
}
