//! Schedule events: advisory progress signals for downstream fade consumers.
//!
//! Events never produce actions on their own. Every kind carries a `t` that
//! grows from `0` to `1` as its window elapses; use [`ScheduleEvent::level`]
//! for the fade value of the ramp-down kinds.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{NormalizedSchedule, ScheduleKind};
use crate::time::LocalTimestamp;
use crate::window::calculate_progress;

/// What the event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEventKind {
    Active,
    Inactive,
    /// Preamble before the start.
    RampUp,
    /// Last preamble minutes before the end.
    RampDownBeforeEnd,
    /// Postamble after the end.
    RampDown,
}

impl std::fmt::Display for ScheduleEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::RampUp => "ramp_up",
            Self::RampDownBeforeEnd => "ramp_down_before_end",
            Self::RampDown => "ramp_down",
        })
    }
}

/// Sun-like phase a consumer can key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Sunrise,
    Active,
    SunsetPrep,
    Sunset,
    Inactive,
}

impl ScheduleEventKind {
    #[must_use]
    pub fn phase(self) -> EventPhase {
        match self {
            Self::Active => EventPhase::Active,
            Self::Inactive => EventPhase::Inactive,
            Self::RampUp => EventPhase::Sunrise,
            Self::RampDownBeforeEnd => EventPhase::SunsetPrep,
            Self::RampDown => EventPhase::Sunset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub schedule: String,
    #[serde(rename = "type")]
    pub kind: ScheduleEventKind,
    pub t: f64,
    pub time: LocalTimestamp,
    pub phase: EventPhase,
}

impl ScheduleEvent {
    fn new(
        schedule: &NormalizedSchedule,
        kind: ScheduleEventKind,
        t: f64,
        time: LocalTimestamp,
    ) -> Self {
        Self {
            schedule: schedule.name.clone(),
            kind,
            t,
            time,
            phase: kind.phase(),
        }
    }

    /// Fade level: `t` for rising kinds, `1 - t` for the ramp-down kinds.
    #[must_use]
    pub fn level(&self) -> f64 {
        match self.kind {
            ScheduleEventKind::RampDownBeforeEnd | ScheduleEventKind::RampDown => 1.0 - self.t,
            _ => self.t,
        }
    }
}

/// Events for one schedule at `now`.
///
/// Every schedule yields `active` inside its window; continuous schedules
/// yield `inactive` outside it. Ramp events are limited to continuous
/// schedules with interpolation and its events enabled.
#[must_use]
pub fn calculate_schedule_events(
    schedule: &NormalizedSchedule,
    now: LocalTimestamp,
) -> Vec<ScheduleEvent> {
    let start = schedule.window.start;
    let end = schedule.window.end;
    let mut events = Vec::new();

    if schedule.is_active(now) {
        events.push(ScheduleEvent::new(
            schedule,
            ScheduleEventKind::Active,
            schedule.window.progress(now),
            now,
        ));
    } else if schedule.kind == ScheduleKind::Continuous {
        // A window rolled to tomorrow means today's occurrence already ended.
        let t = if now < start && start.date() == now.date() {
            0.0
        } else {
            1.0
        };
        events.push(ScheduleEvent::new(schedule, ScheduleEventKind::Inactive, t, now));
    }

    let interpolation = schedule.interpolation;
    if schedule.kind != ScheduleKind::Continuous
        || !interpolation.enabled
        || !interpolation.events
    {
        return events;
    }

    let preamble = schedule.preamble();
    let postamble = schedule.postamble();
    let within = |from: LocalTimestamp, to: LocalTimestamp| from < to && now >= from && now <= to;

    // The resolved window may already point at the next occurrence, so the
    // previous one is checked too for a postamble still running.
    let day = Duration::days(1);
    let occurrences = [(start, end), (start - day, end - day)];
    let mut push_once = |kind: ScheduleEventKind, t: f64| {
        if !events.iter().any(|e| e.kind == kind) {
            events.push(ScheduleEvent::new(schedule, kind, t, now));
        }
    };

    for (start, end) in occurrences {
        if within(start - preamble, start) {
            let t = calculate_progress(now, start - preamble, start);
            push_once(ScheduleEventKind::RampUp, t);
        }
        if within(end - preamble, end) {
            let t = calculate_progress(now, end - preamble, end);
            push_once(ScheduleEventKind::RampDownBeforeEnd, t);
        }
        if within(end, end + postamble) {
            let t = calculate_progress(now, end, end + postamble);
            push_once(ScheduleEventKind::RampDown, t);
        }
    }
    events
}
