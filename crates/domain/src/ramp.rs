//! Sunrise and sunset light fades driven by schedule ramp events.
//!
//! Sunrise raises brightness from [`MIN_BRIGHTNESS`] to the target and warms
//! up colour temperature from [`WARM_KELVIN`]. Sunset fades the current
//! brightness down to [`MIN_BRIGHTNESS`], cools the colour back to
//! [`WARM_KELVIN`] and switches the light off at the bottom. Lights without
//! brightness support only switch, once `t` reaches [`SWITCH_THRESHOLD`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;
use crate::entity::{Domain, Entity};

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 255;
/// Candlelight colour temperature both fades start or end at.
pub const WARM_KELVIN: u32 = 2200;
pub const DEFAULT_TARGET_KELVIN: u32 = 3000;
/// Progress at which non-dimmable lights switch.
pub const SWITCH_THRESHOLD: f64 = 0.75;

const SUPPORT_BRIGHTNESS: i64 = 1;
const SUPPORT_COLOR_TEMP: i64 = 2;

/// Which fade to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampPhase {
    Sunrise,
    Sunset,
}

/// End point of the sunrise fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampTarget {
    pub brightness: u8,
    pub kelvin: u32,
}

impl Default for RampTarget {
    fn default() -> Self {
        Self {
            brightness: MAX_BRIGHTNESS,
            kelvin: DEFAULT_TARGET_KELVIN,
        }
    }
}

#[must_use]
pub fn kelvin_to_mireds(kelvin: u32) -> u32 {
    if kelvin == 0 {
        return 0;
    }
    (1_000_000 + kelvin / 2) / kelvin
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp(t: f64, from: f64, to: f64) -> u32 {
    (from + (to - from) * t.clamp(0.0, 1.0)).round().max(0.0) as u32
}

fn features(light: &Entity) -> i64 {
    light
        .attribute("supported_features")
        .and_then(crate::entity::AttributeValue::as_i64)
        .unwrap_or(0)
}

#[must_use]
pub fn supports_brightness(light: &Entity) -> bool {
    features(light) & SUPPORT_BRIGHTNESS == SUPPORT_BRIGHTNESS
}

#[must_use]
pub fn supports_color_temp(light: &Entity) -> bool {
    features(light) & SUPPORT_COLOR_TEMP == SUPPORT_COLOR_TEMP
}

/// The light command for one fade step, or `None` when the light should
/// not be touched yet (or is not a light).
#[must_use]
pub fn ramp_action(light: &Entity, phase: RampPhase, t: f64, target: RampTarget) -> Option<Action> {
    if light.domain() != Domain::Light {
        return None;
    }
    match phase {
        RampPhase::Sunrise => sunrise(light, t, target),
        RampPhase::Sunset => sunset(light, t),
    }
}

fn sunrise(light: &Entity, t: f64, target: RampTarget) -> Option<Action> {
    if !supports_brightness(light) {
        return (t >= SWITCH_THRESHOLD)
            .then(|| Action::new("light", "turn_on", light.entity_id.clone()));
    }
    let brightness = lerp(t, f64::from(MIN_BRIGHTNESS), f64::from(target.brightness));
    let mut action = Action::new("light", "turn_on", light.entity_id.clone())
        .with_data("brightness", Value::from(brightness));
    if supports_color_temp(light) {
        let kelvin = lerp(t, f64::from(WARM_KELVIN), f64::from(target.kelvin));
        action = action.with_data("color_temp", Value::from(kelvin_to_mireds(kelvin)));
    }
    Some(action)
}

fn sunset(light: &Entity, t: f64) -> Option<Action> {
    let off = || Action::new("light", "turn_off", light.entity_id.clone());
    if !supports_brightness(light) {
        return (t >= SWITCH_THRESHOLD).then(off);
    }
    let current = light
        .attribute("brightness")
        .and_then(crate::entity::AttributeValue::as_f64)
        .unwrap_or(f64::from(MAX_BRIGHTNESS));
    let brightness = lerp(t, current, f64::from(MIN_BRIGHTNESS));
    if brightness <= u32::from(MIN_BRIGHTNESS) {
        return Some(off());
    }
    let mut action = Action::new("light", "turn_on", light.entity_id.clone())
        .with_data("brightness", Value::from(brightness));
    if supports_color_temp(light) {
        let current_kelvin = light
            .attribute("color_temp")
            .and_then(crate::entity::AttributeValue::as_f64)
            .filter(|mireds| *mireds > 0.0)
            .map_or(f64::from(DEFAULT_TARGET_KELVIN), |mireds| (1_000_000.0 / mireds).round());
        let kelvin = lerp(t, current_kelvin, f64::from(WARM_KELVIN));
        action = action.with_data("color_temp", Value::from(kelvin_to_mireds(kelvin)));
    }
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AttributeValue;

    fn dimmable(id: &str, state: &str) -> Entity {
        Entity::new(id, state).with_attribute("supported_features", AttributeValue::Int(3))
    }

    #[test]
    fn should_convert_kelvin_to_mireds() {
        assert_eq!(kelvin_to_mireds(2200), 455);
        assert_eq!(kelvin_to_mireds(3000), 333);
        assert_eq!(kelvin_to_mireds(0), 0);
    }

    #[test]
    fn should_start_sunrise_dim_and_warm() {
        let light = dimmable("light.bedroom", "off");
        let action = ramp_action(&light, RampPhase::Sunrise, 0.0, RampTarget::default()).unwrap();
        assert_eq!(action.service, "turn_on");
        assert_eq!(action.data.extra["brightness"], 1);
        assert_eq!(action.data.extra["color_temp"], 455);
    }

    #[test]
    fn should_reach_target_at_end_of_sunrise() {
        let light = dimmable("light.bedroom", "on");
        let action = ramp_action(&light, RampPhase::Sunrise, 1.0, RampTarget::default()).unwrap();
        assert_eq!(action.data.extra["brightness"], 255);
        assert_eq!(action.data.extra["color_temp"], 333);
    }

    #[test]
    fn should_switch_non_dimmable_lights_late() {
        let light = Entity::new("light.hall", "off");
        let early = ramp_action(&light, RampPhase::Sunrise, 0.5, RampTarget::default());
        assert!(early.is_none());
        let action = ramp_action(&light, RampPhase::Sunrise, 0.8, RampTarget::default()).unwrap();
        assert_eq!(action.service, "turn_on");
        assert!(action.data.extra.is_empty());
    }

    #[test]
    fn should_fade_current_brightness_at_sunset() {
        let light = Entity::new("light.living", "on")
            .with_attribute("supported_features", AttributeValue::Int(1))
            .with_attribute("brightness", AttributeValue::Int(201));
        let action = ramp_action(&light, RampPhase::Sunset, 0.5, RampTarget::default()).unwrap();
        assert_eq!(action.service, "turn_on");
        assert_eq!(action.data.extra["brightness"], 101);
        assert!(!action.data.extra.contains_key("color_temp"));
    }

    #[test]
    fn should_turn_off_at_bottom_of_sunset() {
        let light = dimmable("light.living", "on");
        let action = ramp_action(&light, RampPhase::Sunset, 1.0, RampTarget::default()).unwrap();
        assert_eq!(action.service, "turn_off");
        assert!(action.data.extra.is_empty());
    }

    #[test]
    fn should_ignore_non_light_entities() {
        let switch = Entity::new("switch.fan", "on");
        let action = ramp_action(&switch, RampPhase::Sunset, 1.0, RampTarget::default());
        assert!(action.is_none());
    }
}
