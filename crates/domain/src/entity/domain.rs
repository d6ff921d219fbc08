//! Closed table of entity domains with their on/off states and services.

use std::fmt;

use serde::{Deserialize, Serialize};

/// States an entity of a domain takes when a schedule is active or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainStates {
    pub on: &'static str,
    pub off: &'static str,
}

const ON_OFF: DomainStates = DomainStates {
    on: "on",
    off: "off",
};

/// Entity domain, derived from the entity id prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Domain {
    Light,
    Switch,
    Fan,
    Lock,
    Cover,
    MediaPlayer,
    Climate,
    Vacuum,
    Person,
    DeviceTracker,
    BinarySensor,
    InputBoolean,
    InputSelect,
    Select,
    Button,
    Number,
    Sensor,
    Other(String),
}

impl Domain {
    /// Parse the domain of an entity id.
    #[must_use]
    pub fn from_entity_id(entity_id: &str) -> Self {
        Self::from(super::domain_of(entity_id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Fan => "fan",
            Self::Lock => "lock",
            Self::Cover => "cover",
            Self::MediaPlayer => "media_player",
            Self::Climate => "climate",
            Self::Vacuum => "vacuum",
            Self::Person => "person",
            Self::DeviceTracker => "device_tracker",
            Self::BinarySensor => "binary_sensor",
            Self::InputBoolean => "input_boolean",
            Self::InputSelect => "input_select",
            Self::Select => "select",
            Self::Button => "button",
            Self::Number => "number",
            Self::Sensor => "sensor",
            Self::Other(name) => name,
        }
    }

    /// Active and inactive states for this domain; unknown domains use `on`/`off`.
    #[must_use]
    pub fn states(&self) -> DomainStates {
        match self {
            Self::Lock => DomainStates {
                on: "locked",
                off: "unlocked",
            },
            Self::Cover => DomainStates {
                on: "open",
                off: "closed",
            },
            Self::MediaPlayer => DomainStates {
                on: "playing",
                off: "off",
            },
            Self::Climate => DomainStates {
                on: "heat",
                off: "off",
            },
            Self::Vacuum => DomainStates {
                on: "cleaning",
                off: "docked",
            },
            Self::Person | Self::DeviceTracker => DomainStates {
                on: "home",
                off: "not_home",
            },
            _ => ON_OFF,
        }
    }

    /// Target state for an active or inactive schedule.
    #[must_use]
    pub fn target_state(&self, active: bool) -> &'static str {
        let states = self.states();
        if active { states.on } else { states.off }
    }

    /// The service that drives an entity of this domain into `state`.
    ///
    /// Returns `None` for read-only domains and for states the domain has no
    /// service for.
    #[must_use]
    pub fn service_for_state(&self, state: &str) -> Option<&'static str> {
        match self {
            Self::Light | Self::Switch | Self::Fan | Self::InputBoolean => match state {
                "on" => Some("turn_on"),
                "off" => Some("turn_off"),
                _ => None,
            },
            Self::MediaPlayer => Some(match state {
                "on" => "turn_on",
                "playing" => "media_play",
                "paused" => "media_pause",
                _ => "turn_off",
            }),
            Self::Lock => Some(match state {
                "locked" | "on" => "lock",
                _ => "unlock",
            }),
            Self::Cover => Some(match state {
                "open" | "on" => "open_cover",
                _ => "close_cover",
            }),
            Self::Climate => Some("set_hvac_mode"),
            Self::Vacuum => Some(match state {
                "cleaning" => "start",
                "docked" => "return_to_base",
                "paused" => "pause",
                _ => "stop",
            }),
            Self::InputSelect | Self::Select => Some("select_option"),
            Self::Person
            | Self::DeviceTracker
            | Self::BinarySensor
            | Self::Button
            | Self::Number
            | Self::Sensor => None,
            Self::Other(_) => match state {
                "on" => Some("turn_on"),
                "off" => Some("turn_off"),
                _ => None,
            },
        }
    }

    /// Whether tag-based matching may target this domain.
    #[must_use]
    pub fn is_controllable(&self) -> bool {
        matches!(
            self,
            Self::Light
                | Self::Switch
                | Self::Fan
                | Self::Climate
                | Self::Lock
                | Self::Cover
                | Self::MediaPlayer
        )
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        match value {
            "light" => Self::Light,
            "switch" => Self::Switch,
            "fan" => Self::Fan,
            "lock" => Self::Lock,
            "cover" => Self::Cover,
            "media_player" => Self::MediaPlayer,
            "climate" => Self::Climate,
            "vacuum" => Self::Vacuum,
            "person" => Self::Person,
            "device_tracker" => Self::DeviceTracker,
            "binary_sensor" => Self::BinarySensor,
            "input_boolean" => Self::InputBoolean,
            "input_select" => Self::InputSelect,
            "select" => Self::Select,
            "button" => Self::Button,
            "number" => Self::Number,
            "sensor" => Self::Sensor,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Domain {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_lock_states_to_lock_services() {
        let lock = Domain::Lock;
        assert_eq!(lock.target_state(true), "locked");
        assert_eq!(lock.target_state(false), "unlocked");
        assert_eq!(lock.service_for_state("locked"), Some("lock"));
        assert_eq!(lock.service_for_state("unlocked"), Some("unlock"));
    }

    #[test]
    fn should_map_cover_states_to_cover_services() {
        assert_eq!(Domain::Cover.service_for_state("open"), Some("open_cover"));
        assert_eq!(
            Domain::Cover.service_for_state("closed"),
            Some("close_cover")
        );
    }

    #[test]
    fn should_use_set_hvac_mode_for_every_climate_state() {
        for state in ["heat", "off"] {
            assert_eq!(
                Domain::Climate.service_for_state(state),
                Some("set_hvac_mode")
            );
        }
    }

    #[test]
    fn should_have_no_service_for_read_only_domains() {
        assert_eq!(Domain::BinarySensor.service_for_state("on"), None);
        assert_eq!(Domain::Person.service_for_state("home"), None);
    }

    #[test]
    fn should_fall_back_to_on_off_for_unknown_domain() {
        let domain = Domain::from("humidifier");
        assert_eq!(domain, Domain::Other("humidifier".to_string()));
        assert_eq!(domain.states(), ON_OFF);
        assert_eq!(domain.service_for_state("on"), Some("turn_on"));
        assert_eq!(domain.service_for_state("dry"), None);
    }

    #[test]
    fn should_roundtrip_domain_name() {
        for name in [
            "light",
            "media_player",
            "device_tracker",
            "input_select",
            "custom",
        ] {
            assert_eq!(Domain::from(name).as_str(), name);
        }
    }

    #[test]
    fn should_restrict_tag_matching_to_controllable_domains() {
        assert!(Domain::Light.is_controllable());
        assert!(Domain::MediaPlayer.is_controllable());
        assert!(!Domain::Sensor.is_controllable());
        assert!(!Domain::InputSelect.is_controllable());
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let json = serde_json::to_string(&Domain::MediaPlayer).unwrap();
        assert_eq!(json, "\"media_player\"");
    }
}
