//! JSON-lines inbound messages.
//!
//! Every line on stdin is one [`Inbound`] object tagged by `type`:
//!
//! ```json
//! {"type":"sensor","topic":"bath","entity_id":"binary_sensor.bath_motion","new_state":"on"}
//! {"type":"state","entity_id":"light.bath","state":"on","attributes":{"brightness":200}}
//! {"type":"tick"}
//! {"type":"add_to_blacklist","entity_id":"light.tv","namespace":"movie"}
//! ```

use homerules_adapter_memory::EntityUpdate;
use homerules_app::services::presence_service::SensorEvent;
use homerules_app::services::schedule_service::ScheduleTick;
use homerules_domain::error::HomeRulesError;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A presence sensor changed.
    Sensor(SensorEvent),
    /// Run a schedule cycle now.
    Tick(ScheduleTick),
    /// An entity changed; feeds the snapshot.
    State(EntityUpdate),
    SetStaticState {
        entity_id: String,
        state: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    RemoveStaticState {
        entity_id: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    AddToBlacklist {
        entity_id: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    RemoveFromBlacklist {
        entity_id: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    ClearNamespace {
        namespace: String,
    },
}

impl Inbound {
    /// Decode one line.
    ///
    /// # Errors
    ///
    /// Returns [`InboundError::Decode`] for malformed JSON or an unknown type.
    pub fn parse(line: &str) -> Result<Self, InboundError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Failure to handle one inbound line. Never fatal to the daemon.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed inbound message")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] HomeRulesError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_sensor_event() {
        let inbound = Inbound::parse(
            r#"{"type":"sensor","topic":"bath","entity_id":"binary_sensor.bath_motion","new_state":"on"}"#,
        )
        .unwrap();
        assert_eq!(
            inbound,
            Inbound::Sensor(SensorEvent {
                topic: "bath".to_string(),
                entity_id: "binary_sensor.bath_motion".to_string(),
                new_state: "on".to_string(),
            })
        );
    }

    #[test]
    fn should_parse_bare_tick() {
        let inbound = Inbound::parse(r#"{"type":"tick"}"#).unwrap();
        assert_eq!(inbound, Inbound::Tick(ScheduleTick::default()));
    }

    #[test]
    fn should_parse_tick_with_entity_batch() {
        let inbound = Inbound::parse(
            r#"{"type":"tick","entities":[{"entity_id":"light.porch","state":"off"}],"blacklist":["light.tv"]}"#,
        )
        .unwrap();
        let Inbound::Tick(tick) = inbound else {
            panic!("expected a tick");
        };
        assert_eq!(tick.entities.unwrap()[0].entity_id, "light.porch");
        assert_eq!(tick.blacklist, vec!["light.tv".to_string()]);
    }

    #[test]
    fn should_default_static_state_namespace() {
        let inbound =
            Inbound::parse(r#"{"type":"set_static_state","entity_id":"light.tv","state":"on"}"#)
                .unwrap();
        assert_eq!(
            inbound,
            Inbound::SetStaticState {
                entity_id: "light.tv".to_string(),
                state: "on".to_string(),
                namespace: None,
            }
        );
    }

    #[test]
    fn should_reject_unknown_type() {
        let result = Inbound::parse(r#"{"type":"reboot"}"#);
        assert!(matches!(result, Err(InboundError::Decode(_))));
    }
}
