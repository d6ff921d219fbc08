//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homerules.toml` in the working directory, or the file named by
//! `HOMERULES_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use homerules_app::services::presence_service::TopicConfig;
use homerules_app::services::ramp_service::{DEFAULT_HOME_STATE, RampSettings};
use homerules_app::services::schedule_service::ScheduleSettings;
use homerules_domain::ramp::RampTarget;
use homerules_domain::schedule::{
    DEFAULT_MAX_AGE_HOURS, DEFAULT_PRESENCE_ENTITY, ScheduleDefinition,
};
use homerules_domain::window::DEFAULT_TRIGGER_WINDOW_MINUTES;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "homerules.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Schedule cycle tunables.
    pub engine: EngineConfig,
    /// Presence topics.
    pub topics: Vec<TopicSection>,
    /// Tag name to entity id patterns.
    pub tags: BTreeMap<String, Vec<String>>,
    pub schedules: Vec<ScheduleDefinition>,
    /// Optional sunrise/sunset light fades.
    pub ramp: Option<RampSection>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity whose state feeds `presence` conditions.
    pub presence_entity: String,
    pub trigger_window_minutes: i64,
    pub trigger_state_max_age_hours: i64,
    /// Seconds between two schedule ticks.
    pub tick_interval_secs: u64,
    /// Lifetime of cached entity listings.
    pub snapshot_ttl_ms: u64,
}

/// One presence topic.
#[derive(Debug, Deserialize)]
pub struct TopicSection {
    pub name: String,
    pub entities: Vec<String>,
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: i64,
}

/// Which schedule drives the light fades.
#[derive(Debug, Deserialize)]
pub struct RampSection {
    pub schedule: String,
    #[serde(default)]
    pub presence_entity: Option<String>,
    #[serde(default = "default_home_state")]
    pub home_state: String,
    #[serde(default)]
    pub sunrise_entities: Vec<String>,
    #[serde(default)]
    pub sunset_entities: Vec<String>,
    #[serde(default)]
    pub target: RampTarget,
}

fn default_cool_down_secs() -> i64 {
    600
}

fn default_home_state() -> String {
    DEFAULT_HOME_STATE.to_string()
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOMERULES_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMERULES_TICK_SECS")
            && let Ok(secs) = val.parse()
        {
            self.engine.tick_interval_secs = secs;
        }
        if let Ok(val) = std::env::var("HOMERULES_PRESENCE_ENTITY") {
            self.engine.presence_entity = val;
        }
        if let Ok(val) = std::env::var("HOMERULES_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "tick interval must be non-zero".to_string(),
            ));
        }
        if self.engine.trigger_window_minutes <= 0 {
            return Err(ConfigError::Validation(
                "trigger window must be positive".to_string(),
            ));
        }
        let mut topics = HashSet::new();
        for topic in &self.topics {
            if !topics.insert(topic.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate topic {}",
                    topic.name
                )));
            }
            if topic.cool_down_secs < 0 {
                return Err(ConfigError::Validation(format!(
                    "topic {} has a negative cool down",
                    topic.name
                )));
            }
        }
        for schedule in &self.schedules {
            schedule.validate().map_err(|err| {
                ConfigError::Validation(format!("schedule {}: {err}", schedule.name))
            })?;
        }
        if let Some(ramp) = &self.ramp
            && !self.schedules.iter().any(|s| s.name == ramp.schedule)
        {
            return Err(ConfigError::Validation(format!(
                "ramp refers to unknown schedule {}",
                ramp.schedule
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.engine.tick_interval_secs)
    }

    #[must_use]
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_millis(self.engine.snapshot_ttl_ms)
    }

    #[must_use]
    pub fn topic_configs(&self) -> Vec<TopicConfig> {
        self.topics
            .iter()
            .map(|topic| {
                TopicConfig::new(topic.name.clone(), topic.entities.clone())
                    .with_cool_down(chrono::Duration::seconds(topic.cool_down_secs))
            })
            .collect()
    }

    #[must_use]
    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            presence_entity: self.engine.presence_entity.clone(),
            trigger_window_minutes: self.engine.trigger_window_minutes,
            trigger_state_max_age: chrono::Duration::hours(self.engine.trigger_state_max_age_hours),
        }
    }

    /// Ramp settings, inheriting the engine presence entity when the ramp
    /// section names none.
    #[must_use]
    pub fn ramp_settings(&self) -> Option<RampSettings> {
        self.ramp.as_ref().map(|ramp| {
            let mut settings = RampSettings::new(ramp.schedule.clone());
            settings.presence_entity = ramp
                .presence_entity
                .clone()
                .unwrap_or_else(|| self.engine.presence_entity.clone());
            settings.home_state.clone_from(&ramp.home_state);
            settings.sunrise_entities.clone_from(&ramp.sunrise_entities);
            settings.sunset_entities.clone_from(&ramp.sunset_entities);
            settings.target = ramp.target;
            settings
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homerulesd=info,homerules=info".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            presence_entity: DEFAULT_PRESENCE_ENTITY.to_string(),
            trigger_window_minutes: DEFAULT_TRIGGER_WINDOW_MINUTES,
            trigger_state_max_age_hours: DEFAULT_MAX_AGE_HOURS,
            tick_interval_secs: 60,
            snapshot_ttl_ms: 5000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
