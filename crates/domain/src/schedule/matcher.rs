//! Compiled entity matchers and tag tables.
//!
//! Patterns are compiled once per evaluation cycle, never per entity.

use std::collections::BTreeMap;

use regex::Regex;

use super::{EntityMatch, StateOverrides};
use crate::entity::Domain;
use crate::error::PatternError;

/// Prefix marking an entity match as a regular expression.
pub const REGEX_PREFIX: &str = "regex:";

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError {
        pattern: pattern.to_string(),
        source,
    })
}

/// A compiled entity pattern with optional per-entity overrides.
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    pattern: Regex,
    exact: Option<String>,
    pub states: StateOverrides,
}

impl EntityMatcher {
    /// Match exactly one entity id.
    ///
    /// # Errors
    ///
    /// Never fails in practice; escaped ids always compile.
    pub fn exact(entity_id: &str, states: StateOverrides) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: compile(&format!("^{}$", regex::escape(entity_id)))?,
            exact: Some(entity_id.to_string()),
            states,
        })
    }

    /// Match entity ids by an unanchored regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the expression does not compile.
    pub fn regex(pattern: &str, states: StateOverrides) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: compile(pattern)?,
            exact: None,
            states,
        })
    }

    /// Parse an authored id: `regex:` prefixed strings are expressions,
    /// anything else is an exact id.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when a `regex:` expression does not compile.
    pub fn parse(raw: &str, states: StateOverrides) -> Result<Self, PatternError> {
        match raw.strip_prefix(REGEX_PREFIX) {
            Some(pattern) => Self::regex(pattern, states),
            None => Self::exact(raw, states),
        }
    }

    /// Compile every authored match, skipping empty ids.
    ///
    /// # Errors
    ///
    /// Returns the first [`PatternError`] encountered.
    pub fn compile_all(matches: &[EntityMatch]) -> Result<Vec<Self>, PatternError> {
        let mut compiled = Vec::new();
        for item in matches {
            match item {
                EntityMatch::Id(raw) if raw.is_empty() => {}
                EntityMatch::Id(raw) => compiled.push(Self::parse(raw, StateOverrides::default())?),
                EntityMatch::Config { entity_id, states } => {
                    for raw in entity_id.iter().filter(|raw| !raw.is_empty()) {
                        compiled.push(Self::parse(raw, states.clone())?);
                    }
                }
            }
        }
        Ok(compiled)
    }

    #[must_use]
    pub fn is_match(&self, entity_id: &str) -> bool {
        self.pattern.is_match(entity_id)
    }

    /// The entity id when this matcher targets exactly one entity.
    #[must_use]
    pub fn exact_id(&self) -> Option<&str> {
        self.exact.as_deref()
    }

    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Compiled `tag → patterns` table.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: BTreeMap<String, Vec<Regex>>,
}

impl TagTable {
    /// Compile every pattern of every tag.
    ///
    /// # Errors
    ///
    /// Returns the first [`PatternError`] encountered.
    pub fn compile(definitions: &BTreeMap<String, Vec<String>>) -> Result<Self, PatternError> {
        let mut tags = BTreeMap::new();
        for (tag, patterns) in definitions {
            let compiled = patterns
                .iter()
                .map(|pattern| compile(pattern))
                .collect::<Result<Vec<_>, _>>()?;
            tags.insert(tag.clone(), compiled);
        }
        Ok(Self { tags })
    }

    /// Whether the entity is covered by one of `tags`. Only controllable
    /// domains can be matched by tag.
    #[must_use]
    pub fn matches(&self, entity_id: &str, tags: &[String]) -> bool {
        if tags.is_empty() || !Domain::from_entity_id(entity_id).is_controllable() {
            return false;
        }
        tags.iter()
            .filter_map(|tag| self.tags.get(tag))
            .flatten()
            .any(|pattern| pattern.is_match(entity_id))
    }

    /// Every pattern of every tag.
    pub fn patterns(&self) -> impl Iterator<Item = &Regex> {
        self.tags.values().flatten()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
