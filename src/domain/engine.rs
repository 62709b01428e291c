use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::ConfigId;

/// A named label pointing at one configuration version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Same as the key in the owning engine's tag map
    pub name: String,

    /// Configuration record this tag resolves to
    pub config_ref: ConfigId,

    #[serde(default)]
    pub is_enabled: bool,
}

impl Tag {
    /// Create a disabled tag for the given configuration record.
    pub fn new(name: impl Into<String>, config_ref: ConfigId) -> Self {
        Tag {
            name: name.into(),
            config_ref,
            is_enabled: false,
        }
    }
}

/// Rule engine aggregate: a set of tagged configurations plus an optional default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEngine {
    pub name: String,

    /// Empty when no default is set
    #[serde(default)]
    pub default_tag: String,

    #[serde(default)]
    pub tags: BTreeMap<String, Tag>,

    pub last_update_time: DateTime<Utc>,

    /// Storage revision observed when the engine was read. Zero for an
    /// engine that has never been persisted.
    #[serde(default)]
    pub revision: u64,
}

impl RuleEngine {
    /// Create an engine with no tags that has not been persisted yet.
    pub fn new(name: impl Into<String>) -> Self {
        RuleEngine {
            name: name.into(),
            default_tag: String::new(),
            tags: BTreeMap::new(),
            last_update_time: Utc::now(),
            revision: 0,
        }
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    pub fn tag_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.tags.get_mut(name)
    }

    pub fn has_default(&self) -> bool {
        !self.default_tag.is_empty()
    }

    pub fn is_default(&self, tag: &str) -> bool {
        self.has_default() && self.default_tag == tag
    }

    /// Identities of every configuration record referenced by this engine.
    pub fn config_refs(&self) -> Vec<ConfigId> {
        self.tags.values().map(|t| t.config_ref).collect()
    }

    /// Advance the update timestamp, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_update_time {
            self.last_update_time = now;
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.revision > 0
    }
}
