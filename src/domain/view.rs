use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::EngineConfig;

/// Read view of a rule engine with every tag's configuration resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRuleEngine {
    pub name: String,
    pub default_tag: String,
    pub tags: BTreeMap<String, TagView>,
}

/// Resolved state of a single tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagView {
    pub is_enabled: bool,
    pub config: EngineConfig,
}
