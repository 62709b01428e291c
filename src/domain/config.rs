use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a stored configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub Uuid);

impl ConfigId {
    /// Generate a fresh identity.
    pub fn new() -> Self {
        ConfigId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rule engine configuration payload.
///
/// The structure belongs to the rules library; the store keeps it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineConfig(pub serde_json::Value);

impl EngineConfig {
    pub fn new(value: serde_json::Value) -> Self {
        EngineConfig(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for EngineConfig {
    fn from(value: serde_json::Value) -> Self {
        EngineConfig(value)
    }
}
