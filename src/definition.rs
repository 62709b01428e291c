//! Validation of configuration payloads before they are stored.
//!
//! The store treats payloads as opaque. Whatever understands the rules
//! format plugs in here through [`ConfigValidator`].

use serde_json::Value;

use crate::domain::EngineConfig;

/// Checks a configuration payload before it is accepted.
pub trait ConfigValidator: Send + Sync {
    /// Returns a human-readable reason when the payload is rejected.
    fn validate(&self, config: &EngineConfig) -> Result<(), String>;
}

/// Structural checks on the rules definition format.
///
/// A payload must be a JSON object with a non-empty `rules` map whose
/// entries are objects. An optional `fields` map declares field types as
/// strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        StructuralValidator
    }
}

impl ConfigValidator for StructuralValidator {
    fn validate(&self, config: &EngineConfig) -> Result<(), String> {
        let Value::Object(root) = config.as_value() else {
            return Err("configuration must be a JSON object".to_string());
        };

        if let Some(fields) = root.get("fields") {
            let Value::Object(fields) = fields else {
                return Err("fields must be an object".to_string());
            };
            for (name, kind) in fields {
                if !kind.is_string() {
                    return Err(format!("field {name:?} must declare its type as a string"));
                }
            }
        }

        let rules = match root.get("rules") {
            Some(Value::Object(rules)) => rules,
            Some(_) => return Err("rules must be an object keyed by rule name".to_string()),
            None => return Err("rules are missing".to_string()),
        };

        if rules.is_empty() {
            return Err("at least one rule is required".to_string());
        }

        for (name, rule) in rules {
            if name.is_empty() {
                return Err("rule names cannot be empty".to_string());
            }
            if !rule.is_object() {
                return Err(format!("rule {name:?} must be an object"));
            }
        }

        Ok(())
    }
}
