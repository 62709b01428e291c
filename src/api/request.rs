use serde::Deserialize;

use crate::domain::EngineConfig;

use super::response::ApiError;

/// Path parameters naming a rule engine.
#[derive(Debug, Deserialize)]
pub struct EnginePath {
    pub name: String,
}

/// Path parameters naming a tag within a rule engine.
#[derive(Debug, Deserialize)]
pub struct TagPath {
    pub name: String,
    pub tag: String,
}

/// Parse a request body into a configuration payload.
pub fn parse_config(body: &[u8]) -> Result<EngineConfig, ApiError> {
    serde_json::from_slice::<serde_json::Value>(body)
        .map(EngineConfig::from)
        .map_err(|e| ApiError::Parsing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_body() {
        let config = parse_config(br#"{"rules": {"r1": {}}}"#).unwrap();
        assert_eq!(config.as_value(), &json!({"rules": {"r1": {}}}));
    }

    #[test]
    fn test_parse_invalid_body() {
        let err = parse_config(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::Parsing(_)));
    }
}
