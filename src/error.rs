use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Result alias for store and service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a store operation can surface to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid rule engine name: {0:?}")]
    InvalidName(String),

    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),

    #[error("invalid rule engine configuration: {0}")]
    InvalidConfiguration(String),

    #[error("rule engine {0:?} not found")]
    NotFound(String),

    #[error("tag {tag:?} not found in rule engine {engine:?}")]
    TagNotFound { engine: String, tag: String },

    #[error("tag {tag:?} already exists in rule engine {engine:?}")]
    TagAlreadyExists { engine: String, tag: String },

    #[error("tag {tag:?} in rule engine {engine:?} is enabled and cannot be deleted")]
    TagDeleteNotAllowed { engine: String, tag: String },

    #[error("tag {tag:?} is the default of rule engine {engine:?} and cannot be disabled")]
    TagDisableNotAllowed { engine: String, tag: String },

    #[error("default tag {tag:?} of rule engine {engine:?} must exist and be enabled")]
    DefaultTagInvalid { engine: String, tag: String },

    #[error("datastore failure: {0}")]
    DatastoreFailed(String),
}

impl Error {
    /// Wrap a storage-layer failure.
    pub fn datastore(context: impl Into<String>) -> Self {
        Error::DatastoreFailed(context.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidName(_) => ErrorCode::InvalidRuleEngineName,
            Error::InvalidTag(_) => ErrorCode::InvalidTagName,
            Error::InvalidConfiguration(_) => ErrorCode::InvalidRuleEngineConfig,
            Error::NotFound(_) => ErrorCode::RuleEngineNotFound,
            Error::TagNotFound { .. } => ErrorCode::TagNotFound,
            Error::TagAlreadyExists { .. } => ErrorCode::TagAlreadyExist,
            Error::TagDeleteNotAllowed { .. } => ErrorCode::TagDeleteNotAllowed,
            Error::TagDisableNotAllowed { .. } => ErrorCode::TagDisableNotAllowed,
            Error::DefaultTagInvalid { .. } => ErrorCode::DefaultTagExistAndMustBeEnabled,
            Error::DatastoreFailed(_) => ErrorCode::DatastoreFailed,
        }
    }

    /// True for failures caused by the request rather than the datastore.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::DatastoreFailed(_))
    }

    /// Detail suitable for showing to API clients.
    ///
    /// Datastore failures carry internal context that stays in the logs.
    pub fn public_detail(&self) -> String {
        match self {
            Error::DatastoreFailed(_) => String::new(),
            Error::InvalidConfiguration(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Stable numeric error codes exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    ParsingFailed = 1,
    InvalidRuleEngineName = 2,
    InvalidTagName = 3,
    InvalidRuleEngineConfig = 4,
    DatastoreFailed = 5,
    RuleEngineNotFound = 6,
    TagNotFound = 7,
    TagDeleteNotAllowed = 8,
    TagDisableNotAllowed = 9,
    DefaultTagExistAndMustBeEnabled = 10,
    TagAlreadyExist = 11,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ParsingFailed => "Parsing failed",
            ErrorCode::InvalidRuleEngineName => {
                "Invalid ruleEngineName. alphanumeric([a-z][A-Z][0-9]) and maximum 30 characters allowed"
            }
            ErrorCode::InvalidTagName => {
                "Invalid tag. alphanumeric([a-z][A-Z][0-9]) and maximum 30 characters allowed"
            }
            ErrorCode::InvalidRuleEngineConfig => "RuleEngineConfig is invalid",
            ErrorCode::DatastoreFailed => "Internal datastore failure",
            ErrorCode::RuleEngineNotFound => "RuleEngine not found",
            ErrorCode::TagNotFound => "Tag not found",
            ErrorCode::TagDeleteNotAllowed => {
                "Could not delete tag, either set as default or enabled"
            }
            ErrorCode::TagDisableNotAllowed => "Could not disable default tag",
            ErrorCode::DefaultTagExistAndMustBeEnabled => {
                "Could not set defaultTag, either not found or not enabled"
            }
            ErrorCode::TagAlreadyExist => "Tag already exist",
        }
    }

    /// True for codes that report a missing engine or tag.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorCode::RuleEngineNotFound | ErrorCode::TagNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}
