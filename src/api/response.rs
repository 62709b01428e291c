use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{Error, ErrorCode};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub err_code: ErrorCode,
    pub err_msg: String,
    pub other_msg: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, other_msg: impl Into<String>) -> Self {
        ErrorResponse {
            err_code: code,
            err_msg: code.message().to_string(),
            other_msg: other_msg.into(),
        }
    }
}

/// Failure of an API request.
#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be parsed
    Parsing(String),
    Store(Error),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Parsing(_) => ErrorCode::ParsingFailed,
            ApiError::Store(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        let code = self.code();
        if code.is_not_found() {
            return StatusCode::NOT_FOUND;
        }
        match code {
            ErrorCode::ParsingFailed
            | ErrorCode::InvalidRuleEngineName
            | ErrorCode::InvalidTagName
            | ErrorCode::InvalidRuleEngineConfig
            | ErrorCode::TagDeleteNotAllowed
            | ErrorCode::TagDisableNotAllowed
            | ErrorCode::DefaultTagExistAndMustBeEnabled
            | ErrorCode::TagAlreadyExist => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let other_msg = match &self {
            ApiError::Parsing(detail) => detail.clone(),
            ApiError::Store(e) => e.public_detail(),
        };

        (status, Json(ErrorResponse::new(self.code(), other_msg))).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub datastore: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_error(f: fn(String, String) -> Error) -> ApiError {
        ApiError::Store(f("billing".to_string(), "v1".to_string()))
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Store(Error::NotFound("billing".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            tag_error(|engine, tag| Error::TagNotFound { engine, tag }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Parsing("eof".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Store(Error::InvalidConfiguration("rules".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            tag_error(|engine, tag| Error::TagDisableNotAllowed { engine, tag }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            tag_error(|engine, tag| Error::DefaultTagInvalid { engine, tag }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Store(Error::datastore("down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = ErrorResponse::new(ErrorCode::TagNotFound, "tag \"v9\" not found");

        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["errCode"], 7);
        assert_eq!(json["errMsg"], "Tag not found");
        assert_eq!(json["otherMsg"], "tag \"v9\" not found");
    }
}
