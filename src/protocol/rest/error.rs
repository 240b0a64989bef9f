//! REST API Error Types
//!
//! Provides error types and conversions for the REST API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::protocol::error::{self as protocol_error, ScriptEvalError};

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL", message)
    }
}

/// REST API error that can be returned from handlers
#[derive(Debug)]
pub struct RestError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl RestError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: ApiError::new("UNAUTHENTICATED", message),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::internal(message),
        }
    }

    /// Error carrying a caller status and details from a failed invocation.
    pub fn from_status(code: protocol_error::StatusCode, details: impl Into<String>) -> Self {
        Self {
            status: http_status(code),
            error: ApiError::new(code.as_str(), details),
        }
    }
}

/// HTTP status for a caller status code
pub fn http_status(code: protocol_error::StatusCode) -> StatusCode {
    use protocol_error::StatusCode as Status;
    match code {
        Status::Ok => StatusCode::OK,
        Status::InvalidArgument => StatusCode::BAD_REQUEST,
        Status::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Status::Unknown => StatusCode::UNPROCESSABLE_ENTITY,
        Status::ResourceExhausted => StatusCode::PAYLOAD_TOO_LARGE,
        Status::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.error
        }));
        (self.status, body).into_response()
    }
}

// Conversions from domain errors
impl From<ScriptEvalError> for RestError {
    fn from(err: ScriptEvalError) -> Self {
        RestError::from_status(err.status_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReturnType;

    #[test]
    fn test_status_mapping() {
        use protocol_error::StatusCode as Status;
        assert_eq!(http_status(Status::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(Status::Unimplemented), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(http_status(Status::Unknown), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(http_status(Status::ResourceExhausted), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(http_status(Status::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_script_eval_error() {
        let err = RestError::from(ScriptEvalError::UnsupportedReturnType {
            return_type: ReturnType::Dual,
        });
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.error.code, "UNIMPLEMENTED");
    }

    #[test]
    fn test_into_response_status() {
        let resp = RestError::unauthorized("nope").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
