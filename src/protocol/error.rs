//! Error types for the script-evaluation protocol.

use serde::{Deserialize, Serialize};

use crate::eval::ScriptError;
use crate::types::{ArgType, ReturnType};

/// Caller-visible status, numbered like gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    #[default]
    Ok,
    Unknown,
    InvalidArgument,
    ResourceExhausted,
    Unimplemented,
    Internal,
}

impl StatusCode {
    /// gRPC numeric code
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Unknown => 2,
            StatusCode::InvalidArgument => 3,
            StatusCode::ResourceExhausted => 8,
            StatusCode::Unimplemented => 12,
            StatusCode::Internal => 13,
        }
    }

    /// Upper-case name used in API error bodies
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script evaluation error type.
///
/// Every variant aborts the in-flight invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptEvalError {
    // Argument Errors
    /// Declared parameter kinds do not resolve to a usable classification
    #[error("Undefined argument type: {classification}{}", detail_suffix(.detail.as_deref()))]
    InvalidArgumentType {
        classification: ArgType,
        detail: Option<String>,
    },

    /// A request row does not carry one dual per declared parameter
    #[error("Row {row} has {got} values, expected {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        got: usize,
    },

    // Evaluation Errors
    /// Fault raised while running the script
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    // Result Errors
    /// Return classification the encoder does not handle
    #[error("Unsupported return type: {return_type}")]
    UnsupportedReturnType { return_type: ReturnType },

    /// Script result does not fit the declared return classification
    #[error("Malformed result: {message}")]
    ResultShape { message: String },

    // Limits
    /// Resource limit exceeded
    #[error("Resource limit exceeded: {resource} (limit: {limit})")]
    ResourceLimitExceeded { resource: String, limit: usize },

    /// Host-side failure outside the script, such as a lost worker task
    #[error("Internal error: {0}")]
    Internal(String),
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(" ({d})")).unwrap_or_default()
}

impl ScriptEvalError {
    pub fn invalid_argument_type(classification: ArgType) -> Self {
        ScriptEvalError::InvalidArgumentType {
            classification,
            detail: None,
        }
    }

    pub fn result_shape(message: impl Into<String>) -> Self {
        ScriptEvalError::ResultShape {
            message: message.into(),
        }
    }

    /// Status reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScriptEvalError::InvalidArgumentType { .. } | ScriptEvalError::RowArity { .. } => {
                StatusCode::InvalidArgument
            }
            ScriptEvalError::UnsupportedReturnType {
                return_type: ReturnType::Dual,
            } => StatusCode::Unimplemented,
            ScriptEvalError::UnsupportedReturnType { .. } => StatusCode::InvalidArgument,
            ScriptEvalError::Script(_) | ScriptEvalError::ResultShape { .. } => {
                StatusCode::Unknown
            }
            ScriptEvalError::ResourceLimitExceeded { .. } => StatusCode::ResourceExhausted,
            ScriptEvalError::Internal(_) => StatusCode::Internal,
        }
    }
}

/// Result type for script evaluation
pub type ScriptEvalResult<T> = Result<T, ScriptEvalError>;
