//! REST API Data Transfer Objects
//!
//! Defines request/response types for the REST API endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::handler::HandlerStats;
use crate::protocol::wire::{BundledRows, ScriptRequestHeader};

/// JSON response: { success, data?, error? }
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDto>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiErrorDto {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error details in API response
#[derive(Debug, Serialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

// Script DTOs
/// One script invocation: header first, then the row stream.
#[derive(Debug, Deserialize)]
pub struct EvaluateScriptRequest {
    pub header: ScriptRequestHeader,
    /// Row batches in stream order
    #[serde(default)]
    pub batches: Vec<BundledRows>,
    /// Caller metadata, visible to the service for this call only
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Successful invocation: always exactly one batch.
#[derive(Debug, Serialize)]
pub struct EvaluateScriptResponse {
    pub batches: Vec<BundledRows>,
}

// Admin DTOs
/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Invocation counters
#[derive(Debug, Serialize)]
pub struct MetricsDto {
    pub invocations: u64,
    pub failures: u64,
    pub rows_in: u64,
    pub rows_out: u64,
    pub parse_cache_hits: u64,
    pub parse_cache_misses: u64,
    pub uptime_secs: u64,
}

impl MetricsDto {
    pub fn new(stats: HandlerStats, cache_hits: u64, cache_misses: u64, uptime_secs: u64) -> Self {
        MetricsDto {
            invocations: stats.invocations,
            failures: stats.failures,
            rows_in: stats.rows_in,
            rows_out: stats.rows_out,
            parse_cache_hits: cache_hits,
            parse_cache_misses: cache_misses,
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success_omits_error() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 42}));
    }

    #[test]
    fn test_api_response_error() {
        let json = serde_json::to_value(ApiResponse::<()>::error("UNKNOWN", "boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "UNKNOWN");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_evaluate_request_defaults() {
        let req: EvaluateScriptRequest =
            serde_json::from_str(r#"{"header": {"script": "1 + 1", "returnType": "NUMERIC"}}"#)
                .unwrap();
        assert_eq!(req.header.script, "1 + 1");
        assert!(req.batches.is_empty());
        assert!(req.metadata.is_none());
    }
}
