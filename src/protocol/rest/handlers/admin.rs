//! Admin Handlers
//!
//! Health check and metrics endpoints.

use std::sync::Arc;

use axum::{Extension, Json};

use crate::protocol::rest::dto::{ApiResponse, HealthDto, MetricsDto};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Health check endpoint
pub async fn health(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<HealthDto>>, RestError> {
    let health = HealthDto {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: handler.uptime_seconds(),
    };

    Ok(Json(ApiResponse::success(health)))
}

/// Liveness check
pub async fn liveness() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("alive"))
}

/// Invocation counters and parse cache statistics
pub async fn stats(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<MetricsDto>>, RestError> {
    let cache = handler.service().evaluator().cache_stats();
    let metrics = MetricsDto::new(
        handler.stats(),
        cache.hits,
        cache.misses,
        handler.uptime_seconds(),
    );

    Ok(Json(ApiResponse::success(metrics)))
}
