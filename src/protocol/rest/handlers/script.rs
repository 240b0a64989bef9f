//! Script Handlers
//!
//! One POST carries a whole invocation: the header and every row batch.

use std::sync::Arc;

use axum::{Extension, Json};
use tracing::debug;

use crate::protocol::rest::dto::{ApiResponse, EvaluateScriptRequest, EvaluateScriptResponse};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Evaluate a script over the posted row batches
pub async fn evaluate_script(
    Extension(handler): Extension<Arc<Handler>>,
    Json(request): Json<EvaluateScriptRequest>,
) -> Result<Json<ApiResponse<EvaluateScriptResponse>>, RestError> {
    debug!(
        batches = request.batches.len(),
        params = request.header.params.len(),
        "http_evaluate_script"
    );
    let metadata = request.metadata.unwrap_or_default();
    let (outcome, ctx) = handler
        .evaluate(request.header, request.batches, metadata)
        .await;

    match outcome {
        Ok(batch) => Ok(Json(ApiResponse::success(EvaluateScriptResponse {
            batches: vec![batch],
        }))),
        Err(e) => Err(RestError::from_status(
            ctx.code(),
            ctx.details().map_or_else(|| e.to_string(), str::to_string),
        )),
    }
}
