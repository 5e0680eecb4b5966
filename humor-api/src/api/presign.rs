//! Presign proxy

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pipeline::PipelineStep;
use crate::AppState;

/// POST /api/pipeline/presign
///
/// Forwards the body to the presign endpoint with the caller's credential and
/// relays the upstream status and JSON unchanged.
pub async fn proxy_presign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;

    let response = state
        .pipeline
        .client()
        .forward_presign(&user.access_token, &body)
        .await
        .map_err(|e| ApiError::UpstreamUnavailable {
            step: PipelineStep::Presign.as_str(),
            status: StatusCode::BAD_GATEWAY,
            message: PipelineStep::Presign.failure_message().to_string(),
            detail: Value::String(e.to_string()),
        })?;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(response.body)).into_response())
}
