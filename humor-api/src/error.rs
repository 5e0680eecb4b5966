//! Error types for humor-api
//!
//! Every failure leaves the service as `{"error": .., "code": ..}` with the
//! failing pipeline step and upstream diagnostic attached when known.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::SessionError;
use crate::pipeline::{PipelineError, PipelineStep};
use crate::store::PersistError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or rejected bearer credential (401)
    #[error("Unauthorized")]
    AuthRequired,

    /// Invalid request (400)
    #[error("{0}")]
    ValidationFailed(String),

    /// Content type the upload endpoint does not handle (415)
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// A remote dependency failed or answered unusably
    #[error("{message}")]
    UpstreamUnavailable {
        step: &'static str,
        status: StatusCode,
        message: String,
        detail: Value,
    },

    /// Presign response matched no known shape (500)
    #[error("Unknown presigned shape (missing presignedUrl OR uploadUrl OR {{url,fields}})")]
    ShapeUnrecognized { payload: Value },

    /// Column roles could not be inferred (500)
    #[error("Could not infer {table} columns")]
    SchemaInferenceFailed { table: String, observed: Vec<String> },

    /// Store rejected a read or write (500)
    #[error("{message}")]
    PersistenceFailed { message: String, detail: Option<Value> },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UpstreamUnavailable { status, .. } => *status,
            ApiError::ShapeUnrecognized { .. }
            | ApiError::SchemaInferenceFailed { .. }
            | ApiError::PersistenceFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AuthRequired => "AUTH_REQUIRED",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            ApiError::ShapeUnrecognized { .. } => "SHAPE_UNRECOGNIZED",
            ApiError::SchemaInferenceFailed { .. } => "SCHEMA_INFERENCE_FAILED",
            ApiError::PersistenceFailed { .. } => "PERSISTENCE_FAILED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        match self {
            ApiError::UpstreamUnavailable { step, detail, .. } => {
                body["step"] = json!(step);
                body["detail"] = detail;
            }
            ApiError::ShapeUnrecognized { payload } => {
                body["step"] = json!(PipelineStep::Presign.as_str());
                body["detail"] = payload;
            }
            ApiError::SchemaInferenceFailed { table, observed } => {
                body["detail"] = json!({ "table": table, "observed": observed });
            }
            ApiError::PersistenceFailed {
                detail: Some(detail),
                ..
            } => {
                body["detail"] = detail;
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.step().failure_message().to_string();
        match err {
            PipelineError::Upstream {
                step,
                status,
                detail,
            } => ApiError::UpstreamUnavailable {
                step: step.as_str(),
                status: upstream_status(step, status),
                message,
                detail,
            },
            PipelineError::ShapeUnrecognized { payload } => ApiError::ShapeUnrecognized { payload },
        }
    }
}

/// Status reported for a failed pipeline step
///
/// Upstream error statuses pass through. A response that arrived but was
/// unusable is a 500, and one that never arrived is a 502. Object-storage
/// failures are always 500.
fn upstream_status(step: PipelineStep, status: Option<u16>) -> StatusCode {
    match (step, status) {
        (PipelineStep::Upload, _) => StatusCode::INTERNAL_SERVER_ERROR,
        (_, None) => StatusCode::BAD_GATEWAY,
        (_, Some(code)) if code >= 400 => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        (_, Some(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::SchemaInference { table, observed } => {
                ApiError::SchemaInferenceFailed { table, observed }
            }
            PersistError::Store(e) => ApiError::PersistenceFailed {
                message: e.message().to_string(),
                detail: None,
            },
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::UpstreamUnavailable {
            step: "session",
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
            detail: Value::Null,
        }
    }
}

impl From<humor_common::Error> for ApiError {
    fn from(err: humor_common::Error) -> Self {
        match err {
            humor_common::Error::InvalidInput(msg) => ApiError::ValidationFailed(msg),
            other => ApiError::PersistenceFailed {
                message: other.to_string(),
                detail: None,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationFailed(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
