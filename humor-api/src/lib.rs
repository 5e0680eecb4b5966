//! humor-api library - caption upload, voting and scoreboard service
//!
//! Exposes the router and its building blocks for the binary and for
//! integration testing.

pub mod api;
pub mod auth;
pub mod error;
pub mod pipeline;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::SessionVerifier;
use crate::pipeline::CaptionPipeline;
use crate::store::RowStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Relational store (images, captions, caption_votes)
    pub store: Arc<dyn RowStore>,
    /// Upload-and-caption pipeline
    pub pipeline: Arc<CaptionPipeline>,
    /// Bearer token verification
    pub sessions: Arc<dyn SessionVerifier>,
    /// Maximum joined vote rows read per scoreboard request
    pub scoreboard_limit: usize,
    /// Maximum accepted request body
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RowStore>,
        pipeline: CaptionPipeline,
        sessions: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            sessions,
            scoreboard_limit: humor_common::config::DEFAULT_SCOREBOARD_LIMIT,
            max_upload_bytes: humor_common::config::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_limits(mut self, scoreboard_limit: usize, max_upload_bytes: usize) -> Self {
        self.scoreboard_limit = scoreboard_limit;
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/captions", post(api::post_captions))
        .route("/api/captions/batch", post(api::save_caption_batch))
        .route("/api/vote", post(api::submit_vote))
        .route("/api/pipeline/presign", post(api::proxy_presign))
        .route("/api/images", get(api::list_images))
        .route("/api/scoreboard", get(api::get_scoreboard))
        .route("/api/scoreboard/images", get(api::get_image_scoreboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
