//! Scoreboard endpoints

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::store;
use crate::AppState;
use humor_common::models::RankedEntry;

#[derive(Debug, Serialize)]
pub struct ScoreboardResponse {
    pub entries: Vec<RankedEntry>,
}

/// GET /api/scoreboard
pub async fn get_scoreboard(State(state): State<AppState>) -> ApiResult<Json<ScoreboardResponse>> {
    let entries = store::load_scoreboard(state.store.as_ref(), state.scoreboard_limit).await?;
    Ok(Json(ScoreboardResponse { entries }))
}

/// GET /api/scoreboard/images
///
/// Best caption of each image, images ranked by that caption's score.
pub async fn get_image_scoreboard(
    State(state): State<AppState>,
) -> ApiResult<Json<ScoreboardResponse>> {
    let ranked = store::load_scoreboard(state.store.as_ref(), state.scoreboard_limit).await?;
    Ok(Json(ScoreboardResponse {
        entries: store::best_caption_per_image(&ranked),
    }))
}
