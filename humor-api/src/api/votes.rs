//! Vote endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store;
use crate::AppState;
use humor_common::models::VoteValue;

const BAD_VOTE: &str = "Bad captionId or vote";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub caption_id: Option<String>,
    #[serde(default)]
    pub vote: Option<Value>,
}

impl VoteRequest {
    /// Caption id and vote, or `ValidationFailed`
    fn validate(&self) -> ApiResult<(&str, VoteValue)> {
        let caption_id = self
            .caption_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let vote = self
            .vote
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(|v| VoteValue::try_from(v).ok());

        match (caption_id, vote) {
            (Some(caption_id), Some(vote)) => Ok((caption_id, vote)),
            _ => Err(ApiError::ValidationFailed(BAD_VOTE.to_string())),
        }
    }
}

/// POST /api/vote
///
/// Input is validated before the store is touched. Votes are appended; a
/// repeat vote by the same user counts again.
pub async fn submit_vote(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let (caption_id, vote) = body.validate()?;

    store::insert_vote(state.store.as_ref(), caption_id, vote, &user.id, Utc::now()).await?;
    Ok(Json(json!({ "ok": true })))
}
