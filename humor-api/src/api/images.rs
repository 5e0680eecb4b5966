//! Image listing endpoint

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;
use humor_common::db::IMAGES_TABLE;
use humor_common::models::Image;

const DEFAULT_LIMIT: usize = 24;
const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<Image>,
}

/// GET /api/images?limit=N
///
/// Rows without an id or url are left out.
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListImagesQuery>,
) -> ApiResult<Json<ListImagesResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let rows = state
        .store
        .list_rows(IMAGES_TABLE, limit)
        .await
        .map_err(crate::store::PersistError::from)?;

    Ok(Json(ListImagesResponse {
        images: rows.iter().filter_map(Image::from_row).collect(),
    }))
}
