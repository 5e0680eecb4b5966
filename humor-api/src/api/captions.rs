//! Caption endpoints
//!
//! `POST /api/captions` dispatches on Content-Type: JSON submits one caption,
//! a file (multipart or raw image body) runs the upload-and-caption pipeline.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pipeline::UploadFile;
use crate::store::{self, PersistError, CAPTION_TEXT_CANDIDATES};
use crate::AppState;
use humor_common::models::{Image, NewCaption};

/// Content type assumed when a multipart file part declares none
const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// JSON caption submission; `content` wins over `text` when both are sent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCaptionRequest {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Pipeline result as returned to the caller, captions reduced to unique texts
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_id: String,
    pub cdn_url: String,
    pub captions: Vec<String>,
}

/// Generated captions to persist for one image
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCaptionsRequest {
    pub image_id: String,
    #[serde(default)]
    pub captions: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptionRequestKind {
    Json,
    Multipart,
    RawFile,
}

fn classify_content_type(content_type: &str) -> Option<CaptionRequestKind> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "application/json" {
        Some(CaptionRequestKind::Json)
    } else if mime == "multipart/form-data" {
        Some(CaptionRequestKind::Multipart)
    } else if mime.starts_with("image/") || mime == "application/octet-stream" {
        Some(CaptionRequestKind::RawFile)
    } else {
        None
    }
}

/// POST /api/captions
pub async fn post_captions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    request: Request,
) -> ApiResult<Response> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match classify_content_type(&content_type) {
        Some(CaptionRequestKind::Json) => {
            let payload = Json::<SubmitCaptionRequest>::from_request(request, &state).await;
            submit_caption(&state, &user, payload).await
        }
        Some(CaptionRequestKind::Multipart) => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| ApiError::ValidationFailed(e.body_text()))?;
            let file = read_multipart_file(multipart).await?;
            run_upload(&state, &user, file).await
        }
        Some(CaptionRequestKind::RawFile) => {
            let bytes = Bytes::from_request(request, &state)
                .await
                .map_err(|e| ApiError::ValidationFailed(e.body_text()))?;
            let mime = content_type.split(';').next().unwrap_or_default().trim();
            let file = UploadFile {
                bytes: bytes.to_vec(),
                content_type: mime.to_string(),
                file_name: None,
            };
            run_upload(&state, &user, file).await
        }
        None => Err(ApiError::UnsupportedMediaType(if content_type.is_empty() {
            "(none)".to_string()
        } else {
            content_type
        })),
    }
}

async fn submit_caption(
    state: &AppState,
    user: &AuthUser,
    payload: Result<Json<SubmitCaptionRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload?;
    let text = body.content.or(body.text).unwrap_or_default();
    let caption = NewCaption::new(body.image_id.as_deref().unwrap_or_default(), &text, &user.id)?;

    let (_, row) = store::insert_caption(state.store.as_ref(), &caption).await?;
    Ok(Json(json!({ "ok": true, "caption": row })).into_response())
}

async fn read_multipart_file(mut multipart: Multipart) -> ApiResult<UploadFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ValidationFailed(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
            .to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::ValidationFailed(e.body_text()))?;

        if bytes.is_empty() {
            break;
        }
        return Ok(UploadFile {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        });
    }

    Err(ApiError::ValidationFailed("Missing file".to_string()))
}

async fn run_upload(state: &AppState, user: &AuthUser, file: UploadFile) -> ApiResult<Response> {
    if file.bytes.is_empty() {
        return Err(ApiError::ValidationFailed("Missing file".to_string()));
    }
    info!(
        user = %user.id,
        content_type = %file.content_type,
        bytes = file.bytes.len(),
        "Starting caption pipeline"
    );

    let result = state.pipeline.run(&user.access_token, &file).await?;

    // Local row so captions saved later can reference the remote image id
    let image = Image {
        id: result.image_id.clone(),
        url: result.cdn_url.clone(),
        description: None,
    };
    store::record_image(state.store.as_ref(), &image).await?;

    Ok(Json(UploadResponse {
        captions: extract_caption_texts(&result.captions),
        image_id: result.image_id,
        cdn_url: result.cdn_url,
    })
    .into_response())
}

/// POST /api/captions/batch
///
/// Saves captions one at a time and stops at the first failure; the error
/// detail reports how many were saved before it.
pub async fn save_caption_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<BatchCaptionsRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let texts = extract_caption_texts(&body.captions);
    if texts.is_empty() {
        return Err(ApiError::ValidationFailed("No captions to save".to_string()));
    }

    let mut saved = 0usize;
    for text in &texts {
        let caption = NewCaption::new(&body.image_id, text, &user.id)?;
        match store::insert_caption(state.store.as_ref(), &caption).await {
            Ok(_) => saved += 1,
            Err(PersistError::Store(e)) => {
                warn!(image_id = %body.image_id, saved, "Batch caption save stopped: {}", e);
                return Err(ApiError::PersistenceFailed {
                    message: e.message().to_string(),
                    detail: Some(json!({ "saved": saved, "total": texts.len() })),
                });
            }
            Err(other) => return Err(other.into()),
        }
    }

    info!(image_id = %body.image_id, saved, "Batch captions saved");
    Ok(Json(json!({ "ok": true, "saved": saved })))
}

/// Unique caption texts from a generated caption list
///
/// Entries are strings, or objects carrying the text under one of the caption
/// text column names. Texts are trimmed, empties dropped, and duplicates
/// removed keeping the first occurrence.
pub fn extract_caption_texts(captions: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();

    captions
        .iter()
        .filter_map(|caption| match caption {
            Value::String(s) => Some(s.as_str()),
            Value::Object(object) => CAPTION_TEXT_CANDIDATES
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .filter(|text| seen.insert(text.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_dispatch() {
        assert_eq!(
            classify_content_type("application/json; charset=utf-8"),
            Some(CaptionRequestKind::Json)
        );
        assert_eq!(
            classify_content_type("multipart/form-data; boundary=xyz"),
            Some(CaptionRequestKind::Multipart)
        );
        assert_eq!(classify_content_type("image/png"), Some(CaptionRequestKind::RawFile));
        assert_eq!(
            classify_content_type("application/octet-stream"),
            Some(CaptionRequestKind::RawFile)
        );
        assert_eq!(classify_content_type("text/plain"), None);
        assert_eq!(classify_content_type(""), None);
    }

    #[test]
    fn test_extract_dedups_preserving_first_occurrence() {
        let captions = vec![json!("funny"), json!(" funny "), json!("other"), json!("funny")];
        assert_eq!(extract_caption_texts(&captions), vec!["funny", "other"]);
    }

    #[test]
    fn test_extract_reads_known_object_fields() {
        let captions = vec![
            json!({"id": 1, "content": "from content"}),
            json!({"text": "from text", "content": "ignored"}),
            json!({"body": "from body"}),
            json!({"caption": "  "}),
            json!({"score": 3}),
            json!(42),
        ];
        assert_eq!(
            extract_caption_texts(&captions),
            vec!["from content", "from text", "from body"]
        );
    }
}
