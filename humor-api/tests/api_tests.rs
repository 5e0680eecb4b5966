//! Integration tests for humor-api HTTP endpoints
//!
//! Tests cover:
//! - Bearer authentication on /api routes, /health public
//! - Caption submission (JSON) and content-type dispatch
//! - Vote validation and schema-inferred vote inserts
//! - Scoreboard ranking, image listing and batch caption save

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use humor_api::auth::{SessionError, SessionVerifier};
use humor_api::pipeline::{CaptionPipeline, CaptionServiceClient};
use humor_api::store::{Row, RowStore, SqliteRowStore};
use humor_api::{build_router, AppState};
use humor_common::db::init_memory_database;

const TOKEN: &str = "test-token";
const USER_ID: &str = "user-1";

/// Accepts exactly one token
struct StaticSessions;

#[async_trait]
impl SessionVerifier for StaticSessions {
    async fn verify(&self, token: &str) -> Result<Option<String>, SessionError> {
        Ok((token == TOKEN).then(|| USER_ID.to_string()))
    }
}

/// Test helper: app over a fresh in-memory database
///
/// The caption service points at a closed port; tests here never reach it.
async fn setup_app() -> (axum::Router, Arc<SqliteRowStore>) {
    let pool = init_memory_database().await.unwrap();
    let store = Arc::new(SqliteRowStore::new(pool));
    let pipeline = CaptionPipeline::new(CaptionServiceClient::new(
        reqwest::Client::new(),
        "http://127.0.0.1:9",
    ));
    let state = AppState::new(store.clone(), pipeline, Arc::new(StaticSessions));
    (build_router(state), store)
}

fn row(value: Value) -> Row {
    value.as_object().unwrap().clone()
}

/// Test helper: image, two captions and the given votes
async fn seed(store: &SqliteRowStore, votes: &[(&str, i64)]) {
    store
        .insert_row("images", &row(json!({"id": "img_1", "url": "https://cdn/1.png"})))
        .await
        .unwrap();
    store
        .insert_row("images", &row(json!({"id": "img_2", "url": "https://cdn/2.png"})))
        .await
        .unwrap();
    for (id, image) in [("c1", "img_1"), ("c2", "img_1"), ("c3", "img_2")] {
        store
            .insert_row(
                "captions",
                &row(json!({
                    "id": id,
                    "image_id": image,
                    "content": format!("caption {}", id),
                    "profile_id": "author",
                })),
            )
            .await
            .unwrap();
    }
    for (caption, value) in votes {
        store
            .insert_row(
                "caption_votes",
                &row(json!({
                    "caption_id": caption,
                    "vote_value": value,
                    "profile_id": "voter",
                    "created_datetime_utc": "2026-01-01T00:00:00.000Z",
                })),
            )
            .await
            .unwrap();
    }
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    authed(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _) = setup_app().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "humor-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = setup_app().await;

    let request = Request::builder()
        .uri("/api/scoreboard")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let (app, _) = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/vote")
        .header(header::AUTHORIZATION, "Bearer someone-else")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"captionId": "c1", "vote": 1}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Captions
// =============================================================================

#[tokio::test]
async fn test_submit_caption_uses_first_accepted_text_column() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let request = json_request(
        "POST",
        "/api/captions",
        json!({"imageId": "img_1", "content": "  a new caption  "}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["caption"]["content"], "a new caption");
    assert_eq!(body["caption"]["profile_id"], USER_ID);
    assert_eq!(body["caption"]["is_public"], 1);
}

#[tokio::test]
async fn test_submit_caption_accepts_text_field() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let request = json_request("POST", "/api/captions", json!({"imageId": "img_2", "text": "hi"}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["caption"]["content"], "hi");
}

#[tokio::test]
async fn test_submit_caption_blank_content_rejected() {
    let (app, _) = setup_app().await;

    let request = json_request("POST", "/api/captions", json!({"imageId": "img_1", "content": "   "}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Missing imageId or content");
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_submit_caption_unknown_image_is_persistence_failure() {
    let (app, _) = setup_app().await;

    let request = json_request("POST", "/api/captions", json!({"imageId": "nope", "content": "x"}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "PERSISTENCE_FAILED");
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let (app, _) = setup_app().await;

    let request = authed("POST", "/api/captions")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_multipart_without_file_rejected() {
    let (app, _) = setup_app().await;

    let body = "--XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"note\"\r\n\r\n\
                hello\r\n\
                --XBOUNDARY--\r\n";
    let request = authed("POST", "/api/captions")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Missing file");
}

#[tokio::test]
async fn test_batch_save_dedups_captions() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let request = json_request(
        "POST",
        "/api/captions/batch",
        json!({"imageId": "img_2", "captions": ["funny", {"text": "funny"}, {"content": "other"}]}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["saved"], 2);
    assert_eq!(store.list_rows("captions", 100).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_batch_save_reports_saved_count_on_failure() {
    let (app, _) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/captions/batch",
        json!({"imageId": "missing", "captions": ["a", "b"]}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["detail"]["saved"], 0);
    assert_eq!(body["detail"]["total"], 2);
}

// =============================================================================
// Votes
// =============================================================================

#[tokio::test]
async fn test_invalid_vote_rejected_before_store_access() {
    let (app, _) = setup_app().await;

    // Empty votes table: any store access would fail schema inference (500)
    for body in [
        json!({"captionId": "c1", "vote": 0}),
        json!({"captionId": "", "vote": 1}),
        json!({"vote": 1}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/vote", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"], "Bad captionId or vote");
    }
}

#[tokio::test]
async fn test_first_vote_on_fresh_database_reaches_scoreboard() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let request = json_request("POST", "/api/vote", json!({"captionId": "c1", "vote": 1}));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let votes = store.list_rows("caption_votes", 10).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["caption_id"], "c1");
    assert_eq!(votes[0]["vote_value"], 1);

    let response = app
        .oneshot(authed("GET", "/api/scoreboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["entries"][0]["captionId"], "c1");
    assert_eq!(body["entries"][0]["score"], 1);
}

#[tokio::test]
async fn test_vote_recorded_with_inferred_columns() {
    let (app, store) = setup_app().await;
    seed(&store, &[("c3", 1)]).await;

    let request = json_request("POST", "/api/vote", json!({"captionId": "c2", "vote": -1}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ok"], true);

    let votes = store.list_rows("caption_votes", 10).await.unwrap();
    assert_eq!(votes.len(), 2);
    let vote = &votes[1];
    assert_eq!(vote["caption_id"], "c2");
    assert_eq!(vote["vote_value"], -1);
    assert_eq!(vote["profile_id"], USER_ID);
    assert!(vote["created_datetime_utc"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_repeat_votes_accumulate() {
    let (app, store) = setup_app().await;
    seed(&store, &[("c1", 1)]).await;

    for _ in 0..2 {
        let request = json_request("POST", "/api/vote", json!({"captionId": "c1", "vote": 1}));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(authed("GET", "/api/scoreboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["entries"][0]["captionId"], "c1");
    assert_eq!(body["entries"][0]["score"], 3);
}

// =============================================================================
// Scoreboard and images
// =============================================================================

#[tokio::test]
async fn test_scoreboard_empty_without_votes() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let response = app
        .oneshot(authed("GET", "/api/scoreboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["entries"], json!([]));
}

#[tokio::test]
async fn test_scoreboard_ranks_by_vote_sum() {
    let (app, store) = setup_app().await;
    seed(&store, &[("c1", 1), ("c1", 1), ("c1", -1), ("c2", 1)]).await;

    let response = app
        .oneshot(authed("GET", "/api/scoreboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["captionId"], "c1");
    assert_eq!(entries[0]["score"], 1);
    assert_eq!(entries[0]["imageUrl"], "https://cdn/1.png");
    assert_eq!(entries[0]["captionText"], "caption c1");
    assert_eq!(entries[1]["captionId"], "c2");
    assert_eq!(entries[1]["score"], 1);
}

#[tokio::test]
async fn test_image_scoreboard_picks_best_caption() {
    let (app, store) = setup_app().await;
    seed(&store, &[("c1", -1), ("c2", 1), ("c2", 1), ("c3", 1)]).await;

    let response = app
        .oneshot(authed("GET", "/api/scoreboard/images").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = extract_json(response.into_body()).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["imageId"], "img_1");
    assert_eq!(entries[0]["captionId"], "c2");
    assert_eq!(entries[1]["imageId"], "img_2");
}

#[tokio::test]
async fn test_list_images_respects_limit() {
    let (app, store) = setup_app().await;
    seed(&store, &[]).await;

    let response = app
        .oneshot(authed("GET", "/api/images?limit=1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert!(images[0]["url"].as_str().unwrap().starts_with("https://cdn/"));
}
