//! Caption-generation service client
//!
//! Every call forwards the caller's bearer credential; the service has no
//! credential of its own. Response bodies that are not JSON are read as `{}`.

use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("humor-api/", env!("CARGO_PKG_VERSION"));

const PRESIGN_PATH: &str = "/pipeline/generate-presigned-url";
const REGISTER_PATH: &str = "/pipeline/upload-image-from-url";
const CAPTIONS_PATH: &str = "/pipeline/generate-captions";

/// Transport-level failure (no HTTP response was received)
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
}

/// Status and JSON body of a completed remote call
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Build the shared outbound HTTP client
///
/// The timeout applies uniformly to remote calls and object-storage uploads.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Network(e.to_string()))
}

/// Client for the remote caption pipeline endpoints
#[derive(Debug, Clone)]
pub struct CaptionServiceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CaptionServiceClient {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    /// Underlying HTTP client, shared with the upload executor
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Request a presigned upload target for `content_type`
    pub async fn generate_presigned_url(
        &self,
        bearer: &str,
        content_type: &str,
    ) -> Result<RemoteResponse, RemoteError> {
        self.forward_presign(bearer, &json!({ "contentType": content_type }))
            .await
    }

    /// Forward an arbitrary presign request body unchanged
    pub async fn forward_presign(
        &self,
        bearer: &str,
        body: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        self.post_json(PRESIGN_PATH, bearer, body).await
    }

    /// Register an uploaded object by its public URL
    pub async fn register_image(
        &self,
        bearer: &str,
        image_url: &str,
    ) -> Result<RemoteResponse, RemoteError> {
        let body = json!({ "imageUrl": image_url, "isCommonUse": false });
        self.post_json(REGISTER_PATH, bearer, &body).await
    }

    /// Generate captions for a registered image
    pub async fn generate_captions(
        &self,
        bearer: &str,
        image_id: &str,
    ) -> Result<RemoteResponse, RemoteError> {
        self.post_json(CAPTIONS_PATH, bearer, &json!({ "imageId": image_id }))
            .await
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Calling caption service");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| json!({}));

        Ok(RemoteResponse { status, body })
    }
}
