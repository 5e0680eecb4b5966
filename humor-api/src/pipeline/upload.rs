//! Object-storage upload executor
//!
//! Transfers file bytes to the target produced by [`classify_presign`].
//! Single attempt, no retry.
//!
//! [`classify_presign`]: super::presign::classify_presign

use reqwest::multipart::{Form, Part};
use thiserror::Error;

use super::presign::UploadTarget;

/// Multipart field name carrying the file bytes
const FILE_FIELD: &str = "file";

/// File received from the caller
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Upload failure
#[derive(Debug, Error)]
pub enum UploadError {
    /// Storage answered with a non-2xx status; `body` is best-effort
    #[error("Upload failed with status {status}")]
    UploadFailed { status: u16, body: String },

    /// Request never completed
    #[error("Upload transport error: {0}")]
    Transport(String),
}

/// Upload `file` to `target`
pub async fn upload_object(
    http_client: &reqwest::Client,
    target: &UploadTarget,
    file: &UploadFile,
) -> Result<(), UploadError> {
    let request = match target {
        UploadTarget::Put { upload_url, .. } => http_client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, &file.content_type)
            .body(file.bytes.clone()),
        UploadTarget::Post {
            upload_url,
            form_fields,
            ..
        } => {
            let form = form_fields
                .iter()
                .fold(Form::new(), |form, (key, value)| {
                    form.text(key.clone(), value.clone())
                })
                .part(FILE_FIELD, file_part(file)?);
            http_client.post(upload_url).multipart(form)
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| UploadError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        tracing::debug!(kind = target.kind(), status = status.as_u16(), "Object uploaded");
        return Ok(());
    }

    // Diagnostic only: a failed body read must not mask the status
    let body = response.text().await.unwrap_or_default();
    Err(UploadError::UploadFailed {
        status: status.as_u16(),
        body,
    })
}

fn file_part(file: &UploadFile) -> Result<Part, UploadError> {
    let part = Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone().unwrap_or_else(|| "upload".to_string()));
    part.mime_str(&file.content_type)
        .map_err(|e| UploadError::Transport(format!("Invalid content type: {}", e)))
}
