//! Upload-and-caption pipeline
//!
//! # State Progression
//! PRESIGNING → UPLOADING → REGISTERING → CAPTIONING → DONE
//!
//! Any step can end the run in `Failed(step, detail)`. Steps run strictly in
//! sequence, each gated on the previous step's output. There is no retry and
//! no compensation: an object uploaded (or an image registered) before a later
//! failure is left in place.

pub mod client;
pub mod presign;
pub mod upload;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use client::{build_http_client, CaptionServiceClient, RemoteError, RemoteResponse};
pub use presign::{classify_presign, UnrecognizedShape, UploadTarget};
pub use upload::{upload_object, UploadError, UploadFile};

/// Pipeline step, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Presign,
    Upload,
    Register,
    Caption,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Presign => "presign",
            PipelineStep::Upload => "upload",
            PipelineStep::Register => "register",
            PipelineStep::Caption => "caption",
        }
    }

    /// User-facing failure message for this step
    pub fn failure_message(self) -> &'static str {
        match self {
            PipelineStep::Presign => "Presign failed",
            PipelineStep::Upload => "Upload failed",
            PipelineStep::Register => "Register image failed",
            PipelineStep::Caption => "Generate captions failed",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote dependency failed or answered unusably
    ///
    /// `status` is the upstream HTTP status, `None` when no response arrived.
    #[error("{} (step: {step})", .step.failure_message())]
    Upstream {
        step: PipelineStep,
        status: Option<u16>,
        detail: Value,
    },

    /// Presign response matched no known shape (presign step)
    #[error("Unknown presigned shape (missing presignedUrl OR uploadUrl OR {{url,fields}})")]
    ShapeUnrecognized { payload: Value },
}

impl PipelineError {
    pub fn step(&self) -> PipelineStep {
        match self {
            PipelineError::Upstream { step, .. } => *step,
            PipelineError::ShapeUnrecognized { .. } => PipelineStep::Presign,
        }
    }

    fn transport(step: PipelineStep, err: impl fmt::Display) -> Self {
        PipelineError::Upstream {
            step,
            status: None,
            detail: Value::String(err.to_string()),
        }
    }

    fn rejected(step: PipelineStep, response: RemoteResponse) -> Self {
        PipelineError::Upstream {
            step,
            status: Some(response.status),
            detail: response.body,
        }
    }
}

/// Result of a completed run; captions are passed through unmodified
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub image_id: String,
    pub cdn_url: String,
    pub captions: Vec<Value>,
}

/// Pipeline states; `Failed` is represented by returning [`PipelineError`]
#[derive(Debug)]
enum PipelineState {
    Presigning,
    Uploading { target: UploadTarget },
    Registering { public_url: String },
    Captioning { image_id: String, public_url: String },
    Done(PipelineResult),
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            PipelineState::Presigning => "PRESIGNING",
            PipelineState::Uploading { .. } => "UPLOADING",
            PipelineState::Registering { .. } => "REGISTERING",
            PipelineState::Captioning { .. } => "CAPTIONING",
            PipelineState::Done(_) => "DONE",
        }
    }
}

/// Orchestrates one upload-and-caption run per call
#[derive(Debug, Clone)]
pub struct CaptionPipeline {
    client: CaptionServiceClient,
}

impl CaptionPipeline {
    pub fn new(client: CaptionServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CaptionServiceClient {
        &self.client
    }

    /// Run presign → upload → register → caption for `file`
    ///
    /// `bearer` is the caller's own credential, forwarded to every remote call.
    pub async fn run(&self, bearer: &str, file: &UploadFile) -> Result<PipelineResult, PipelineError> {
        let mut state = PipelineState::Presigning;

        loop {
            debug!(state = state.name(), "Pipeline state");
            state = match state {
                PipelineState::Done(result) => {
                    info!(
                        image_id = %result.image_id,
                        captions = result.captions.len(),
                        "Caption pipeline completed"
                    );
                    return Ok(result);
                }
                other => match self.advance(other, bearer, file).await {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(step = %e.step(), error = %e, "Caption pipeline failed");
                        return Err(e);
                    }
                },
            };
        }
    }

    async fn advance(
        &self,
        state: PipelineState,
        bearer: &str,
        file: &UploadFile,
    ) -> Result<PipelineState, PipelineError> {
        match state {
            PipelineState::Presigning => {
                let target = self.presign(bearer, &file.content_type).await?;
                Ok(PipelineState::Uploading { target })
            }
            PipelineState::Uploading { target } => {
                upload_object(self.client.http_client(), &target, file)
                    .await
                    .map_err(|e| match e {
                        UploadError::UploadFailed { status, body } => PipelineError::Upstream {
                            step: PipelineStep::Upload,
                            status: Some(status),
                            detail: Value::String(body),
                        },
                        UploadError::Transport(msg) => {
                            PipelineError::transport(PipelineStep::Upload, msg)
                        }
                    })?;
                Ok(PipelineState::Registering {
                    public_url: target.public_url().to_string(),
                })
            }
            PipelineState::Registering { public_url } => {
                let image_id = self.register(bearer, &public_url).await?;
                Ok(PipelineState::Captioning {
                    image_id,
                    public_url,
                })
            }
            PipelineState::Captioning {
                image_id,
                public_url,
            } => {
                let captions = self.generate_captions(bearer, &image_id).await?;
                Ok(PipelineState::Done(PipelineResult {
                    image_id,
                    cdn_url: public_url,
                    captions,
                }))
            }
            done @ PipelineState::Done(_) => Ok(done),
        }
    }

    async fn presign(&self, bearer: &str, content_type: &str) -> Result<UploadTarget, PipelineError> {
        let response = self
            .client
            .generate_presigned_url(bearer, content_type)
            .await
            .map_err(|e| PipelineError::transport(PipelineStep::Presign, e))?;

        if !response.is_success() {
            return Err(PipelineError::rejected(PipelineStep::Presign, response));
        }

        classify_presign(&response.body)
            .map_err(|UnrecognizedShape { payload }| PipelineError::ShapeUnrecognized { payload })
    }

    async fn register(&self, bearer: &str, public_url: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .register_image(bearer, public_url)
            .await
            .map_err(|e| PipelineError::transport(PipelineStep::Register, e))?;

        let image_id = match response.body.get("imageId") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        match image_id {
            Some(id) if response.is_success() => Ok(id),
            _ => Err(PipelineError::rejected(PipelineStep::Register, response)),
        }
    }

    async fn generate_captions(
        &self,
        bearer: &str,
        image_id: &str,
    ) -> Result<Vec<Value>, PipelineError> {
        let response = self
            .client
            .generate_captions(bearer, image_id)
            .await
            .map_err(|e| PipelineError::transport(PipelineStep::Caption, e))?;

        if !response.is_success() {
            return Err(PipelineError::rejected(PipelineStep::Caption, response));
        }

        Ok(normalize_captions(response.body))
    }
}

/// Caption list from a generate-captions response
///
/// Accepts a bare array or `{captions: [...]}`; anything else is empty.
pub fn normalize_captions(body: Value) -> Vec<Value> {
    match body {
        Value::Array(captions) => captions,
        Value::Object(mut object) => match object.remove("captions") {
            Some(Value::Array(captions)) => captions,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
