//! Presign response normalization
//!
//! The presign endpoint has shipped several response shapes. All shape
//! sniffing lives here; everything downstream sees one [`UploadTarget`].

use serde_json::{Map, Value};

/// Canonical upload target derived from a presign response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// Single PUT of the raw bytes to `upload_url`
    Put { upload_url: String, public_url: String },
    /// Multipart POST of `form_fields` followed by the file to `upload_url`
    Post {
        upload_url: String,
        form_fields: Vec<(String, String)>,
        public_url: String,
    },
}

impl UploadTarget {
    /// URL the object is reachable at once uploaded
    pub fn public_url(&self) -> &str {
        match self {
            UploadTarget::Put { public_url, .. } | UploadTarget::Post { public_url, .. } => {
                public_url
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UploadTarget::Put { .. } => "put",
            UploadTarget::Post { .. } => "post",
        }
    }
}

/// Presign payload that matched no known shape
///
/// Non-retryable: indicates a contract mismatch with the upstream service.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedShape {
    pub payload: Value,
}

/// Classify a presign response
///
/// Recognized shapes, tried in order:
/// - `{presignedUrl, cdnUrl}` → PUT
/// - `{uploadUrl, cdnUrl}` → PUT
/// - `{url, fields: {..}, cdnUrl}` → POST
pub fn classify_presign(payload: &Value) -> Result<UploadTarget, UnrecognizedShape> {
    let unrecognized = || UnrecognizedShape {
        payload: payload.clone(),
    };

    let object = payload.as_object().ok_or_else(unrecognized)?;
    let public_url = string_field(object, "cdnUrl").ok_or_else(unrecognized)?;

    if let Some(upload_url) = string_field(object, "presignedUrl") {
        return Ok(UploadTarget::Put {
            upload_url,
            public_url,
        });
    }

    if let Some(upload_url) = string_field(object, "uploadUrl") {
        return Ok(UploadTarget::Put {
            upload_url,
            public_url,
        });
    }

    if let (Some(upload_url), Some(fields)) = (
        string_field(object, "url"),
        object.get("fields").and_then(Value::as_object),
    ) {
        let form_fields = fields
            .iter()
            .map(|(key, value)| form_value(value).map(|v| (key.clone(), v)))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unrecognized)?;

        return Ok(UploadTarget::Post {
            upload_url,
            form_fields,
            public_url,
        });
    }

    Err(unrecognized())
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Scalar form values are sent as text; nested values cannot be form fields
fn form_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
