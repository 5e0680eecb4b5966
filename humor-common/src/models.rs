//! Domain models shared between the store layer and the HTTP API

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registered image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub url: String,
    #[serde(rename = "image_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Image {
    /// Build from a loosely-typed store row; `None` when id or url is missing
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let id = row.get("id").and_then(value_as_string)?;
        let url = row.get("url").and_then(value_as_string)?;
        let description = row
            .get("image_description")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self { id, url, description })
    }
}

/// Caption about to be written
///
/// Construction trims the text and rejects empty values, so any instance
/// satisfies the non-empty-text invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCaption {
    image_id: String,
    text: String,
    profile_id: String,
    is_public: bool,
}

impl NewCaption {
    pub fn new(image_id: &str, text: &str, profile_id: &str) -> Result<Self> {
        let image_id = image_id.trim();
        let text = text.trim();
        if image_id.is_empty() || text.is_empty() {
            return Err(Error::InvalidInput("Missing imageId or content".to_string()));
        }
        Ok(Self {
            image_id: image_id.to_string(),
            text: text.to_string(),
            profile_id: profile_id.to_string(),
            is_public: true,
        })
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }
}

/// A single vote: up (+1) or down (-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(Error::InvalidInput(format!(
                "vote must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

/// Derived leaderboard row, recomputed on every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub caption_id: String,
    pub image_id: String,
    pub image_url: String,
    pub caption_text: String,
    pub score: i64,
}

/// Locally displayed score adjustment applied before a vote request resolves
///
/// Compensating action only: the persisted score is always re-derived from
/// vote rows, never from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDelta(pub VoteValue);

impl ScoreDelta {
    /// Score shown while the vote request is in flight
    pub fn apply(self, score: i64) -> i64 {
        score + self.0.as_i64()
    }

    /// Undo [`ScoreDelta::apply`] after the request failed
    pub fn rollback(self, score: i64) -> i64 {
        score - self.0.as_i64()
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
