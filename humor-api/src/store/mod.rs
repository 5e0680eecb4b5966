//! Relational store access
//!
//! The service talks to its tables through [`RowStore`], a narrow row-level
//! interface. Rows are loosely typed JSON maps because column names for the
//! caption text and the vote columns differ between deployments; see
//! [`writer`] for how they are discovered.

pub mod scoreboard;
pub mod sqlite;
pub mod writer;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use scoreboard::{best_caption_per_image, load_scoreboard, rank_captions};
pub use sqlite::SqliteRowStore;
pub use writer::{
    infer_vote_columns, infer_vote_columns_from_names, insert_caption, insert_vote,
    insert_with_candidates, load_vote_columns, record_image, TrialOutcome, VoteColumns,
    CAPTION_TEXT_CANDIDATES,
};

/// One table row, column order preserved
pub type Row = Map<String, Value>;

/// How a store failure should be treated by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Named column does not exist in the target table
    MissingColumn,
    /// Unique/primary key violation
    Conflict,
    Other,
}

/// Store failure with its classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    /// Classify a backend error message
    ///
    /// Recognizes SQLite, PostgreSQL and PostgREST phrasing.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if lower.contains("has no column named")
            || lower.contains("no such column")
            || (lower.contains("column") && lower.contains("does not exist"))
            || lower.contains("pgrst204")
            || (lower.contains("could not find the") && lower.contains("column"))
        {
            StoreErrorKind::MissingColumn
        } else if lower.contains("unique constraint failed") || lower.contains("duplicate key") {
            StoreErrorKind::Conflict
        } else {
            StoreErrorKind::Other
        };

        Self { kind, message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn is_missing_column(&self) -> bool {
        self.kind == StoreErrorKind::MissingColumn
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => StoreError::from_message(db_err.message()),
            _ => StoreError::from_message(err.to_string()),
        }
    }
}

/// Failure of a schema-adaptive read or write
#[derive(Debug, Error)]
pub enum PersistError {
    /// Column roles could not be determined from the table's fields
    #[error("Could not infer {table} columns from fields {observed:?}")]
    SchemaInference { table: String, observed: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Column names used to join votes to captions to images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumns {
    /// Vote column referencing the caption
    pub caption_ref: String,
    /// Vote column holding the signed value
    pub vote_value: String,
    /// Caption column holding the text
    pub caption_text: String,
}

/// One vote joined to its caption and that caption's image
///
/// Every field is optional: incomplete rows are skipped during aggregation
/// instead of failing the whole read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteJoinRow {
    pub caption_ref: Option<String>,
    pub vote_value: Option<i64>,
    pub caption_id: Option<String>,
    pub caption_text: Option<String>,
    pub image_id: Option<String>,
    pub image_url: Option<String>,
}

impl VoteJoinRow {
    /// Build from a row keyed by the join aliases
    pub fn from_row(row: &Row) -> Self {
        Self {
            caption_ref: row.get("caption_ref").and_then(text_value),
            vote_value: row.get("vote_value").and_then(integer_value),
            caption_id: row.get("caption_id").and_then(text_value),
            caption_text: row.get("caption_text").and_then(text_value),
            image_id: row.get("image_id").and_then(text_value),
            image_url: row.get("image_url").and_then(text_value),
        }
    }
}

/// Generic row-level access to the relational store
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Any one row of `table`, or `None` when the table is empty
    async fn sample_row(&self, table: &str) -> Result<Option<Row>, StoreError>;

    /// Column names of `table` in declaration order
    async fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Insert `row` and return the stored row (including generated columns)
    async fn insert_row(&self, table: &str, row: &Row) -> Result<Row, StoreError>;

    /// Up to `limit` rows of `table`
    async fn list_rows(&self, table: &str, limit: usize) -> Result<Vec<Row>, StoreError>;

    /// Up to `limit` votes inner-joined to captions and images
    async fn fetch_vote_joins(
        &self,
        columns: &JoinColumns,
        limit: usize,
    ) -> Result<Vec<VoteJoinRow>, StoreError>;
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
