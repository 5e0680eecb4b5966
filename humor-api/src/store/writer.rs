//! Schema-adaptive writes
//!
//! Caption text goes into whichever of [`CAPTION_TEXT_CANDIDATES`] the captions
//! table accepts (ordered-trial insertion). Vote column names are inferred from
//! a live sample row on every request; nothing is cached.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{PersistError, Row, RowStore, StoreError, StoreErrorKind};
use humor_common::db::{CAPTIONS_TABLE, IMAGES_TABLE, VOTES_TABLE};
use humor_common::models::{Image, NewCaption, VoteValue};

/// Caption text column names, tried in order
pub const CAPTION_TEXT_CANDIDATES: [&str; 4] = ["text", "caption", "content", "body"];

/// Column stamped with the acting user on every write
pub const ACTOR_COLUMN: &str = "profile_id";

/// Column stamped with the vote creation time
pub const CREATED_AT_COLUMN: &str = "created_datetime_utc";

const CAPTION_TOKEN: &str = "caption";
const REFERENCE_TOKENS: [&str; 2] = ["id", "fk"];
const VALUE_TOKENS: [&str; 5] = ["vote", "value", "direction", "rating", "score"];
const METADATA_TOKENS: [&str; 5] = ["id", "created", "updated", "time", "profile"];

/// Outcome of an ordered-trial insertion
#[derive(Debug)]
pub enum TrialOutcome {
    /// Row stored using `column` for the value
    Inserted { column: &'static str, row: Row },
    /// Every candidate column was missing; carries the last error seen
    SchemaMismatch { last_error: StoreError },
    /// A non-schema error stopped the trial at `column`
    Failed {
        column: &'static str,
        error: StoreError,
    },
}

impl TrialOutcome {
    /// Column used and stored row, or the error to surface
    pub fn into_result(self) -> Result<(&'static str, Row), StoreError> {
        match self {
            TrialOutcome::Inserted { column, row } => Ok((column, row)),
            TrialOutcome::SchemaMismatch { last_error } => Err(last_error),
            TrialOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Insert `base` plus `value` under the first accepted candidate column
///
/// Only "column does not exist" errors advance to the next candidate; any
/// other error ends the trial immediately.
pub async fn insert_with_candidates(
    store: &dyn RowStore,
    table: &str,
    base: &Row,
    candidates: &[&'static str],
    value: &Value,
) -> TrialOutcome {
    let mut last_error = None;

    for &column in candidates {
        let mut row = base.clone();
        row.insert(column.to_string(), value.clone());

        match store.insert_row(table, &row).await {
            Ok(stored) => return TrialOutcome::Inserted { column, row: stored },
            Err(e) if e.is_missing_column() => {
                debug!(table, column, "Candidate column rejected: {}", e);
                last_error = Some(e);
            }
            Err(error) => return TrialOutcome::Failed { column, error },
        }
    }

    TrialOutcome::SchemaMismatch {
        last_error: last_error
            .unwrap_or_else(|| StoreError::other(format!("No candidate columns for {}", table))),
    }
}

/// Store a caption; returns the text column used and the stored row
pub async fn insert_caption(
    store: &dyn RowStore,
    caption: &NewCaption,
) -> Result<(&'static str, Row), PersistError> {
    let mut base = Row::new();
    base.insert("image_id".to_string(), json!(caption.image_id()));
    base.insert(ACTOR_COLUMN.to_string(), json!(caption.profile_id()));
    base.insert("is_public".to_string(), json!(caption.is_public()));

    let (column, row) = insert_with_candidates(
        store,
        CAPTIONS_TABLE,
        &base,
        &CAPTION_TEXT_CANDIDATES,
        &json!(caption.text()),
    )
    .await
    .into_result()?;

    info!(image_id = caption.image_id(), column, "Caption saved");
    Ok((column, row))
}

/// Record a registered image; an existing row with the same id is kept as is
pub async fn record_image(store: &dyn RowStore, image: &Image) -> Result<(), PersistError> {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(image.id));
    row.insert("url".to_string(), json!(image.url));
    if let Some(description) = &image.description {
        row.insert("image_description".to_string(), json!(description));
    }

    match store.insert_row(IMAGES_TABLE, &row).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == StoreErrorKind::Conflict => {
            debug!(image_id = %image.id, "Image already recorded");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Vote table columns for the caption reference and the signed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteColumns {
    pub caption_ref: String,
    pub vote_value: String,
}

/// Infer vote column roles from one sample row
pub fn infer_vote_columns(sample: &Row) -> Result<VoteColumns, PersistError> {
    let caption_ref = pick_caption_column(sample);
    let vote_value = pick_vote_column(sample, caption_ref.as_deref());

    match (caption_ref, vote_value) {
        (Some(caption_ref), Some(vote_value)) => Ok(VoteColumns {
            caption_ref,
            vote_value,
        }),
        _ => Err(PersistError::SchemaInference {
            table: VOTES_TABLE.to_string(),
            observed: sample.keys().cloned().collect(),
        }),
    }
}

/// Infer vote column roles from the table's column names alone
///
/// Used when no row exists to sample. Only the name rules apply; the UUID and
/// numeric fallbacks need values.
pub fn infer_vote_columns_from_names(columns: &[String]) -> Result<VoteColumns, PersistError> {
    let caption_ref = columns.iter().find(|name| is_caption_reference(name));
    let vote_value = columns
        .iter()
        .filter(|name| Some(*name) != caption_ref)
        .find(|name| is_value_name(name));

    match (caption_ref, vote_value) {
        (Some(caption_ref), Some(vote_value)) => Ok(VoteColumns {
            caption_ref: caption_ref.clone(),
            vote_value: vote_value.clone(),
        }),
        _ => Err(PersistError::SchemaInference {
            table: VOTES_TABLE.to_string(),
            observed: columns.to_vec(),
        }),
    }
}

/// Sample the votes table and infer its columns
///
/// An empty table falls back to its declared column names.
pub async fn load_vote_columns(store: &dyn RowStore) -> Result<VoteColumns, PersistError> {
    match store.sample_row(VOTES_TABLE).await? {
        Some(sample) => infer_vote_columns(&sample),
        None => {
            let columns = store.table_columns(VOTES_TABLE).await?;
            debug!(?columns, "No votes to sample; inferring from column names");
            infer_vote_columns_from_names(&columns)
        }
    }
}

/// Append a vote by `voter` on `caption_id`
pub async fn insert_vote(
    store: &dyn RowStore,
    caption_id: &str,
    value: VoteValue,
    voter: &str,
    now: DateTime<Utc>,
) -> Result<Row, PersistError> {
    let columns = load_vote_columns(store).await?;
    debug!(
        caption_ref = %columns.caption_ref,
        vote_value = %columns.vote_value,
        "Inferred vote columns"
    );

    let mut row = Row::new();
    row.insert(columns.caption_ref.clone(), json!(caption_id));
    row.insert(columns.vote_value.clone(), json!(value.as_i64()));
    row.insert(ACTOR_COLUMN.to_string(), json!(voter));
    row.insert(
        CREATED_AT_COLUMN.to_string(),
        json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    let stored = store.insert_row(VOTES_TABLE, &row).await?;
    info!(caption_id, vote = value.as_i64(), "Vote recorded");
    Ok(stored)
}

fn is_caption_reference(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains(CAPTION_TOKEN) && REFERENCE_TOKENS.iter().any(|t| lower.contains(t))
}

fn is_value_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    VALUE_TOKENS.iter().any(|t| lower.contains(t))
}

fn pick_caption_column(sample: &Row) -> Option<String> {
    sample
        .keys()
        .find(|key| is_caption_reference(key))
        .or_else(|| {
            sample.iter().find_map(|(key, value)| {
                (key.to_lowercase().contains(CAPTION_TOKEN) && looks_like_uuid(value))
                    .then_some(key)
            })
        })
        .cloned()
}

fn pick_vote_column(sample: &Row, caption_column: Option<&str>) -> Option<String> {
    let candidates = || {
        sample
            .iter()
            .filter(move |(key, _)| Some(key.as_str()) != caption_column)
    };

    candidates()
        .find(|(key, _)| is_value_name(key))
        .or_else(|| {
            candidates().find(|(key, value)| {
                let lower = key.to_lowercase();
                value.is_number() && !METADATA_TOKENS.iter().any(|t| lower.contains(t))
            })
        })
        .map(|(key, _)| key.clone())
}

fn looks_like_uuid(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| Uuid::parse_str(s).is_ok())
        .unwrap_or(false)
}
