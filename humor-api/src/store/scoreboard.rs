//! Scoreboard aggregation
//!
//! Scores are re-derived from vote rows on every read.

use std::collections::HashMap;
use tracing::debug;

use super::writer::{infer_vote_columns, CAPTION_TEXT_CANDIDATES};
use super::{JoinColumns, PersistError, RowStore, VoteJoinRow};
use humor_common::db::{CAPTIONS_TABLE, VOTES_TABLE};
use humor_common::models::RankedEntry;

/// Rank captions by the sum of their vote values
///
/// Rows missing any of caption id, caption reference, image id, image URL or
/// caption text are skipped. A missing vote value counts as 0. Ties keep
/// first-observed order.
pub fn rank_captions(rows: &[VoteJoinRow]) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let (Some(caption_id), Some(_), Some(image_id), Some(image_url), Some(caption_text)) = (
            &row.caption_id,
            &row.caption_ref,
            &row.image_id,
            &row.image_url,
            &row.caption_text,
        ) else {
            continue;
        };
        let value = row.vote_value.unwrap_or(0);

        match index.get(caption_id) {
            Some(&i) => entries[i].score += value,
            None => {
                index.insert(caption_id.clone(), entries.len());
                entries.push(RankedEntry {
                    caption_id: caption_id.clone(),
                    image_id: image_id.clone(),
                    image_url: image_url.clone(),
                    caption_text: caption_text.clone(),
                    score: value,
                });
            }
        }
    }

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Highest-scoring caption of each image, images ranked by that score
pub fn best_caption_per_image(entries: &[RankedEntry]) -> Vec<RankedEntry> {
    let mut best: Vec<RankedEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        match index.get(entry.image_id.as_str()) {
            Some(&i) if entry.score > best[i].score => best[i] = entry.clone(),
            Some(_) => {}
            None => {
                index.insert(&entry.image_id, best.len());
                best.push(entry.clone());
            }
        }
    }

    best.sort_by(|a, b| b.score.cmp(&a.score));
    best
}

/// Load the per-caption scoreboard, reading at most `limit` votes
pub async fn load_scoreboard(
    store: &dyn RowStore,
    limit: usize,
) -> Result<Vec<RankedEntry>, PersistError> {
    let Some(sample) = store.sample_row(VOTES_TABLE).await? else {
        debug!("No votes recorded; scoreboard is empty");
        return Ok(Vec::new());
    };
    let vote_columns = infer_vote_columns(&sample)?;

    let caption_columns = store.table_columns(CAPTIONS_TABLE).await?;
    let caption_text = CAPTION_TEXT_CANDIDATES
        .iter()
        .find(|candidate| caption_columns.iter().any(|c| c.as_str() == **candidate))
        .ok_or_else(|| PersistError::SchemaInference {
            table: CAPTIONS_TABLE.to_string(),
            observed: caption_columns.clone(),
        })?;

    let columns = JoinColumns {
        caption_ref: vote_columns.caption_ref,
        vote_value: vote_columns.vote_value,
        caption_text: caption_text.to_string(),
    };
    let rows = store.fetch_vote_joins(&columns, limit).await?;
    debug!(rows = rows.len(), limit, "Loaded vote joins");

    Ok(rank_captions(&rows))
}
