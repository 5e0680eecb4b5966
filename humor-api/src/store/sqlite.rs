//! SQLite-backed [`RowStore`]
//!
//! Table and column names are interpolated into SQL, so every identifier is
//! validated before use and quoted.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, ValueRef};

use super::{JoinColumns, Row, RowStore, StoreError, VoteJoinRow};
use humor_common::db::{CAPTIONS_TABLE, IMAGES_TABLE, VOTES_TABLE};

/// Row store over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteRowStore {
    pool: SqlitePool,
}

impl SqliteRowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn sample_row(&self, table: &str) -> Result<Option<Row>, StoreError> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_identifier(table)?);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table)?);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
        rows.iter()
            .map(|row| row.try_get::<String, _>(1).map_err(StoreError::from))
            .collect()
    }

    async fn insert_row(&self, table: &str, row: &Row) -> Result<Row, StoreError> {
        if row.is_empty() {
            return Err(StoreError::other("Refusing to insert an empty row"));
        }

        let columns = row
            .keys()
            .map(|column| quote_identifier(column))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_identifier(table)?,
            columns.join(", "),
            placeholders
        );

        let query = row
            .values()
            .fold(sqlx::query(&sql), |query, value| bind_json(query, value));
        let inserted = query.fetch_one(&self.pool).await?;
        Ok(row_to_json(&inserted))
    }

    async fn list_rows(&self, table: &str, limit: usize) -> Result<Vec<Row>, StoreError> {
        let sql = format!("SELECT * FROM {} LIMIT ?", quote_identifier(table)?);
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_vote_joins(
        &self,
        columns: &JoinColumns,
        limit: usize,
    ) -> Result<Vec<VoteJoinRow>, StoreError> {
        let sql = format!(
            r#"
            SELECT v.{caption_ref} AS caption_ref,
                   v.{vote_value} AS vote_value,
                   c.id AS caption_id,
                   c.{caption_text} AS caption_text,
                   c.image_id AS image_id,
                   i.url AS image_url
            FROM {votes} v
            JOIN {captions} c ON c.id = v.{caption_ref}
            JOIN {images} i ON i.id = c.image_id
            LIMIT ?
            "#,
            caption_ref = quote_identifier(&columns.caption_ref)?,
            vote_value = quote_identifier(&columns.vote_value)?,
            caption_text = quote_identifier(&columns.caption_text)?,
            votes = quote_identifier(VOTES_TABLE)?,
            captions = quote_identifier(CAPTIONS_TABLE)?,
            images = quote_identifier(IMAGES_TABLE)?,
        );

        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| VoteJoinRow::from_row(&row_to_json(row)))
            .collect())
    }
}

/// Validate an identifier and wrap it in double quotes
fn quote_identifier(name: &str) -> Result<String, StoreError> {
    if is_valid_identifier(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(StoreError::other(format!("Invalid identifier: {}", name)))
    }
}

/// Only ASCII alphanumerics and underscore, 1..100 chars
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() < 100 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Convert a SQLite row to JSON, keeping column order
fn row_to_json(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = row
                .try_get_raw(i)
                .ok()
                .and_then(|raw| {
                    if raw.is_null() {
                        Some(Value::Null)
                    } else {
                        row.try_get::<String, _>(i)
                            .ok()
                            .map(Value::String)
                            .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
                            .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
                    }
                })
                .unwrap_or(Value::Null);
            (column.name().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorKind;
    use humor_common::db::init_memory_database;

    async fn store() -> SqliteRowStore {
        SqliteRowStore::new(init_memory_database().await.unwrap())
    }

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("caption_votes"));
        assert!(is_valid_identifier("vote_value2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("captions; DROP TABLE images"));
        assert!(!is_valid_identifier("a\"b"));
        assert!(!is_valid_identifier(&"x".repeat(100)));
    }

    #[tokio::test]
    async fn test_insert_returns_generated_columns() {
        let store = store().await;
        let inserted = store
            .insert_row("images", &row(json!({"id": "img_1", "url": "https://cdn/1.png"})))
            .await
            .unwrap();

        assert_eq!(inserted["id"], "img_1");
        assert!(inserted["created_datetime_utc"].is_string());
        assert_eq!(inserted["image_description"], Value::Null);
    }

    #[tokio::test]
    async fn test_insert_unknown_column_is_missing_column() {
        let store = store().await;
        let err = store
            .insert_row("images", &row(json!({"id": "img_1", "href": "https://cdn/1.png"})))
            .await
            .unwrap_err();

        assert!(err.is_missing_column(), "unexpected: {}", err);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let store = store().await;
        let image = row(json!({"id": "img_1", "url": "https://cdn/1.png"}));
        store.insert_row("images", &image).await.unwrap();

        let err = store.insert_row("images", &image).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_sample_row_preserves_column_order() {
        let store = store().await;
        assert!(store.sample_row("images").await.unwrap().is_none());

        store
            .insert_row("images", &row(json!({"url": "https://cdn/1.png", "id": "img_1"})))
            .await
            .unwrap();

        let sample = store.sample_row("images").await.unwrap().unwrap();
        let keys: Vec<&str> = sample.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "url", "image_description", "created_datetime_utc"]);
    }

    #[tokio::test]
    async fn test_table_columns_and_list_rows() {
        let store = store().await;
        let columns = store.table_columns("caption_votes").await.unwrap();
        assert_eq!(
            columns,
            vec!["id", "caption_id", "vote_value", "profile_id", "created_datetime_utc"]
        );

        for i in 0..3 {
            store
                .insert_row(
                    "images",
                    &row(json!({"id": format!("img_{}", i), "url": "https://cdn/x.png"})),
                )
                .await
                .unwrap();
        }
        assert_eq!(store.list_rows("images", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected_before_query() {
        let store = store().await;
        let err = store.sample_row("images; --").await.unwrap_err();
        assert!(err.message().contains("Invalid identifier"));
    }
}
