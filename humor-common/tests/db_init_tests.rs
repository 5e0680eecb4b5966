//! Database initialization tests
//!
//! Covers automatic database creation, idempotent schema setup and the
//! default table layout.

use humor_common::db::{init_database, init_memory_database, init_schema};
use sqlx::Row;

async fn column_names(pool: &sqlx::SqlitePool, table: &str) -> Vec<String> {
    sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>(1))
        .collect()
}

#[tokio::test]
async fn test_creates_database_file_and_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("humor.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.expect("Should create database");

    assert!(db_path.exists());
    let images = column_names(&pool, "images").await;
    assert_eq!(images, vec!["id", "url", "image_description", "created_datetime_utc"]);
}

#[tokio::test]
async fn test_schema_is_idempotent() {
    let pool = init_memory_database().await.unwrap();

    // Second application must not fail
    init_schema(&pool).await.expect("Schema init should be idempotent");

    let captions = column_names(&pool, "captions").await;
    assert!(captions.contains(&"content".to_string()));
    assert!(captions.contains(&"profile_id".to_string()));

    let votes = column_names(&pool, "caption_votes").await;
    assert!(votes.contains(&"caption_id".to_string()));
    assert!(votes.contains(&"vote_value".to_string()));
}

#[tokio::test]
async fn test_vote_value_constrained_to_unit_values() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query("INSERT INTO images (id, url) VALUES ('img_1', 'https://cdn/1.png')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO captions (id, image_id, content, profile_id) VALUES ('c1', 'img_1', 'hi', 'u1')")
        .execute(&pool)
        .await
        .unwrap();

    let bad = sqlx::query(
        "INSERT INTO caption_votes (caption_id, vote_value, profile_id, created_datetime_utc) \
         VALUES ('c1', 3, 'u1', '2026-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;
    assert!(bad.is_err(), "vote_value 3 must be rejected by the CHECK constraint");

    // Same user may vote twice (no uniqueness constraint)
    for _ in 0..2 {
        sqlx::query(
            "INSERT INTO caption_votes (caption_id, vote_value, profile_id, created_datetime_utc) \
             VALUES ('c1', 1, 'u1', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }
}
