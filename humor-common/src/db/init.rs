//! Database initialization
//!
//! Creates the database file on first run and applies the default schema.
//! All statements are idempotent.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the default schema
///
/// Limited to one connection: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create the default tables if they don't exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_images_table(pool).await?;
    create_captions_table(pool).await?;
    create_caption_votes_table(pool).await?;
    Ok(())
}

async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            image_description TEXT,
            created_datetime_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_captions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS captions (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
            content TEXT NOT NULL CHECK (length(trim(content)) > 0),
            profile_id TEXT NOT NULL,
            is_public INTEGER NOT NULL DEFAULT 1,
            created_datetime_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_captions_image ON captions(image_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_caption_votes_table(pool: &SqlitePool) -> Result<()> {
    // No UNIQUE(caption_id, profile_id): repeat votes by one user are accepted
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS caption_votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            caption_id TEXT NOT NULL REFERENCES captions(id) ON DELETE CASCADE,
            vote_value INTEGER NOT NULL CHECK (vote_value IN (-1, 1)),
            profile_id TEXT NOT NULL,
            created_datetime_utc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_caption_votes_caption ON caption_votes(caption_id)")
        .execute(pool)
        .await?;
    Ok(())
}
