//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the `songs` and
//! `queue` tables if they do not exist yet.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database (tests and dry runs)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_tables(&pool).await?;
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_songs_table(pool).await?;
    create_queue_table(pool).await?;
    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist_name TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            vocals_stem_path TEXT NOT NULL DEFAULT '',
            music_stem_path TEXT NOT NULL DEFAULT '',
            mixed_audio_path TEXT NOT NULL DEFAULT '',
            lyrics TEXT NOT NULL DEFAULT '',
            lyrics_karaoke TEXT NOT NULL DEFAULT '',
            lyrics_sections TEXT NOT NULL DEFAULT '',
            lyrics_display TEXT NOT NULL DEFAULT '',
            karaoke_subtitle_path TEXT NOT NULL DEFAULT '',
            bpm REAL NOT NULL DEFAULT 0,
            musical_key TEXT NOT NULL DEFAULT '',
            tempo TEXT NOT NULL DEFAULT '',
            duration_seconds REAL NOT NULL DEFAULT 0,
            vocal_timing TEXT NOT NULL DEFAULT '',
            background_style TEXT NOT NULL DEFAULT '',
            spectrum_style TEXT NOT NULL DEFAULT '',
            spectrum_color TEXT NOT NULL DEFAULT '',
            spectrum_opacity REAL NOT NULL DEFAULT 0,
            brand_logo_path TEXT NOT NULL DEFAULT '',
            copyright_text TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_queue_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'queued'
                CHECK (status IN ('queued', 'processing', 'completed', 'failed', 'retrying')),
            priority INTEGER NOT NULL DEFAULT 0,
            current_step TEXT NOT NULL DEFAULT '',
            progress INTEGER NOT NULL DEFAULT 0,
            error_message TEXT NOT NULL DEFAULT '',
            retry_count INTEGER NOT NULL DEFAULT 0,
            video_file_path TEXT NOT NULL DEFAULT '',
            video_file_size INTEGER NOT NULL DEFAULT 0,
            queued_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_pending ON queue (status, priority DESC, queued_at ASC)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
