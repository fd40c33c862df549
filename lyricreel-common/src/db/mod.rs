//! Database access
//!
//! Repository traits consumed by the worker and processor, plus their
//! SQLite implementations.

pub mod init;
pub mod jobs;
pub mod songs;

pub use init::{init_database, init_memory_database};
pub use jobs::SqliteJobRepository;
pub use songs::SqliteSongRepository;

use crate::models::{Job, Song};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

/// Persistence of render jobs
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Next queued job: highest priority first, then earliest `queued_at`
    async fn get_next_pending(&self) -> Result<Option<Job>>;

    async fn get(&self, id: i64) -> Result<Option<Job>>;

    /// Persist every mutable field of the job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Create a new Queued job for a song
    async fn enqueue(&self, song_id: i64, priority: i32) -> Result<Job>;
}

/// Persistence of songs
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Song>>;

    async fn update(&self, song: &Song) -> Result<()>;

    /// Insert a new song, returning its id
    async fn insert(&self, song: &Song) -> Result<i64>;
}

/// Fixed-width RFC3339 so text ordering matches time ordering
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Invalid timestamp '{}': {}", text, e)))
}
