//! Render queue database operations

use super::{format_timestamp, parse_timestamp, JobRepository};
use crate::models::{Job, JobStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const JOB_COLUMNS: &str = "id, song_id, status, priority, current_step, progress, \
    error_message, retry_count, video_file_path, video_file_size, \
    queued_at, started_at, completed_at";

/// SQLite-backed job repository
#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a job with all of its fields (including `queued_at`), returning the new id
    pub async fn insert(&self, job: &Job) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO queue (
                song_id, status, priority, current_step, progress,
                error_message, retry_count, video_file_path, video_file_size,
                queued_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.song_id)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(&job.current_step)
        .bind(job.progress)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(&job.output_path)
        .bind(job.output_size)
        .bind(format_timestamp(&job.queued_at))
        .bind(job.started_at.as_ref().map(format_timestamp))
        .bind(job.completed_at.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All jobs in processing order
    pub async fn list(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM queue ORDER BY priority DESC, queued_at ASC, id ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_job).collect()
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn get_next_pending(&self) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM queue WHERE status = ? \
             ORDER BY priority DESC, queued_at ASC, id ASC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn get(&self, id: i64) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {} FROM queue WHERE id = ?", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE queue SET
                status = ?, priority = ?, current_step = ?, progress = ?,
                error_message = ?, retry_count = ?,
                video_file_path = ?, video_file_size = ?,
                started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(&job.current_step)
        .bind(job.progress)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(&job.output_path)
        .bind(job.output_size)
        .bind(job.started_at.as_ref().map(format_timestamp))
        .bind(job.completed_at.as_ref().map(format_timestamp))
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn enqueue(&self, song_id: i64, priority: i32) -> Result<Job> {
        let mut job = Job::new(0, song_id, priority);
        job.queued_at = Utc::now();
        job.id = self.insert(&job).await?;
        tracing::info!(job_id = job.id, song_id, priority, "Job enqueued");
        Ok(job)
    }
}

fn row_to_job(row: &SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    let queued_at: String = row.get("queued_at");
    let started_at: Option<String> = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(Job {
        id: row.get("id"),
        song_id: row.get("song_id"),
        status: status.parse()?,
        priority: row.get("priority"),
        current_step: row.get("current_step"),
        progress: row.get("progress"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
        queued_at: parse_timestamp(&queued_at)?,
        started_at: started_at.as_deref().map(parse_timestamp).transpose()?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        output_path: row.get("video_file_path"),
        output_size: row.get("video_file_size"),
    })
}
