//! Render job state machine
//!
//! A job is one queued unit of work producing one video from one song:
//! QUEUED → PROCESSING → COMPLETED | FAILED

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for the worker
    Queued,
    /// Picked up by the worker, phases running
    Processing,
    /// Video produced and recorded on the job
    Completed,
    /// A phase failed; terminal until manually re-enqueued
    Failed,
    /// Declared for schema compatibility. Nothing transitions into it.
    Retrying,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "retrying" => Ok(JobStatus::Retrying),
            other => Err(crate::Error::Internal(format!("Unknown job status: {}", other))),
        }
    }
}

/// Queued render job (row of the `queue` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub song_id: i64,
    pub status: JobStatus,
    /// Higher runs first
    pub priority: i32,
    pub current_step: String,
    /// 0-100
    pub progress: i32,
    pub error_message: String,
    pub retry_count: i32,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Final video location (empty until rendered)
    pub output_path: String,
    /// Final video size in bytes
    pub output_size: i64,
}

impl Job {
    /// New job in the Queued state
    pub fn new(id: i64, song_id: i64, priority: i32) -> Self {
        Self {
            id,
            song_id,
            status: JobStatus::Queued,
            priority,
            current_step: String::new(),
            progress: 0,
            error_message: String::new(),
            retry_count: 0,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output_path: String::new(),
            output_size: 0,
        }
    }

    /// Queued → Processing. Resets progress for the new run.
    pub fn start_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        self.progress = 0;
        self.current_step = "Starting".to_string();
        self.error_message.clear();
    }

    /// Record a checkpoint. Progress never moves backwards within a run.
    ///
    /// Returns the progress value actually stored.
    pub fn record_progress(&mut self, step: &str, progress: i32) -> i32 {
        self.current_step = step.to_string();
        self.progress = progress.clamp(0, 100).max(self.progress);
        self.progress
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress = 100;
        self.current_step = "Completed".to_string();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = message.into();
        self.retry_count += 1;
        self.completed_at = Some(Utc::now());
    }
}
