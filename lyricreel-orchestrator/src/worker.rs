//! Queue worker
//!
//! Polls the job queue on a fixed interval and runs at most one job per tick
//! through the [`Processor`]. A job is processed inline; stopping the worker
//! never interrupts a run in progress.

use crate::processor::Processor;
use lyricreel_common::db::{JobRepository, SongRepository};
use lyricreel_common::models::Job;
use lyricreel_common::ProgressBroadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Nothing to do (or the queue could not be read)
    Idle,
    Completed(i64),
    Failed(i64),
}

pub struct QueueWorker {
    jobs: Arc<dyn JobRepository>,
    songs: Arc<dyn SongRepository>,
    processor: Processor,
    broadcaster: ProgressBroadcaster,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl QueueWorker {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        songs: Arc<dyn SongRepository>,
        processor: Processor,
        broadcaster: ProgressBroadcaster,
        poll_interval: Duration,
    ) -> Self {
        Self {
            jobs,
            songs,
            processor,
            broadcaster,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the poll loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the loop to exit at its next wait point
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Poll until stopped; the first tick fires immediately
    pub async fn run(self) {
        info!(poll_interval_secs = self.poll_interval.as_secs_f64(), "Queue worker started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.process_next().await;
                }
            }
        }

        info!("Queue worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Take the next pending job (if any) and run it to a terminal state
    pub async fn process_next(&self) -> WorkerOutcome {
        let mut job = match self.jobs.get_next_pending().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("No pending jobs");
                return WorkerOutcome::Idle;
            }
            Err(e) => {
                error!(error = %e, "Failed to read job queue");
                return WorkerOutcome::Idle;
            }
        };

        info!(job_id = job.id, song_id = job.song_id, priority = job.priority, "Processing job");

        let song = match self.songs.get_by_id(job.song_id).await {
            Ok(Some(song)) => song,
            Ok(None) => {
                warn!(job_id = job.id, song_id = job.song_id, "Song not found");
                return self.fail(&mut job, "Song not found").await;
            }
            Err(e) => {
                error!(job_id = job.id, song_id = job.song_id, error = %e, "Failed to load song");
                return self.fail(&mut job, "Failed to load song data").await;
            }
        };

        job.start_processing();
        self.persist(&job).await;
        self.broadcaster.broadcast_from_job(&job, "Processing started");

        match self.processor.process(&mut job, &song).await {
            Ok(()) => {
                job.mark_completed();
                self.persist(&job).await;
                self.broadcaster
                    .broadcast_from_job(&job, "Processing completed successfully");
                info!(job_id = job.id, output = %job.output_path, "Job completed");
                WorkerOutcome::Completed(job.id)
            }
            Err(e) => {
                if e.is_not_found() {
                    warn!(job_id = job.id, error = %e, "Job failed, referenced record is gone");
                } else {
                    error!(job_id = job.id, error = %e, "Job failed");
                }
                self.fail(&mut job, e.root_message()).await
            }
        }
    }

    async fn fail(&self, job: &mut Job, message: impl Into<String>) -> WorkerOutcome {
        job.mark_failed(message);
        self.persist(job).await;
        self.broadcaster.broadcast_from_job(job, "Processing failed");
        WorkerOutcome::Failed(job.id)
    }

    async fn persist(&self, job: &Job) {
        if let Err(e) = self.jobs.update(job).await {
            warn!(job_id = job.id, status = %job.status, error = %e, "Failed to persist job");
        }
    }
}
