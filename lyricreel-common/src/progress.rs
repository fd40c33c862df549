//! Progress broadcaster
//!
//! In-memory pub/sub hub distributing job progress to live subscribers
//! (SSE clients, tests, log tailers).
//!
//! Each subscriber owns a bounded mailbox. Publishing never blocks: when a
//! mailbox is full the update is dropped for that subscriber only. There is
//! no replay; subscribers only see updates emitted after they subscribed.
//! The job row remains the durable progress record.

use crate::models::{Job, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

/// Mailbox capacity per subscriber
pub const SUBSCRIBER_BUFFER: usize = 10;

/// One progress checkpoint for one job
///
/// Created once per reported checkpoint and never mutated after broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub queue_id: i64,
    pub song_id: i64,
    pub status: JobStatus,
    pub current_step: String,
    pub progress: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Snapshot of a job's current state with a human-readable message
    pub fn from_job(job: &Job, message: impl Into<String>) -> Self {
        Self {
            queue_id: job.id,
            song_id: job.song_id,
            status: job.status,
            current_step: job.current_step.clone(),
            progress: job.progress,
            message: message.into(),
            error_message: if job.error_message.is_empty() {
                None
            } else {
                Some(job.error_message.clone())
            },
            timestamp: Utc::now(),
        }
    }
}

/// Handle returned by [`ProgressBroadcaster::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<ProgressUpdate>,
}

impl Subscription {
    /// Wait for the next update; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<ProgressUpdate> {
        self.receiver.recv().await
    }

    /// Next buffered update without waiting
    pub fn try_recv(&mut self) -> Option<ProgressUpdate> {
        self.receiver.try_recv().ok()
    }
}

/// Registry of subscriber mailboxes behind a single read/write lock
///
/// Cloning is cheap and shares the registry.
///
/// # Examples
///
/// ```
/// use lyricreel_common::models::Job;
/// use lyricreel_common::progress::ProgressBroadcaster;
///
/// let broadcaster = ProgressBroadcaster::new();
/// let mut sub = broadcaster.subscribe();
///
/// let job = Job::new(1, 42, 0);
/// broadcaster.broadcast_from_job(&job, "Processing started");
///
/// let update = sub.try_recv().expect("update buffered");
/// assert_eq!(update.song_id, 42);
/// ```
#[derive(Clone, Default)]
pub struct ProgressBroadcaster {
    subscribers: Arc<RwLock<HashMap<Uuid, mpsc::Sender<ProgressUpdate>>>>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber with a mailbox of [`SUBSCRIBER_BUFFER`] updates
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();
        self.write().insert(id, tx);
        debug!(subscriber = %id, "Progress subscriber registered");
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber and close its mailbox
    ///
    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Progress subscriber removed");
        }
        removed
    }

    /// Stamp and deliver an update to every subscriber with free capacity
    ///
    /// Never blocks and never fails. Full mailboxes miss this update;
    /// mailboxes whose receiver was dropped are pruned.
    ///
    /// Returns the number of subscribers that received the update.
    pub fn broadcast(&self, mut update: ProgressUpdate) -> usize {
        update.timestamp = Utc::now();

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subscribers = self.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(update.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!(
                            subscriber = %id,
                            queue_id = update.queue_id,
                            "Subscriber mailbox full, dropping progress update"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.write();
            for id in closed {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    /// Broadcast a snapshot of the job's current state
    pub fn broadcast_from_job(&self, job: &Job, message: impl Into<String>) -> usize {
        self.broadcast(ProgressUpdate::from_job(job, message))
    }

    /// Number of registered subscribers
    pub fn client_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, mpsc::Sender<ProgressUpdate>>> {
        self.subscribers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, mpsc::Sender<ProgressUpdate>>> {
        self.subscribers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
