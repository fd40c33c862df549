//! Data models shared by the worker, processor and repositories

pub mod job;
pub mod song;

pub use job::{Job, JobStatus};
pub use song::{Song, VocalSegment};
