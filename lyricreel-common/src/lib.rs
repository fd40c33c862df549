//! # LyricReel Common Library
//!
//! Shared code for the LyricReel orchestrator including:
//! - Job and song models
//! - Error type used across crates
//! - Configuration loading and storage layout
//! - Progress broadcaster and SSE helpers
//! - SQLite repositories

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod progress;
pub mod sse;

pub use error::{Error, Result};
pub use progress::{ProgressBroadcaster, ProgressUpdate};
