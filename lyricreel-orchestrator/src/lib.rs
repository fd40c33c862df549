//! lyricreel-orchestrator library interface
//!
//! Queue worker, five-phase processor and the media pipeline it drives.
//! Exposed as a library so integration tests can assemble the pipeline
//! with fakes.

pub mod api;
pub mod lyrics;
pub mod processor;
pub mod render_log;
pub mod services;
pub mod video;
pub mod worker;

pub use processor::{Processor, ProcessorDeps};
pub use worker::{QueueWorker, WorkerOutcome};

use axum::Router;
use chrono::{DateTime, Utc};
use lyricreel_common::ProgressBroadcaster;
use tower_http::trace::TraceLayer;

/// State shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: ProgressBroadcaster,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(broadcaster: ProgressBroadcaster) -> Self {
        Self {
            broadcaster,
            startup_time: Utc::now(),
        }
    }
}

/// `GET /health` and `GET /events`
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .route("/events", get(api::progress_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
