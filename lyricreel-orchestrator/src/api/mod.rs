//! HTTP surface: health check and progress event stream

pub mod health;
pub mod sse;

pub use health::health_routes;
pub use sse::progress_events;
