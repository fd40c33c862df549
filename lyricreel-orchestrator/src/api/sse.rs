//! GET /events - job progress as Server-Sent Events
//!
//! Each connected client gets its own broadcaster subscription, released
//! when the client disconnects.

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

pub async fn progress_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    lyricreel_common::sse::progress_sse_stream(state.broadcaster.clone())
}
