//! Server-Sent Events (SSE) utilities
//!
//! Bridges the progress broadcaster to SSE clients.

use crate::progress::{ProgressBroadcaster, Subscription};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unsubscribes when the SSE stream is dropped (client disconnect)
struct SubscriptionGuard {
    broadcaster: ProgressBroadcaster,
    subscription: Subscription,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.subscription.id);
        debug!(subscriber = %self.subscription.id, "SSE client disconnected");
    }
}

/// SSE stream of progress updates for one client
///
/// # Example
/// ```rust,ignore
/// async fn progress_events(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     lyricreel_common::sse::progress_sse_stream(state.broadcaster.clone())
/// }
/// ```
pub fn progress_sse_stream(
    broadcaster: ProgressBroadcaster,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = broadcaster.subscribe();
    info!(
        subscriber = %subscription.id,
        clients = broadcaster.client_count(),
        "New SSE client connected to progress events"
    );

    let mut guard = SubscriptionGuard {
        broadcaster,
        subscription,
    };

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        while let Some(update) = guard.subscription.recv().await {
            match Event::default().event("progress").json_data(&update) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(error = %e, "Failed to encode progress event"),
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
