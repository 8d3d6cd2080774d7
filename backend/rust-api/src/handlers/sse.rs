use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use crate::extractors::Session;
use crate::metrics::SSE_CONNECTIONS_ACTIVE;
use crate::services::{change_feed::dashboard_stream, AppState};

/// Keeps the active-connection gauge in step with the stream's lifetime.
struct ConnectionGuard {
    user_id: String,
}

impl ConnectionGuard {
    fn new(user_id: &str) -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self {
            user_id: user_id.to_string(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
        tracing::info!("Dashboard stream closed: user={}", self.user_id);
    }
}

/// GET /api/v1/dashboard/stream
///
/// One `dashboard-snapshot` event on connect and one after every profile or
/// attempt-log change. Read failures are sent as `dashboard-error` events and
/// the stream stays open.
pub async fn dashboard_events(
    State(state): State<Arc<AppState>>,
    Session(ctx): Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("Client connected to dashboard stream: user={}", ctx.user_id);

    let guard = ConnectionGuard::new(&ctx.user_id);
    let snapshots = dashboard_stream(state.store.clone(), &state.feed, ctx.user_id);

    let events = snapshots.map(move |snapshot| {
        let _connection = &guard;
        let event = match snapshot {
            Ok(snapshot) => Event::default()
                .event(snapshot.event_name())
                .data(snapshot.to_sse_data()),
            Err(e) => {
                tracing::warn!("Dashboard snapshot failed: {}", e);
                Event::default()
                    .event("dashboard-error")
                    .data(serde_json::json!({ "message": e.to_string() }).to_string())
            }
        };
        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
