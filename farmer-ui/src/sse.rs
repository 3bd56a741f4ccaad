//! Server-Sent Events stream of status snapshots.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::state::BridgeState;

/// One `status` event carrying the JSON projection.
pub fn status_event(state: &BridgeState) -> Option<Event> {
    match serde_json::to_string(&state.report()) {
        Ok(json) => Some(Event::default().event("status").data(json)),
        Err(err) => {
            warn!(error = %err, "status projection did not serialize");
            None
        }
    }
}

/// SSE endpoint handler: a `status` event every refresh interval.
pub async fn events_handler(
    State(state): State<BridgeState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        let mut tick = tokio::time::interval(state.refresh);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if let Some(event) = status_event(&state) {
                yield Ok(event);
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
