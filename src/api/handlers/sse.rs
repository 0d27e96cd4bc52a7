use crate::events::Event;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

#[derive(Debug, Deserialize)]
pub(crate) struct EventFilter {
    /// Only forward events of this run. Daemon errors are always forwarded.
    run_id: Option<i64>,
}

fn wanted(filter: Option<i64>, event: &Event) -> bool {
    match (filter, event.run_id()) {
        (Some(wanted), Some(run_id)) => wanted == run_id,
        _ => true,
    }
}

pub(crate) async fn sse_events(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_hub.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result: Result<Event, _>| {
        // Lagged subscribers just miss the skipped events.
        let event = result.ok().filter(|event| wanted(filter.run_id, event))?;
        let json = serde_json::to_string(&event).ok()?;
        Some(Ok(SseEvent::default().event(event.event_type()).data(json)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
