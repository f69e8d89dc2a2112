use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use domain::AnalysisEvent;
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct EventFilter {
    /// Only events for this thread url when set.
    pub url: Option<String>,
}

fn event_name(event: &AnalysisEvent) -> &'static str {
    match event {
        AnalysisEvent::Started { .. } => "started",
        AnalysisEvent::CacheHit { .. } => "cache_hit",
        AnalysisEvent::Eli5Patched { .. } => "eli5_patched",
        AnalysisEvent::Completed { .. } => "completed",
        AnalysisEvent::Failed { .. } => "failed",
    }
}

pub async fn sse_handler(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.tx_events.subscribe();
    tracing::info!("SSE Connected: url={:?}", filter.url);

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        // Lagged receivers just skip what they missed.
        let event = result.ok()?;
        if filter.url.as_deref().is_some_and(|url| url != event.url()) {
            return None;
        }
        Some(
            Event::default()
                .event(event_name(&event))
                .json_data(&event)
                .map_err(|e| {
                    tracing::error!("SSE serialization error: {}", e);
                    axum::Error::new(e)
                }),
        )
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15)))
}
