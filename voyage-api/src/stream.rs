use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;
use voyage_core::{SeatEvent, SeatEventPublisher};

use crate::state::AppState;

/// Fans seat events out to every open SSE stream.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<SeatEvent>,
}

impl BroadcastPublisher {
    pub fn new(tx: broadcast::Sender<SeatEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SeatEventPublisher for BroadcastPublisher {
    async fn publish(
        &self,
        event: &SeatEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// GET /v1/trips/{trip_id}/stream
pub async fn trip_stream(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    // Lagged receivers skip what they missed; clients re-read the seat map.
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.trip_id == trip_id => Event::default()
            .event(event.kind.topic())
            .json_data(&event)
            .ok()
            .map(Ok),
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
