use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::seat::Seat;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatEventKind {
    Held,
    Released,
    Occupied,
    Expired,
}

impl SeatEventKind {
    pub fn topic(&self) -> &'static str {
        match self {
            SeatEventKind::Held => "seats.held",
            SeatEventKind::Released => "seats.released",
            SeatEventKind::Occupied => "seats.occupied",
            SeatEventKind::Expired => "seats.expired",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeatEvent {
    pub trip_id: Uuid,
    pub seat_number: u32,
    pub kind: SeatEventKind,
    pub holder: Option<String>,
    pub held_until: Option<DateTime<Utc>>,
    pub reservation_id: Option<Uuid>,
    pub occurred_at: i64,
}

impl SeatEvent {
    pub fn from_seat(seat: &Seat, kind: SeatEventKind, now: DateTime<Utc>) -> Self {
        Self {
            trip_id: seat.trip_id,
            seat_number: seat.seat_number,
            kind,
            holder: seat.holder.clone(),
            held_until: seat.held_until,
            reservation_id: seat.reservation_id,
            occurred_at: now.timestamp(),
        }
    }
}

/// Outbound sink for seat lifecycle changes (SSE fan-out, Kafka, ...)
#[async_trait]
pub trait SeatEventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: &SeatEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
