use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reservation state of a single seat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Occupied,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Occupied => "OCCUPIED",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "HELD" => Ok(SeatStatus::Held),
            "OCCUPIED" => Ok(SeatStatus::Occupied),
            other => Err(format!("unknown seat status: {}", other)),
        }
    }
}

/// Position to materialize when a trip layout is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatSlot {
    pub seat_number: u32,
    pub bus_id: Option<Uuid>,
}

/// One physical seat on one trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub trip_id: Uuid,
    pub seat_number: u32,
    pub bus_id: Option<Uuid>,
    pub status: SeatStatus,
    /// Session or user that holds (or occupies) the seat
    pub holder: Option<String>,
    /// Present only while `status` is `Held`
    pub held_until: Option<DateTime<Utc>>,
    pub reservation_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    pub fn new(trip_id: Uuid, slot: SeatSlot, now: DateTime<Utc>) -> Self {
        Self {
            trip_id,
            seat_number: slot.seat_number,
            bus_id: slot.bus_id,
            status: SeatStatus::Available,
            holder: None,
            held_until: None,
            reservation_id: None,
            updated_at: now,
        }
    }

    /// A hold is void once `held_until` is reached, whether or not it was swept.
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Held && self.held_until.map_or(true, |until| until <= now)
    }

    /// Holder of a hold that is still in force.
    pub fn live_holder(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.status == SeatStatus::Held && !self.hold_expired(now) {
            self.holder.as_deref()
        } else {
            None
        }
    }

    pub fn is_held_by(&self, holder: &str, now: DateTime<Utc>) -> bool {
        self.live_holder(now) == Some(holder)
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.hold_expired(now) {
            SeatStatus::Available
        } else {
            self.status
        }
    }

    /// The seat as callers must see it: a lapsed hold reads as available.
    pub fn observed(&self, now: DateTime<Utc>) -> Seat {
        if !self.hold_expired(now) {
            return self.clone();
        }
        Seat {
            status: SeatStatus::Available,
            holder: None,
            held_until: None,
            reservation_id: None,
            ..self.clone()
        }
    }
}
