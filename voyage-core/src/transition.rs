use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::reservation::{Reservation, ReservationStatus};
use crate::seat::{Seat, SeatSlot, SeatStatus};
use crate::{InventoryError, InventoryResult};

/// Target state computed for one locked seat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatUpdate {
    Keep,
    Release,
    Hold {
        holder: String,
        until: DateTime<Utc>,
    },
    Occupy {
        holder: String,
        reservation_id: Option<Uuid>,
    },
}

impl SeatUpdate {
    /// New row to persist, or `None` when nothing changes.
    pub fn apply_to(&self, seat: &Seat, now: DateTime<Utc>) -> Option<Seat> {
        let next = match self {
            SeatUpdate::Keep => return None,
            SeatUpdate::Release => Seat {
                status: SeatStatus::Available,
                holder: None,
                held_until: None,
                reservation_id: None,
                updated_at: now,
                ..seat.clone()
            },
            SeatUpdate::Hold { holder, until } => Seat {
                status: SeatStatus::Held,
                holder: Some(holder.clone()),
                held_until: Some(*until),
                reservation_id: None,
                updated_at: now,
                ..seat.clone()
            },
            SeatUpdate::Occupy { holder, reservation_id } => Seat {
                status: SeatStatus::Occupied,
                holder: Some(holder.clone()),
                held_until: None,
                reservation_id: *reservation_id,
                updated_at: now,
                ..seat.clone()
            },
        };
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictReason {
    Occupied,
    HeldByOther,
    NotHeld,
    BoundToReservation,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConflictReason::Occupied => "is occupied",
            ConflictReason::HeldByOther => "is held by another holder",
            ConflictReason::NotHeld => "is not held by the requester",
            ConflictReason::BoundToReservation => "is bound to a reservation",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatConflict {
    pub seat_number: u32,
    pub reason: ConflictReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatRejection {
    Conflict(ConflictReason),
    Forbidden(String),
}

/// Pure rule evaluated against each seat while the store holds its lock.
pub type SeatDecision<'a> = dyn Fn(&Seat) -> Result<SeatUpdate, SeatRejection> + Send + Sync + 'a;

/// Status change applied to an existing reservation together with its seats
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationPatch {
    pub reservation_id: Uuid,
    pub expected_status: ReservationStatus,
    pub status: ReservationStatus,
    pub seat_numbers: Vec<u32>,
}

impl ReservationPatch {
    pub fn apply_to(
        &self,
        current: &Reservation,
        trip_id: Uuid,
        now: DateTime<Utc>,
    ) -> InventoryResult<Reservation> {
        if current.trip_id != trip_id {
            return Err(InventoryError::Validation(format!(
                "reservation {} does not belong to trip {}",
                current.id, trip_id
            )));
        }
        if current.status != self.expected_status {
            return Err(InventoryError::InvalidReservationState {
                id: current.id,
                status: current.status,
            });
        }
        if self.seat_numbers.len() as u32 > current.passenger_count {
            return Err(InventoryError::CapacityMismatch {
                expected: current.passenger_count,
                actual: self.seat_numbers.len() as u32,
            });
        }

        let mut next = current.clone();
        next.seat_numbers = self.seat_numbers.clone();
        next.update_status(self.status, now);
        Ok(next)
    }
}

/// Reservation row written in the same atomic step as the seats
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationWrite {
    Insert(Reservation),
    Update(ReservationPatch),
}

impl ReservationWrite {
    pub fn reservation_id(&self) -> Uuid {
        match self {
            ReservationWrite::Insert(reservation) => reservation.id,
            ReservationWrite::Update(patch) => patch.reservation_id,
        }
    }

    /// Validates the write against the locked row and returns what to persist.
    pub fn resolve(
        &self,
        current: Option<&Reservation>,
        trip_id: Uuid,
        now: DateTime<Utc>,
    ) -> InventoryResult<Reservation> {
        match (self, current) {
            (ReservationWrite::Insert(reservation), None) => {
                if reservation.trip_id != trip_id {
                    return Err(InventoryError::Validation(format!(
                        "reservation {} does not belong to trip {}",
                        reservation.id, trip_id
                    )));
                }
                if reservation.seat_numbers.len() as u32 > reservation.passenger_count {
                    return Err(InventoryError::CapacityMismatch {
                        expected: reservation.passenger_count,
                        actual: reservation.seat_numbers.len() as u32,
                    });
                }
                Ok(reservation.clone())
            }
            (ReservationWrite::Insert(reservation), Some(_)) => Err(InventoryError::Validation(
                format!("reservation {} already exists", reservation.id),
            )),
            (ReservationWrite::Update(patch), Some(current)) => patch.apply_to(current, trip_id, now),
            (ReservationWrite::Update(patch), None) => Err(InventoryError::NotFound(format!(
                "reservation {}",
                patch.reservation_id
            ))),
        }
    }
}

/// One all-or-nothing mutation of a trip's seats
pub struct TransitionRequest<'a> {
    pub trip_id: Uuid,
    pub seat_numbers: &'a [u32],
    pub now: DateTime<Utc>,
    pub decide: &'a SeatDecision<'a>,
    pub reservation: Option<ReservationWrite>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionOutcome {
    /// Every requested seat after the transition, ordered by seat number
    pub seats: Vec<Seat>,
    /// Only the rows that were written
    pub changed: Vec<Seat>,
    pub reservation: Option<Reservation>,
}

pub fn ensure_seats_present(trip_id: Uuid, requested: &[u32], found: &[Seat]) -> InventoryResult<()> {
    let missing: Vec<String> = requested
        .iter()
        .filter(|n| !found.iter().any(|seat| seat.seat_number == **n))
        .map(|n| n.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(InventoryError::NotFound(format!(
            "trip {} has no seat {}",
            trip_id,
            missing.join(", ")
        )))
    }
}

/// Layouts only grow: no stored seat may sit above the highest requested slot.
/// Stores call this while holding the lock they insert under.
pub fn ensure_layout_grows(
    trip_id: Uuid,
    slots: &[SeatSlot],
    highest_existing: Option<u32>,
) -> InventoryResult<()> {
    let layout = slots.iter().map(|slot| slot.seat_number).max().unwrap_or(0);
    match highest_existing {
        Some(highest) if highest > layout => Err(InventoryError::Validation(format!(
            "trip {} already has seat {}, cannot shrink layout to {}",
            trip_id, highest, layout
        ))),
        _ => Ok(()),
    }
}

/// Runs the decision over every locked seat. Any rejection rejects the whole batch:
/// `Forbidden` wins over `Conflict`, and conflicts list every blocked seat.
pub fn settle(
    seats: &[Seat],
    now: DateTime<Utc>,
    decide: &SeatDecision<'_>,
) -> InventoryResult<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();
    let mut conflicts = Vec::new();
    let mut forbidden: Option<String> = None;

    for seat in seats {
        match decide(seat) {
            Ok(update) => match update.apply_to(seat, now) {
                Some(next) => {
                    outcome.seats.push(next.clone());
                    outcome.changed.push(next);
                }
                None => outcome.seats.push(seat.observed(now)),
            },
            Err(SeatRejection::Conflict(reason)) => conflicts.push(SeatConflict {
                seat_number: seat.seat_number,
                reason,
            }),
            Err(SeatRejection::Forbidden(message)) => {
                forbidden.get_or_insert(format!("seat {}: {}", seat.seat_number, message));
            }
        }
    }

    if let Some(message) = forbidden {
        return Err(InventoryError::Forbidden(message));
    }
    if !conflicts.is_empty() {
        return Err(InventoryError::Conflict(conflicts));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seats(trip_id: Uuid, now: DateTime<Utc>) -> Vec<Seat> {
        (1..=3)
            .map(|n| Seat::new(trip_id, SeatSlot { seat_number: n, bus_id: None }, now))
            .collect()
    }

    #[test]
    fn test_layout_may_grow_but_not_shrink() {
        let trip_id = Uuid::new_v4();
        let slots: Vec<SeatSlot> = (1..=8)
            .map(|n| SeatSlot { seat_number: n, bus_id: None })
            .collect();

        assert!(ensure_layout_grows(trip_id, &slots, None).is_ok());
        assert!(ensure_layout_grows(trip_id, &slots, Some(8)).is_ok());
        assert!(matches!(
            ensure_layout_grows(trip_id, &slots, Some(10)),
            Err(InventoryError::Validation(_))
        ));
    }

    #[test]
    fn test_settle_collects_every_conflict() {
        let now = Utc::now();
        let trip_id = Uuid::new_v4();
        let decide = |seat: &Seat| -> Result<SeatUpdate, SeatRejection> {
            if seat.seat_number == 2 {
                Ok(SeatUpdate::Keep)
            } else {
                Err(SeatRejection::Conflict(ConflictReason::Occupied))
            }
        };

        let err = settle(&seats(trip_id, now), now, &decide).unwrap_err();
        assert_eq!(err.conflicting_seats(), vec![1, 3]);
    }

    #[test]
    fn test_settle_prefers_forbidden_over_conflict() {
        let now = Utc::now();
        let decide = |seat: &Seat| -> Result<SeatUpdate, SeatRejection> {
            match seat.seat_number {
                1 => Err(SeatRejection::Conflict(ConflictReason::HeldByOther)),
                _ => Err(SeatRejection::Forbidden("not yours".to_string())),
            }
        };

        let err = settle(&seats(Uuid::new_v4(), now), now, &decide).unwrap_err();
        assert!(matches!(err, InventoryError::Forbidden(msg) if msg == "seat 2: not yours"));
    }

    #[test]
    fn test_settle_reports_only_written_rows_as_changed() {
        let now = Utc::now();
        let until = now + Duration::minutes(15);
        let decide = move |seat: &Seat| -> Result<SeatUpdate, SeatRejection> {
            if seat.seat_number == 3 {
                Ok(SeatUpdate::Keep)
            } else {
                Ok(SeatUpdate::Hold { holder: "user-a".to_string(), until })
            }
        };

        let outcome = settle(&seats(Uuid::new_v4(), now), now, &decide).unwrap();
        assert_eq!(outcome.seats.len(), 3);
        assert_eq!(outcome.changed.len(), 2);
        assert!(outcome.changed.iter().all(|s| s.status == SeatStatus::Held));
        assert_eq!(outcome.seats[2].status, SeatStatus::Available);
    }

    #[test]
    fn test_missing_seats_are_named() {
        let now = Utc::now();
        let trip_id = Uuid::new_v4();
        let err = ensure_seats_present(trip_id, &[2, 9, 12], &seats(trip_id, now)).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(msg) if msg.ends_with("no seat 9, 12")));
    }

    #[test]
    fn test_patch_checks_expected_status() {
        let now = Utc::now();
        let trip_id = Uuid::new_v4();
        let mut reservation = Reservation::new(trip_id, "user-a".to_string(), 2, vec![1, 2], now);
        reservation.update_status(ReservationStatus::Cancelled, now);

        let patch = ReservationPatch {
            reservation_id: reservation.id,
            expected_status: ReservationStatus::Pending,
            status: ReservationStatus::Paid,
            seat_numbers: vec![1, 2],
        };

        let err = patch.apply_to(&reservation, trip_id, now).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InvalidReservationState { status: ReservationStatus::Cancelled, .. }
        ));
    }

    #[test]
    fn test_insert_rejects_more_seats_than_passengers() {
        let now = Utc::now();
        let trip_id = Uuid::new_v4();
        let reservation = Reservation::new(trip_id, "user-a".to_string(), 1, vec![1, 2], now);

        let err = ReservationWrite::Insert(reservation)
            .resolve(None, trip_id, now)
            .unwrap_err();
        assert!(matches!(err, InventoryError::CapacityMismatch { expected: 1, actual: 2 }));
    }
}
