//! Per-seat transition rules.
//!
//! Each function looks at one seat as it currently stands (inside the store's
//! critical section) and decides what it becomes. Nothing here touches storage.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use voyage_core::{Actor, ConflictReason, Reservation, Seat, SeatRejection, SeatStatus, SeatUpdate};

pub type Decision = Result<SeatUpdate, SeatRejection>;

/// available, lapsed hold or the actor's own hold -> held until `until`
pub fn hold(seat: &Seat, actor: &Actor, until: DateTime<Utc>, now: DateTime<Utc>) -> Decision {
    if seat.status == SeatStatus::Occupied {
        return Err(SeatRejection::Conflict(ConflictReason::Occupied));
    }

    match seat.live_holder(now) {
        Some(holder) if holder != actor.id && !actor.can_bypass_hold_ownership() => {
            Err(SeatRejection::Conflict(ConflictReason::HeldByOther))
        }
        _ => Ok(SeatUpdate::Hold {
            holder: actor.id.clone(),
            until,
        }),
    }
}

pub fn release(seat: &Seat, actor: &Actor, now: DateTime<Utc>) -> Decision {
    match seat.status {
        SeatStatus::Available => Ok(SeatUpdate::Keep),
        SeatStatus::Held if seat.hold_expired(now) => Ok(SeatUpdate::Release),
        SeatStatus::Held => {
            if seat.holder.as_deref() == Some(actor.id.as_str()) || actor.can_bypass_hold_ownership() {
                Ok(SeatUpdate::Release)
            } else {
                Err(SeatRejection::Forbidden("held by another holder".to_string()))
            }
        }
        SeatStatus::Occupied => {
            if !actor.can_bypass_hold_ownership() {
                Err(SeatRejection::Forbidden(
                    "occupied seats can only be released by an administrator".to_string(),
                ))
            } else if seat.reservation_id.is_some() {
                // Reservation seats move through reallocation or cancellation.
                Err(SeatRejection::Conflict(ConflictReason::BoundToReservation))
            } else {
                Ok(SeatUpdate::Release)
            }
        }
    }
}

/// held by `holder` -> occupied. With `bypass`, free or foreign-held seats too.
pub fn confirm(
    seat: &Seat,
    holder: &str,
    bypass: bool,
    reservation_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Decision {
    if seat.status == SeatStatus::Occupied {
        return if seat.holder.as_deref() == Some(holder) && seat.reservation_id == reservation_id {
            Ok(SeatUpdate::Keep)
        } else {
            Err(SeatRejection::Conflict(ConflictReason::Occupied))
        };
    }

    match seat.live_holder(now) {
        Some(current) if current == holder || bypass => Ok(SeatUpdate::Occupy {
            holder: current.to_string(),
            reservation_id,
        }),
        Some(_) => Err(SeatRejection::Conflict(ConflictReason::HeldByOther)),
        None if bypass => Ok(SeatUpdate::Occupy {
            holder: holder.to_string(),
            reservation_id,
        }),
        None => Err(SeatRejection::Conflict(ConflictReason::NotHeld)),
    }
}

/// Checkout submission only references seats the customer still holds.
pub fn require_hold(seat: &Seat, holder: &str, now: DateTime<Utc>) -> Decision {
    if seat.is_held_by(holder, now) {
        Ok(SeatUpdate::Keep)
    } else if seat.status == SeatStatus::Occupied {
        Err(SeatRejection::Conflict(ConflictReason::Occupied))
    } else if seat.live_holder(now).is_some() {
        Err(SeatRejection::Conflict(ConflictReason::HeldByOther))
    } else {
        Err(SeatRejection::Conflict(ConflictReason::NotHeld))
    }
}

pub fn drop_hold(seat: &Seat, holder: &str, now: DateTime<Utc>) -> Decision {
    if seat.is_held_by(holder, now) {
        Ok(SeatUpdate::Release)
    } else {
        Ok(SeatUpdate::Keep)
    }
}

/// Seats confirmed before the reservation existed carry no reservation id;
/// those count as the reservation's when the occupant matches.
pub fn occupied_by(seat: &Seat, reservation: &Reservation) -> bool {
    seat.status == SeatStatus::Occupied
        && match seat.reservation_id {
            Some(id) => id == reservation.id,
            None => seat.holder.as_deref() == Some(reservation.holder.as_str()),
        }
}

/// Seat a reservation is moving onto
pub fn occupy_for(seat: &Seat, reservation: &Reservation, now: DateTime<Utc>) -> Decision {
    if occupied_by(seat, reservation) {
        return Ok(SeatUpdate::Occupy {
            holder: reservation.holder.clone(),
            reservation_id: Some(reservation.id),
        });
    }
    if seat.status == SeatStatus::Occupied {
        return Err(SeatRejection::Conflict(ConflictReason::Occupied));
    }

    match seat.live_holder(now) {
        Some(holder) if holder != reservation.holder => {
            Err(SeatRejection::Conflict(ConflictReason::HeldByOther))
        }
        _ => Ok(SeatUpdate::Occupy {
            holder: reservation.holder.clone(),
            reservation_id: Some(reservation.id),
        }),
    }
}

/// Seat a reservation is leaving
pub fn vacate_for(seat: &Seat, reservation: &Reservation) -> Decision {
    if occupied_by(seat, reservation) {
        Ok(SeatUpdate::Release)
    } else {
        Ok(SeatUpdate::Keep)
    }
}
