pub mod actor;
pub mod clock;
pub mod events;
pub mod repository;
pub mod reservation;
pub mod seat;
pub mod transition;

pub use actor::{Actor, Capability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{SeatEvent, SeatEventKind, SeatEventPublisher};
pub use repository::InventoryStore;
pub use reservation::{Reservation, ReservationStatus};
pub use seat::{Seat, SeatSlot, SeatStatus};
pub use transition::{
    ConflictReason, ReservationPatch, ReservationWrite, SeatConflict, SeatDecision, SeatRejection,
    SeatUpdate, TransitionOutcome, TransitionRequest,
};

use uuid::Uuid;

/// Errors surfaced by every seat and reservation operation.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Seat conflict: {}", describe_conflicts(.0))]
    Conflict(Vec<SeatConflict>),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Capacity mismatch: expected {expected} seats, got {actual}")]
    CapacityMismatch {
        expected: u32,
        actual: u32,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Reservation {id} is {status}")]
    InvalidReservationState {
        id: Uuid,
        status: ReservationStatus,
    },
}

impl InventoryError {
    /// Only store outages are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::StoreUnavailable(_))
    }

    /// Seats that blocked the request, empty for non-conflict errors.
    pub fn conflicting_seats(&self) -> Vec<u32> {
        match self {
            InventoryError::Conflict(conflicts) => {
                conflicts.iter().map(|c| c.seat_number).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn describe_conflicts(conflicts: &[SeatConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("seat {} {}", c.seat_number, c.reason))
        .collect::<Vec<String>>()
        .join(", ")
}

pub type InventoryResult<T> = Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_lists_every_seat() {
        let err = InventoryError::Conflict(vec![
            SeatConflict { seat_number: 1, reason: ConflictReason::Occupied },
            SeatConflict { seat_number: 4, reason: ConflictReason::HeldByOther },
        ]);

        assert_eq!(
            err.to_string(),
            "Seat conflict: seat 1 is occupied, seat 4 is held by another holder"
        );
        assert_eq!(err.conflicting_seats(), vec![1, 4]);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_outage_is_retryable() {
        let err = InventoryError::StoreUnavailable("connection reset".to_string());
        assert!(err.is_retryable());
        assert!(err.conflicting_seats().is_empty());
    }
}
