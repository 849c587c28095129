use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::reservation::Reservation;
use crate::seat::{Seat, SeatSlot};
use crate::transition::{TransitionOutcome, TransitionRequest};
use crate::InventoryResult;

/// Persistent store for seats and reservations.
///
/// All seat mutation goes through [`InventoryStore::transition`] or
/// [`InventoryStore::sweep_expired`]; implementations must re-check each row's
/// current state inside the same atomic step that writes it.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inserts the slots that do not exist yet. Returns how many rows were added.
    async fn insert_missing_seats(
        &self,
        trip_id: Uuid,
        slots: &[SeatSlot],
        now: DateTime<Utc>,
    ) -> InventoryResult<usize>;

    /// Raw rows ordered by seat number. Expired holds are returned as stored.
    async fn list_seats(&self, trip_id: Uuid) -> InventoryResult<Vec<Seat>>;

    /// Locks the requested seats (and reservation), evaluates the decision for
    /// every seat and writes all changes or none.
    async fn transition(&self, request: TransitionRequest<'_>) -> InventoryResult<TransitionOutcome>;

    /// Conditionally frees every hold whose expiry is at or before `now`.
    /// Returns the freed seats.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> InventoryResult<Vec<Seat>>;

    async fn insert_reservation(&self, reservation: &Reservation) -> InventoryResult<()>;

    async fn get_reservation(&self, id: Uuid) -> InventoryResult<Option<Reservation>>;
}
