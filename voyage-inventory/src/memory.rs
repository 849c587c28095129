use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;
use voyage_core::transition::{ensure_layout_grows, ensure_seats_present, settle, SeatUpdate};
use voyage_core::{
    InventoryError, InventoryResult, InventoryStore, Reservation, Seat, SeatSlot, TransitionOutcome,
    TransitionRequest,
};

#[derive(Default)]
struct Tables {
    seats: BTreeMap<(Uuid, u32), Seat>,
    reservations: HashMap<Uuid, Reservation>,
}

/// In-process inventory store.
///
/// A single async mutex serializes every transition, so a decision always sees
/// the latest state of the seats it is about to write.
#[derive(Default)]
pub struct MemoryInventoryStore {
    tables: Mutex<Tables>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn insert_missing_seats(
        &self,
        trip_id: Uuid,
        slots: &[SeatSlot],
        now: DateTime<Utc>,
    ) -> InventoryResult<usize> {
        let mut tables = self.tables.lock().await;
        let highest = tables
            .seats
            .range((trip_id, 0)..=(trip_id, u32::MAX))
            .next_back()
            .map(|((_, seat_number), _)| *seat_number);
        ensure_layout_grows(trip_id, slots, highest)?;

        let mut inserted = 0;
        for slot in slots {
            tables
                .seats
                .entry((trip_id, slot.seat_number))
                .or_insert_with(|| {
                    inserted += 1;
                    Seat::new(trip_id, *slot, now)
                });
        }

        Ok(inserted)
    }

    async fn list_seats(&self, trip_id: Uuid) -> InventoryResult<Vec<Seat>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .seats
            .range((trip_id, 0)..=(trip_id, u32::MAX))
            .map(|(_, seat)| seat.clone())
            .collect())
    }

    async fn transition(&self, request: TransitionRequest<'_>) -> InventoryResult<TransitionOutcome> {
        let mut tables = self.tables.lock().await;

        let mut numbers = request.seat_numbers.to_vec();
        numbers.sort_unstable();
        numbers.dedup();

        let seats: Vec<Seat> = numbers
            .iter()
            .filter_map(|n| tables.seats.get(&(request.trip_id, *n)).cloned())
            .collect();
        ensure_seats_present(request.trip_id, &numbers, &seats)?;

        let reservation = request
            .reservation
            .as_ref()
            .map(|write| {
                let current = tables.reservations.get(&write.reservation_id());
                write.resolve(current, request.trip_id, request.now)
            })
            .transpose()?;

        let mut outcome = settle(&seats, request.now, request.decide)?;

        // Nothing has been written yet; from here on every step is infallible.
        for seat in &outcome.changed {
            tables.seats.insert((seat.trip_id, seat.seat_number), seat.clone());
        }
        if let Some(reservation) = &reservation {
            tables.reservations.insert(reservation.id, reservation.clone());
        }

        outcome.reservation = reservation;
        Ok(outcome)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> InventoryResult<Vec<Seat>> {
        let mut tables = self.tables.lock().await;
        let mut freed = Vec::new();

        for seat in tables.seats.values_mut() {
            if seat.hold_expired(now) {
                if let Some(next) = SeatUpdate::Release.apply_to(seat, now) {
                    *seat = next;
                    freed.push(seat.clone());
                }
            }
        }

        Ok(freed)
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> InventoryResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.reservations.contains_key(&reservation.id) {
            return Err(InventoryError::Validation(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }
        tables.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> InventoryResult<Option<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables.reservations.get(&id).cloned())
    }
}
