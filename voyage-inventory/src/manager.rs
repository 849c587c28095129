use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voyage_core::{
    Actor, Clock, InventoryError, InventoryResult, InventoryStore, Reservation, ReservationPatch,
    ReservationStatus, ReservationWrite, Seat, SeatDecision, SeatEvent, SeatEventKind,
    SeatEventPublisher, SeatSlot, SeatStatus, TransitionOutcome, TransitionRequest,
};

use crate::policy;

/// Upper bound on a single trip layout
pub const MAX_SEATS_PER_TRIP: u32 = 10_000;

/// Seat counts for one trip, computed from the expiry-aware view
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SeatAvailability {
    pub total: u32,
    pub available: u32,
    pub held: u32,
    pub occupied: u32,
}

/// Authoritative owner of seat state for every trip.
///
/// Every mutation is a single [`InventoryStore::transition`]: the store locks the
/// affected rows, the rules in [`crate::policy`] decide against what is actually
/// stored, and either all rows change or none do.
pub struct SeatInventoryManager {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    publishers: Vec<Arc<dyn SeatEventPublisher>>,
}

impl SeatInventoryManager {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            publishers: Vec::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn SeatEventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn store(&self) -> &dyn InventoryStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Guarantees seats `1..=seat_count` exist for the trip. Idempotent.
    pub async fn ensure_layout(&self, trip_id: Uuid, seat_count: u32) -> InventoryResult<usize> {
        check_layout_size(Some(seat_count))?;
        let slots = (1..=seat_count)
            .map(|seat_number| SeatSlot { seat_number, bus_id: None })
            .collect();
        self.materialize(trip_id, slots).await
    }

    /// Lays out a trip that spans several buses. Numbering continues from one
    /// bus to the next in the order given.
    pub async fn ensure_fleet_layout(
        &self,
        trip_id: Uuid,
        buses: &[(Uuid, u32)],
    ) -> InventoryResult<usize> {
        if let Some((bus_id, _)) = buses.iter().find(|(_, seats)| *seats == 0) {
            return Err(InventoryError::Validation(format!("bus {} has no seats", bus_id)));
        }
        let total = buses
            .iter()
            .try_fold(0u32, |acc, (_, seats)| acc.checked_add(*seats));
        let total = check_layout_size(total)?;

        let mut slots = Vec::with_capacity(total as usize);
        let mut seat_number = 1;
        for (bus_id, seats) in buses {
            for _ in 0..*seats {
                slots.push(SeatSlot {
                    seat_number,
                    bus_id: Some(*bus_id),
                });
                seat_number += 1;
            }
        }

        self.materialize(trip_id, slots).await
    }

    async fn materialize(&self, trip_id: Uuid, slots: Vec<SeatSlot>) -> InventoryResult<usize> {
        // The store refuses to shrink an existing layout under its own lock.
        let inserted = self
            .store
            .insert_missing_seats(trip_id, &slots, self.now())
            .await?;

        if inserted > 0 {
            info!("Materialized {} seats for trip {} (layout of {})", inserted, trip_id, slots.len());
        }
        Ok(inserted)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Snapshot of every seat, ordered by seat number. Lapsed holds read as available.
    pub async fn list_seats(&self, trip_id: Uuid) -> InventoryResult<Vec<Seat>> {
        let now = self.now();
        let seats = self.store.list_seats(trip_id).await?;

        if seats.is_empty() {
            return Err(InventoryError::NotFound(format!("trip {}", trip_id)));
        }
        Ok(seats.iter().map(|seat| seat.observed(now)).collect())
    }

    pub async fn availability(&self, trip_id: Uuid) -> InventoryResult<SeatAvailability> {
        let seats = self.list_seats(trip_id).await?;

        Ok(seats.iter().fold(SeatAvailability::default(), |mut acc, seat| {
            acc.total += 1;
            match seat.status {
                SeatStatus::Available => acc.available += 1,
                SeatStatus::Held => acc.held += 1,
                SeatStatus::Occupied => acc.occupied += 1,
            }
            acc
        }))
    }

    pub async fn load_reservation(&self, reservation_id: Uuid) -> InventoryResult<Reservation> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("reservation {}", reservation_id)))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// available (or lapsed hold) -> held until `now + ttl`.
    /// Re-holding a seat the actor already holds extends the hold.
    pub async fn hold_seat(
        &self,
        trip_id: Uuid,
        seat_number: u32,
        actor: &Actor,
        ttl: Duration,
    ) -> InventoryResult<Seat> {
        if ttl <= Duration::zero() {
            return Err(InventoryError::Validation("hold ttl must be positive".to_string()));
        }

        let now = self.now();
        let until = now
            .checked_add_signed(ttl)
            .ok_or_else(|| InventoryError::Validation(format!("hold ttl {} is out of range", ttl)))?;
        let decide = |seat: &Seat| policy::hold(seat, actor, until, now);

        let outcome = self.apply(trip_id, &[seat_number], now, &decide, None).await?;
        debug!("Seat {}/{} held by {} until {}", trip_id, seat_number, actor.id, until);
        single_seat(outcome, trip_id, seat_number)
    }

    /// held -> available. Releasing a free seat is a no-op.
    pub async fn release_seat(
        &self,
        trip_id: Uuid,
        seat_number: u32,
        actor: &Actor,
    ) -> InventoryResult<Seat> {
        let now = self.now();
        let decide = |seat: &Seat| policy::release(seat, actor, now);

        let outcome = self.apply(trip_id, &[seat_number], now, &decide, None).await?;
        single_seat(outcome, trip_id, seat_number)
    }

    /// held by the actor -> occupied, for every listed seat or none of them.
    pub async fn confirm_seats(
        &self,
        trip_id: Uuid,
        seat_numbers: &[u32],
        actor: &Actor,
    ) -> InventoryResult<Vec<Seat>> {
        validate_seat_list(seat_numbers)?;

        let now = self.now();
        let bypass = actor.can_bypass_hold_ownership();
        let decide = |seat: &Seat| policy::confirm(seat, &actor.id, bypass, None, now);

        let outcome = self.apply(trip_id, seat_numbers, now, &decide, None).await?;
        info!("Confirmed seats {:?} on trip {} for {}", seat_numbers, trip_id, actor.id);
        Ok(outcome.seats)
    }

    /// Moves a paid reservation onto a new seat set in one atomic swap.
    pub async fn reallocate_seats(
        &self,
        reservation_id: Uuid,
        new_seat_numbers: &[u32],
        actor: &Actor,
    ) -> InventoryResult<Reservation> {
        if !actor.can_manage_reservations() {
            return Err(InventoryError::Forbidden(format!(
                "{} may not reallocate reservations",
                actor.id
            )));
        }

        let reservation = self.load_reservation(reservation_id).await?;
        if new_seat_numbers.len() as u32 != reservation.passenger_count {
            return Err(InventoryError::CapacityMismatch {
                expected: reservation.passenger_count,
                actual: new_seat_numbers.len() as u32,
            });
        }
        validate_seat_list(new_seat_numbers)?;
        if reservation.status != ReservationStatus::Paid {
            return Err(InventoryError::InvalidReservationState {
                id: reservation.id,
                status: reservation.status,
            });
        }

        let targets: BTreeSet<u32> = new_seat_numbers.iter().copied().collect();
        let affected: Vec<u32> = reservation
            .seat_numbers
            .iter()
            .chain(new_seat_numbers)
            .copied()
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect();

        let now = self.now();
        let decide = |seat: &Seat| {
            if targets.contains(&seat.seat_number) {
                policy::occupy_for(seat, &reservation, now)
            } else {
                policy::vacate_for(seat, &reservation)
            }
        };
        let patch = ReservationPatch {
            reservation_id,
            expected_status: ReservationStatus::Paid,
            status: ReservationStatus::Paid,
            seat_numbers: new_seat_numbers.to_vec(),
        };

        let outcome = self
            .apply(
                reservation.trip_id,
                &affected,
                now,
                &decide,
                Some(ReservationWrite::Update(patch)),
            )
            .await?;

        info!(
            "Reservation {} reallocated from {:?} to {:?} by {}",
            reservation_id, reservation.seat_numbers, new_seat_numbers, actor.id
        );
        outcome.reservation.ok_or_else(|| {
            InventoryError::StoreUnavailable(format!("store dropped reservation {}", reservation_id))
        })
    }

    /// Frees every lapsed hold. Safe to run alongside any other transition.
    pub async fn sweep_expired_holds(&self) -> InventoryResult<usize> {
        let now = self.now();
        let freed = self.store.sweep_expired(now).await?;

        if !freed.is_empty() {
            info!("Swept {} expired seat holds", freed.len());
            for seat in &freed {
                self.publish(SeatEvent::from_seat(seat, SeatEventKind::Expired, now)).await;
            }
        }
        Ok(freed.len())
    }

    /// Runs one atomic store transition and announces the rows it wrote.
    /// Every seat mutation in the workspace funnels through here.
    pub async fn apply(
        &self,
        trip_id: Uuid,
        seat_numbers: &[u32],
        now: DateTime<Utc>,
        decide: &SeatDecision<'_>,
        reservation: Option<ReservationWrite>,
    ) -> InventoryResult<TransitionOutcome> {
        let result = self
            .store
            .transition(TransitionRequest {
                trip_id,
                seat_numbers,
                now,
                decide,
                reservation,
            })
            .await;

        match &result {
            Err(InventoryError::Conflict(conflicts)) => {
                debug!("Seat transition on trip {} rejected: {:?}", trip_id, conflicts);
            }
            Err(InventoryError::StoreUnavailable(e)) => {
                warn!("Seat transition on trip {} failed in store: {}", trip_id, e);
            }
            _ => {}
        }

        let outcome = result?;
        for seat in &outcome.changed {
            let kind = match seat.status {
                SeatStatus::Available => SeatEventKind::Released,
                SeatStatus::Held => SeatEventKind::Held,
                SeatStatus::Occupied => SeatEventKind::Occupied,
            };
            self.publish(SeatEvent::from_seat(seat, kind, now)).await;
        }
        Ok(outcome)
    }

    /// Best effort; a failing sink never fails the caller.
    async fn publish(&self, event: SeatEvent) {
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(&event).await {
                warn!(
                    "Failed to publish {:?} for seat {}/{}: {}",
                    event.kind, event.trip_id, event.seat_number, e
                );
            }
        }
    }
}

/// `None` means the requested total overflowed.
fn check_layout_size(seat_count: Option<u32>) -> InventoryResult<u32> {
    match seat_count {
        Some(count) if (1..=MAX_SEATS_PER_TRIP).contains(&count) => Ok(count),
        Some(count) => Err(InventoryError::Validation(format!(
            "seat count must be between 1 and {}, got {}",
            MAX_SEATS_PER_TRIP, count
        ))),
        None => Err(InventoryError::Validation(format!(
            "seat count must be between 1 and {}",
            MAX_SEATS_PER_TRIP
        ))),
    }
}

/// Non-empty, positive and free of duplicates.
pub fn validate_seat_list(seat_numbers: &[u32]) -> InventoryResult<()> {
    if seat_numbers.is_empty() {
        return Err(InventoryError::Validation("no seats given".to_string()));
    }
    if seat_numbers.contains(&0) {
        return Err(InventoryError::Validation("seat numbers start at 1".to_string()));
    }
    let unique: BTreeSet<&u32> = seat_numbers.iter().collect();
    if unique.len() != seat_numbers.len() {
        return Err(InventoryError::Validation("duplicate seat numbers".to_string()));
    }
    Ok(())
}

fn single_seat(outcome: TransitionOutcome, trip_id: Uuid, seat_number: u32) -> InventoryResult<Seat> {
    outcome
        .seats
        .into_iter()
        .next()
        .ok_or_else(|| InventoryError::NotFound(format!("trip {} has no seat {}", trip_id, seat_number)))
}
