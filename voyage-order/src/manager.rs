use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use voyage_core::{
    Actor, InventoryError, InventoryResult, Reservation, ReservationPatch, ReservationStatus,
    ReservationWrite, Seat, TransitionOutcome,
};
use voyage_inventory::{policy, validate_seat_list, SeatInventoryManager};

/// Manages reservation lifecycle and the seat transitions that go with it.
///
/// PENDING -> PAID -> CANCELLED (admin only), or PENDING -> CANCELLED.
/// Every status change is written in the same atomic step as its seats.
pub struct ReservationManager {
    inventory: Arc<SeatInventoryManager>,
}

impl ReservationManager {
    pub fn new(inventory: Arc<SeatInventoryManager>) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &Arc<SeatInventoryManager> {
        &self.inventory
    }

    /// Records a checkout. Customers must still hold every listed seat; an
    /// administrator books directly and gets a paid reservation.
    pub async fn create_reservation(
        &self,
        trip_id: Uuid,
        actor: &Actor,
        passenger_count: u32,
        seat_numbers: Vec<u32>,
    ) -> InventoryResult<Reservation> {
        if passenger_count == 0 {
            return Err(InventoryError::Validation(
                "a reservation needs at least one passenger".to_string(),
            ));
        }
        if seat_numbers.len() as u32 > passenger_count {
            return Err(InventoryError::CapacityMismatch {
                expected: passenger_count,
                actual: seat_numbers.len() as u32,
            });
        }
        if !seat_numbers.is_empty() {
            validate_seat_list(&seat_numbers)?;
        }

        let now = self.inventory.now();
        let mut reservation =
            Reservation::new(trip_id, actor.id.clone(), passenger_count, seat_numbers.clone(), now);

        if actor.can_manage_reservations() {
            if seat_numbers.len() as u32 != passenger_count {
                return Err(InventoryError::CapacityMismatch {
                    expected: passenger_count,
                    actual: seat_numbers.len() as u32,
                });
            }

            reservation.update_status(ReservationStatus::Paid, now);
            let reservation_id = reservation.id;
            let decide =
                |seat: &Seat| policy::confirm(seat, &actor.id, true, Some(reservation_id), now);

            let outcome = self
                .inventory
                .apply(
                    trip_id,
                    &seat_numbers,
                    now,
                    &decide,
                    Some(ReservationWrite::Insert(reservation)),
                )
                .await?;

            info!(
                "Reservation {} booked directly by {} on seats {:?}",
                reservation_id, actor.id, seat_numbers
            );
            return written(outcome, reservation_id);
        }

        if seat_numbers.is_empty() {
            // Seatless checkout still has to reference a real trip.
            self.inventory.list_seats(trip_id).await?;
            self.inventory.store().insert_reservation(&reservation).await?;
            info!("Reservation {} created by {} without seats", reservation.id, actor.id);
            return Ok(reservation);
        }

        let reservation_id = reservation.id;
        let decide = |seat: &Seat| policy::require_hold(seat, &actor.id, now);
        let outcome = self
            .inventory
            .apply(
                trip_id,
                &seat_numbers,
                now,
                &decide,
                Some(ReservationWrite::Insert(reservation)),
            )
            .await?;

        info!(
            "Reservation {} created by {} for {} passengers on seats {:?}",
            reservation_id, actor.id, passenger_count, seat_numbers
        );
        written(outcome, reservation_id)
    }

    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
        actor: &Actor,
    ) -> InventoryResult<Reservation> {
        let reservation = self.inventory.load_reservation(reservation_id).await?;
        authorize(&reservation, actor)?;
        Ok(reservation)
    }

    /// Transition: PENDING -> PAID.
    /// Fails closed: if any referenced hold has lapsed or moved to someone
    /// else, nothing changes and the reservation stays pending.
    pub async fn pay_reservation(
        &self,
        reservation_id: Uuid,
        actor: &Actor,
    ) -> InventoryResult<Reservation> {
        let reservation = self.inventory.load_reservation(reservation_id).await?;
        authorize(&reservation, actor)?;

        if reservation.status != ReservationStatus::Pending {
            return Err(InventoryError::InvalidReservationState {
                id: reservation.id,
                status: reservation.status,
            });
        }
        if reservation.seat_numbers.len() as u32 != reservation.passenger_count {
            return Err(InventoryError::CapacityMismatch {
                expected: reservation.passenger_count,
                actual: reservation.seat_numbers.len() as u32,
            });
        }

        let now = self.inventory.now();
        let decide = |seat: &Seat| {
            policy::confirm(seat, &reservation.holder, false, Some(reservation.id), now)
        };
        let patch = ReservationPatch {
            reservation_id,
            expected_status: ReservationStatus::Pending,
            status: ReservationStatus::Paid,
            seat_numbers: reservation.seat_numbers.clone(),
        };

        let outcome = self
            .inventory
            .apply(
                reservation.trip_id,
                &reservation.seat_numbers,
                now,
                &decide,
                Some(ReservationWrite::Update(patch)),
            )
            .await?;

        info!("Reservation {} paid, seats {:?} occupied", reservation_id, reservation.seat_numbers);
        written(outcome, reservation_id)
    }

    /// Transition: PENDING -> CANCELLED (owner or admin), PAID -> CANCELLED (admin).
    pub async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        actor: &Actor,
    ) -> InventoryResult<Reservation> {
        let reservation = self.inventory.load_reservation(reservation_id).await?;
        authorize(&reservation, actor)?;

        let paid = match reservation.status {
            ReservationStatus::Pending => false,
            ReservationStatus::Paid if actor.can_manage_reservations() => true,
            ReservationStatus::Paid => {
                return Err(InventoryError::Forbidden(
                    "paid reservations can only be cancelled by an administrator".to_string(),
                ))
            }
            ReservationStatus::Cancelled => {
                return Err(InventoryError::InvalidReservationState {
                    id: reservation.id,
                    status: reservation.status,
                })
            }
        };

        let now = self.inventory.now();
        let decide = |seat: &Seat| {
            if paid {
                policy::vacate_for(seat, &reservation)
            } else {
                policy::drop_hold(seat, &reservation.holder, now)
            }
        };
        let patch = ReservationPatch {
            reservation_id,
            expected_status: reservation.status,
            status: ReservationStatus::Cancelled,
            seat_numbers: reservation.seat_numbers.clone(),
        };

        let outcome = self
            .inventory
            .apply(
                reservation.trip_id,
                &reservation.seat_numbers,
                now,
                &decide,
                Some(ReservationWrite::Update(patch)),
            )
            .await?;

        info!(
            "Reservation {} cancelled by {}, {} seats freed",
            reservation_id,
            actor.id,
            outcome.changed.len()
        );
        written(outcome, reservation_id)
    }
}

/// Owner or administrator
fn authorize(reservation: &Reservation, actor: &Actor) -> InventoryResult<()> {
    if reservation.is_owned_by(actor) || actor.can_manage_reservations() {
        Ok(())
    } else {
        Err(InventoryError::Forbidden(format!(
            "reservation {} belongs to another customer",
            reservation.id
        )))
    }
}

fn written(outcome: TransitionOutcome, reservation_id: Uuid) -> InventoryResult<Reservation> {
    outcome.reservation.ok_or_else(|| {
        InventoryError::StoreUnavailable(format!("store dropped reservation {}", reservation_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use voyage_core::{ManualClock, SeatStatus};
    use voyage_inventory::MemoryInventoryStore;

    async fn setup(seats: u32) -> (ReservationManager, Arc<ManualClock>, Uuid) {
        let clock = Arc::new(ManualClock::default());
        let inventory = Arc::new(SeatInventoryManager::new(
            Arc::new(MemoryInventoryStore::new()),
            clock.clone(),
        ));
        let trip_id = Uuid::new_v4();
        inventory.ensure_layout(trip_id, seats).await.unwrap();
        (ReservationManager::new(inventory), clock, trip_id)
    }

    #[tokio::test]
    async fn test_reservation_lifecycle() {
        let (manager, _, trip_id) = setup(10).await;
        let user = Actor::customer("customer@example.com");

        manager
            .inventory()
            .hold_seat(trip_id, 3, &user, Duration::minutes(15))
            .await
            .unwrap();
        manager
            .inventory()
            .hold_seat(trip_id, 4, &user, Duration::minutes(15))
            .await
            .unwrap();

        // Create -> PENDING
        let reservation = manager
            .create_reservation(trip_id, &user, 2, vec![3, 4])
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);

        // PENDING -> PAID
        let paid = manager.pay_reservation(reservation.id, &user).await.unwrap();
        assert_eq!(paid.status, ReservationStatus::Paid);

        let seats = manager.inventory().list_seats(trip_id).await.unwrap();
        assert_eq!(seats[2].status, SeatStatus::Occupied);
        assert_eq!(seats[2].reservation_id, Some(reservation.id));
        assert_eq!(seats[3].status, SeatStatus::Occupied);

        // Paying twice is an invalid transition
        assert!(matches!(
            manager.pay_reservation(reservation.id, &user).await,
            Err(InventoryError::InvalidReservationState { status: ReservationStatus::Paid, .. })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_more_seats_than_passengers() {
        let (manager, _, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");

        assert!(matches!(
            manager.create_reservation(trip_id, &user, 1, vec![1, 2]).await,
            Err(InventoryError::CapacityMismatch { expected: 1, actual: 2 })
        ));
        assert!(matches!(
            manager.create_reservation(trip_id, &user, 0, vec![]).await,
            Err(InventoryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_requires_live_holds() {
        let (manager, _, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");

        let err = manager
            .create_reservation(trip_id, &user, 1, vec![2])
            .await
            .unwrap_err();
        assert_eq!(err.conflicting_seats(), vec![2]);
    }

    #[tokio::test]
    async fn test_pay_fails_closed_when_hold_lapsed() {
        let (manager, clock, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");
        manager
            .inventory()
            .hold_seat(trip_id, 1, &user, Duration::minutes(1))
            .await
            .unwrap();
        let reservation = manager.create_reservation(trip_id, &user, 1, vec![1]).await.unwrap();

        clock.advance(Duration::minutes(2));

        let err = manager.pay_reservation(reservation.id, &user).await.unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let stored = manager.get_reservation(reservation.id, &user).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
        let seats = manager.inventory().list_seats(trip_id).await.unwrap();
        assert_eq!(seats[0].status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_pay_requires_all_seats_assigned() {
        let (manager, _, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");
        manager
            .inventory()
            .hold_seat(trip_id, 1, &user, Duration::minutes(15))
            .await
            .unwrap();
        let reservation = manager.create_reservation(trip_id, &user, 2, vec![1]).await.unwrap();

        assert!(matches!(
            manager.pay_reservation(reservation.id, &user).await,
            Err(InventoryError::CapacityMismatch { expected: 2, actual: 1 })
        ));
    }

    #[tokio::test]
    async fn test_other_customers_cannot_touch_reservation() {
        let (manager, _, trip_id) = setup(4).await;
        let owner = Actor::customer("user-a");
        let stranger = Actor::customer("user-b");
        manager
            .inventory()
            .hold_seat(trip_id, 1, &owner, Duration::minutes(15))
            .await
            .unwrap();
        let reservation = manager.create_reservation(trip_id, &owner, 1, vec![1]).await.unwrap();

        assert!(matches!(
            manager.get_reservation(reservation.id, &stranger).await,
            Err(InventoryError::Forbidden(_))
        ));
        assert!(matches!(
            manager.pay_reservation(reservation.id, &stranger).await,
            Err(InventoryError::Forbidden(_))
        ));
        assert!(matches!(
            manager.cancel_reservation(reservation.id, &stranger).await,
            Err(InventoryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_pending_releases_holds() {
        let (manager, _, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");
        for seat in [1, 2] {
            manager
                .inventory()
                .hold_seat(trip_id, seat, &user, Duration::minutes(15))
                .await
                .unwrap();
        }
        let reservation = manager.create_reservation(trip_id, &user, 2, vec![1, 2]).await.unwrap();

        let cancelled = manager.cancel_reservation(reservation.id, &user).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let availability = manager.inventory().availability(trip_id).await.unwrap();
        assert_eq!(availability.available, 4);

        assert!(matches!(
            manager.cancel_reservation(reservation.id, &user).await,
            Err(InventoryError::InvalidReservationState { .. })
        ));
    }

    #[tokio::test]
    async fn test_only_admin_cancels_paid_reservation() {
        let (manager, _, trip_id) = setup(4).await;
        let user = Actor::customer("user-a");
        manager
            .inventory()
            .hold_seat(trip_id, 2, &user, Duration::minutes(15))
            .await
            .unwrap();
        let reservation = manager.create_reservation(trip_id, &user, 1, vec![2]).await.unwrap();
        manager.pay_reservation(reservation.id, &user).await.unwrap();

        assert!(matches!(
            manager.cancel_reservation(reservation.id, &user).await,
            Err(InventoryError::Forbidden(_))
        ));

        let cancelled = manager
            .cancel_reservation(reservation.id, &Actor::admin("ops"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let seats = manager.inventory().list_seats(trip_id).await.unwrap();
        assert_eq!(seats[1].status, SeatStatus::Available);
        assert!(seats[1].reservation_id.is_none());
    }

    #[tokio::test]
    async fn test_admin_books_directly() {
        let (manager, _, trip_id) = setup(4).await;
        let admin = Actor::admin("ops");

        let reservation = manager
            .create_reservation(trip_id, &admin, 2, vec![3, 4])
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Paid);

        let seats = manager.inventory().list_seats(trip_id).await.unwrap();
        assert!(seats[2..].iter().all(|s| s.status == SeatStatus::Occupied));

        assert!(matches!(
            manager.create_reservation(trip_id, &admin, 2, vec![1]).await,
            Err(InventoryError::CapacityMismatch { expected: 2, actual: 1 })
        ));
    }
}
