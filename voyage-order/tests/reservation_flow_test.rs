use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;
use voyage_core::{Actor, InventoryError, ManualClock, ReservationStatus, SeatStatus};
use voyage_inventory::{MemoryInventoryStore, SeatInventoryManager};
use voyage_order::ReservationManager;

async fn reservations(seats: u32) -> (Arc<ReservationManager>, Uuid) {
    let inventory = SeatInventoryManager::new(
        Arc::new(MemoryInventoryStore::new()),
        Arc::new(ManualClock::default()),
    );
    let trip_id = Uuid::new_v4();
    inventory.ensure_layout(trip_id, seats).await.unwrap();
    (Arc::new(ReservationManager::new(Arc::new(inventory))), trip_id)
}

#[tokio::test]
async fn test_checkout_pay_then_reallocate() {
    let (manager, trip_id) = reservations(60).await;
    let user = Actor::customer("user-a");
    let admin = Actor::admin("ops");

    for seat in [1, 2] {
        manager
            .inventory()
            .hold_seat(trip_id, seat, &user, Duration::minutes(15))
            .await
            .unwrap();
    }
    let reservation = manager
        .create_reservation(trip_id, &user, 2, vec![1, 2])
        .await
        .unwrap();
    manager.pay_reservation(reservation.id, &user).await.unwrap();

    let moved = manager
        .inventory()
        .reallocate_seats(reservation.id, &[5, 6], &admin)
        .await
        .unwrap();
    assert_eq!(moved.seat_numbers, vec![5, 6]);

    let seats = manager.inventory().list_seats(trip_id).await.unwrap();
    assert_eq!(seats[0].status, SeatStatus::Available);
    assert_eq!(seats[1].status, SeatStatus::Available);
    assert_eq!(seats[4].status, SeatStatus::Occupied);
    assert_eq!(seats[5].status, SeatStatus::Occupied);

    let stored = manager.get_reservation(reservation.id, &user).await.unwrap();
    assert_eq!(stored.seat_numbers, vec![5, 6]);
    assert_eq!(stored.status, ReservationStatus::Paid);
}

#[tokio::test]
async fn test_reallocating_pending_reservation_is_rejected() {
    let (manager, trip_id) = reservations(10).await;
    let user = Actor::customer("user-a");
    manager
        .inventory()
        .hold_seat(trip_id, 1, &user, Duration::minutes(15))
        .await
        .unwrap();
    let reservation = manager.create_reservation(trip_id, &user, 1, vec![1]).await.unwrap();

    let result = manager
        .inventory()
        .reallocate_seats(reservation.id, &[2], &Actor::admin("ops"))
        .await;
    assert!(matches!(
        result,
        Err(InventoryError::InvalidReservationState { status: ReservationStatus::Pending, .. })
    ));

    let seats = manager.inventory().list_seats(trip_id).await.unwrap();
    assert_eq!(seats[0].status, SeatStatus::Held);
    assert_eq!(seats[1].status, SeatStatus::Available);
}

#[tokio::test]
async fn test_concurrent_payments_settle_once() {
    let (manager, trip_id) = reservations(10).await;
    let user = Actor::customer("user-a");
    for seat in [3, 4] {
        manager
            .inventory()
            .hold_seat(trip_id, seat, &user, Duration::minutes(15))
            .await
            .unwrap();
    }
    let reservation = manager
        .create_reservation(trip_id, &user, 2, vec![3, 4])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        let user = user.clone();
        let id = reservation.id;
        handles.push(tokio::spawn(async move { manager.pay_reservation(id, &user).await }));
    }

    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(r) => {
                paid += 1;
                assert_eq!(r.status, ReservationStatus::Paid);
            }
            Err(InventoryError::InvalidReservationState { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(paid, 1);
}

#[tokio::test]
async fn test_checkout_competing_for_same_seat() {
    let (manager, trip_id) = reservations(10).await;
    let user_a = Actor::customer("user-a");
    let user_b = Actor::customer("user-b");

    manager
        .inventory()
        .hold_seat(trip_id, 9, &user_a, Duration::minutes(15))
        .await
        .unwrap();

    let err = manager
        .create_reservation(trip_id, &user_b, 1, vec![9])
        .await
        .unwrap_err();
    assert_eq!(err.conflicting_seats(), vec![9]);

    let ok = manager.create_reservation(trip_id, &user_a, 1, vec![9]).await.unwrap();
    assert_eq!(ok.holder, "user-a");
}
