use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use voyage_core::transition::{ensure_layout_grows, ensure_seats_present, settle};
use voyage_core::{
    InventoryError, InventoryResult, InventoryStore, Reservation, Seat, SeatSlot,
    TransitionOutcome, TransitionRequest,
};

use crate::database::DbClient;

const SEAT_COLUMNS: &str =
    "trip_id, seat_number, bus_id, status, holder, held_until, reservation_id, updated_at";
const RESERVATION_COLUMNS: &str =
    "id, trip_id, holder, passenger_count, seat_numbers, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    trip_id: Uuid,
    seat_number: i32,
    bus_id: Option<Uuid>,
    status: String,
    holder: Option<String>,
    held_until: Option<DateTime<Utc>>,
    reservation_id: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = InventoryError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            trip_id: row.trip_id,
            seat_number: from_db_number(row.seat_number)?,
            bus_id: row.bus_id,
            status: row.status.parse().map_err(InventoryError::StoreUnavailable)?,
            holder: row.holder,
            held_until: row.held_until,
            reservation_id: row.reservation_id,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    trip_id: Uuid,
    holder: String,
    passenger_count: i32,
    seat_numbers: Vec<i32>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = InventoryError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            trip_id: row.trip_id,
            holder: row.holder,
            passenger_count: from_db_number(row.passenger_count)?,
            seat_numbers: row
                .seat_numbers
                .into_iter()
                .map(from_db_number)
                .collect::<InventoryResult<Vec<u32>>>()?,
            status: row.status.parse().map_err(InventoryError::StoreUnavailable)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn store_error(e: sqlx::Error) -> InventoryError {
    InventoryError::StoreUnavailable(e.to_string())
}

fn to_db_number(n: u32) -> InventoryResult<i32> {
    i32::try_from(n).map_err(|_| InventoryError::Validation(format!("number {} is out of range", n)))
}

fn from_db_number(n: i32) -> InventoryResult<u32> {
    u32::try_from(n)
        .map_err(|_| InventoryError::StoreUnavailable(format!("negative number {} in store", n)))
}

fn to_db_numbers(numbers: &[u32]) -> InventoryResult<Vec<i32>> {
    numbers.iter().map(|n| to_db_number(*n)).collect()
}

/// Postgres-backed seat inventory.
///
/// Every transition runs in one transaction: the reservation row and then the
/// seat rows are locked with `FOR UPDATE` (seats in seat-number order, so
/// overlapping batches cannot deadlock), decisions are evaluated against the
/// locked rows, and all writes commit together.
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(db: &DbClient) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }
}

async fn save_reservation(conn: &mut PgConnection, reservation: &Reservation) -> InventoryResult<()> {
    sqlx::query(
        "INSERT INTO reservations (id, trip_id, holder, passenger_count, seat_numbers, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET seat_numbers = EXCLUDED.seat_numbers, \
         status = EXCLUDED.status, updated_at = EXCLUDED.updated_at",
    )
    .bind(reservation.id)
    .bind(reservation.trip_id)
    .bind(&reservation.holder)
    .bind(to_db_number(reservation.passenger_count)?)
    .bind(to_db_numbers(&reservation.seat_numbers)?)
    .bind(reservation.status.as_str())
    .bind(reservation.created_at)
    .bind(reservation.updated_at)
    .execute(conn)
    .await
    .map_err(store_error)?;

    Ok(())
}

async fn save_seat(conn: &mut PgConnection, seat: &Seat) -> InventoryResult<()> {
    sqlx::query(
        "UPDATE seats SET status = $3, holder = $4, held_until = $5, reservation_id = $6, updated_at = $7 \
         WHERE trip_id = $1 AND seat_number = $2",
    )
    .bind(seat.trip_id)
    .bind(to_db_number(seat.seat_number)?)
    .bind(seat.status.as_str())
    .bind(&seat.holder)
    .bind(seat.held_until)
    .bind(seat.reservation_id)
    .bind(seat.updated_at)
    .execute(conn)
    .await
    .map_err(store_error)?;

    Ok(())
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn insert_missing_seats(
        &self,
        trip_id: Uuid,
        slots: &[SeatSlot],
        now: DateTime<Utc>,
    ) -> InventoryResult<usize> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // Serializes layout changes per trip until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let highest: Option<i32> =
            sqlx::query_scalar("SELECT MAX(seat_number) FROM seats WHERE trip_id = $1")
                .bind(trip_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(store_error)?;
        let highest = highest.map(from_db_number).transpose()?;
        ensure_layout_grows(trip_id, slots, highest)?;

        let mut inserted = 0;
        for slot in slots {
            let result = sqlx::query(
                "INSERT INTO seats (trip_id, seat_number, bus_id, status, updated_at) \
                 VALUES ($1, $2, $3, 'AVAILABLE', $4) \
                 ON CONFLICT (trip_id, seat_number) DO NOTHING",
            )
            .bind(trip_id)
            .bind(to_db_number(slot.seat_number)?)
            .bind(slot.bus_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(inserted)
    }

    async fn list_seats(&self, trip_id: Uuid) -> InventoryResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE trip_id = $1 ORDER BY seat_number",
            SEAT_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn transition(&self, request: TransitionRequest<'_>) -> InventoryResult<TransitionOutcome> {
        let mut numbers = request.seat_numbers.to_vec();
        numbers.sort_unstable();
        numbers.dedup();
        let db_numbers = to_db_numbers(&numbers)?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // 1. Lock the reservation row, if this transition writes one
        let current = match &request.reservation {
            Some(write) => sqlx::query_as::<_, ReservationRow>(&format!(
                "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
                RESERVATION_COLUMNS
            ))
            .bind(write.reservation_id())
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?
            .map(Reservation::try_from)
            .transpose()?,
            None => None,
        };

        // 2. Lock the seats in a stable order
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE trip_id = $1 AND seat_number = ANY($2) \
             ORDER BY seat_number FOR UPDATE",
            SEAT_COLUMNS
        ))
        .bind(request.trip_id)
        .bind(&db_numbers)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;

        let seats = rows
            .into_iter()
            .map(Seat::try_from)
            .collect::<InventoryResult<Vec<Seat>>>()?;
        ensure_seats_present(request.trip_id, &numbers, &seats)?;

        // 3. Decide against what is locked; any rejection drops the transaction
        let reservation = request
            .reservation
            .as_ref()
            .map(|write| write.resolve(current.as_ref(), request.trip_id, request.now))
            .transpose()?;
        let mut outcome = settle(&seats, request.now, request.decide)?;

        // 4. Write. The reservation goes first so seat foreign keys resolve.
        if let Some(reservation) = &reservation {
            save_reservation(&mut tx, reservation).await?;
        }
        for seat in &outcome.changed {
            save_seat(&mut tx, seat).await?;
        }

        tx.commit().await.map_err(store_error)?;

        outcome.reservation = reservation;
        Ok(outcome)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> InventoryResult<Vec<Seat>> {
        // Conditional on the row still being a lapsed hold, so a concurrent
        // re-hold or confirm is never overwritten.
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "UPDATE seats SET status = 'AVAILABLE', holder = NULL, held_until = NULL, \
             reservation_id = NULL, updated_at = $1 \
             WHERE status = 'HELD' AND held_until <= $1 \
             RETURNING {}",
            SEAT_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> InventoryResult<()> {
        let result = sqlx::query(
            "INSERT INTO reservations (id, trip_id, holder, passenger_count, seat_numbers, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(reservation.id)
        .bind(reservation.trip_id)
        .bind(&reservation.holder)
        .bind(to_db_number(reservation.passenger_count)?)
        .bind(to_db_numbers(&reservation.seat_numbers)?)
        .bind(reservation.status.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::Validation(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> InventoryResult<Option<Reservation>> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .map(Reservation::try_from)
        .transpose()
    }
}
