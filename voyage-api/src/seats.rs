use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;
use voyage_core::{Actor, Seat};
use voyage_inventory::SeatAvailability;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct HoldQuery {
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub seat_numbers: Vec<u32>,
}

/// GET /v1/trips/{trip_id}/seats
pub async fn list_seats(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.inventory.list_seats(trip_id).await?))
}

/// GET /v1/trips/{trip_id}/availability
pub async fn availability(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<SeatAvailability>, AppError> {
    Ok(Json(state.inventory.availability(trip_id).await?))
}

/// POST /v1/trips/{trip_id}/seats/{seat_number}/hold
pub async fn hold_seat(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((trip_id, seat_number)): Path<(Uuid, u32)>,
    Query(query): Query<HoldQuery>,
) -> Result<Json<Seat>, AppError> {
    let ttl = query.ttl_seconds.unwrap_or(state.rules.seat_hold_seconds);
    if ttl == 0 || ttl > state.rules.max_hold_seconds {
        return Err(AppError::BadRequest(format!(
            "ttl_seconds must be between 1 and {}",
            state.rules.max_hold_seconds
        )));
    }

    let ttl = i64::try_from(ttl)
        .map_err(|_| AppError::BadRequest(format!("ttl_seconds {} is out of range", ttl)))?;

    let seat = state
        .inventory
        .hold_seat(trip_id, seat_number, &actor, Duration::seconds(ttl))
        .await?;
    Ok(Json(seat))
}

/// DELETE /v1/trips/{trip_id}/seats/{seat_number}/hold
pub async fn release_seat(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((trip_id, seat_number)): Path<(Uuid, u32)>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.inventory.release_seat(trip_id, seat_number, &actor).await?))
}

/// POST /v1/trips/{trip_id}/seats/confirm
pub async fn confirm_seats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Vec<Seat>>, AppError> {
    let seats = state
        .inventory
        .confirm_seats(trip_id, &req.seat_numbers, &actor)
        .await?;
    Ok(Json(seats))
}
