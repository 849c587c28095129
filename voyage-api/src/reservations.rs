use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use voyage_core::{Actor, Reservation};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub trip_id: Uuid,
    pub passenger_count: u32,
    #[serde(default)]
    pub seat_numbers: Vec<u32>,
}

/// POST /v1/reservations
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state
        .reservations
        .create_reservation(req.trip_id, &actor, req.passenger_count, req.seat_numbers)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations/{id}
pub async fn get_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.reservations.get_reservation(id, &actor).await?))
}

/// POST /v1/reservations/{id}/pay
pub async fn pay_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.reservations.pay_reservation(id, &actor).await?))
}

/// POST /v1/reservations/{id}/cancel
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.reservations.cancel_reservation(id, &actor).await?))
}
