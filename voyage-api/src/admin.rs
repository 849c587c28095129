use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use voyage_core::{Actor, Reservation};

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BusLayout {
    pub bus_id: Uuid,
    pub seats: u32,
}

/// Either a flat `seat_count` or a list of buses. Neither means the default count.
#[derive(Debug, Deserialize, Default)]
pub struct LayoutRequest {
    pub seat_count: Option<u32>,
    pub buses: Option<Vec<BusLayout>>,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub trip_id: Uuid,
    pub inserted: usize,
    pub total: u32,
}

#[derive(Debug, Deserialize)]
pub struct ReallocateRequest {
    pub seat_numbers: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub released: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/admin/trips/{trip_id}/layout
pub async fn ensure_layout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<LayoutRequest>,
) -> Result<Json<LayoutResponse>, AppError> {
    let inserted = match (&req.buses, req.seat_count) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "give either seat_count or buses, not both".to_string(),
            ))
        }
        (Some(buses), None) => {
            let buses: Vec<(Uuid, u32)> = buses.iter().map(|b| (b.bus_id, b.seats)).collect();
            state.inventory.ensure_fleet_layout(trip_id, &buses).await?
        }
        (None, count) => {
            let count = count.unwrap_or(state.rules.default_seat_count);
            state.inventory.ensure_layout(trip_id, count).await?
        }
    };

    let total = state.inventory.availability(trip_id).await?.total;
    info!("Layout for trip {} ensured by {}: {} new seats", trip_id, actor.id, inserted);

    Ok(Json(LayoutResponse {
        trip_id,
        inserted,
        total,
    }))
}

/// POST /v1/admin/reservations/{id}/reallocate
pub async fn reallocate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReallocateRequest>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state
        .inventory
        .reallocate_seats(id, &req.seat_numbers, &actor)
        .await?;
    Ok(Json(reservation))
}

/// POST /v1/admin/sweep
pub async fn sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>, AppError> {
    let released = state.inventory.sweep_expired_holds().await?;
    Ok(Json(SweepResponse { released }))
}
