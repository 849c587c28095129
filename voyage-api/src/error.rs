use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use voyage_core::InventoryError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Inventory(e) => match e {
                InventoryError::Conflict(_) => StatusCode::CONFLICT,
                InventoryError::InvalidReservationState { .. } => StatusCode::CONFLICT,
                InventoryError::Forbidden(_) => StatusCode::FORBIDDEN,
                InventoryError::CapacityMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
                InventoryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "error": "Internal Server Error" })
            }
            AppError::Inventory(InventoryError::StoreUnavailable(msg)) => {
                tracing::error!("Inventory store unavailable: {}", msg);
                json!({ "error": "Inventory temporarily unavailable" })
            }
            AppError::Inventory(e @ InventoryError::Conflict(_)) => json!({
                "error": e.to_string(),
                "seats": e.conflicting_seats(),
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
