use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use voyage_core::Actor;

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Any valid token. The caller becomes an [`Actor`] in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Role decides capabilities
    let actor = Actor::from_role(token_data.claims.sub.clone(), &token_data.claims.role);

    // 4. Inject into request extensions
    req.extensions_mut().insert(actor);
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Gate
// ============================================================================

/// Runs after [`auth_middleware`]; lets only reservation managers through.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let actor = req.extensions().get::<Actor>().ok_or(StatusCode::UNAUTHORIZED)?;

    if !actor.can_manage_reservations() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
