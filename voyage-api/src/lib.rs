use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod reservations;
pub mod seats;
pub mod state;
pub mod stream;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/v1/trips/{trip_id}/seats", get(seats::list_seats))
        .route("/v1/trips/{trip_id}/availability", get(seats::availability));

    let customer = Router::new()
        .route(
            "/v1/trips/{trip_id}/seats/{seat_number}/hold",
            post(seats::hold_seat).delete(seats::release_seat),
        )
        .route("/v1/trips/{trip_id}/seats/confirm", post(seats::confirm_seats))
        .route("/v1/trips/{trip_id}/stream", get(stream::trip_stream))
        .route("/v1/reservations", post(reservations::create_reservation))
        .route("/v1/reservations/{id}", get(reservations::get_reservation))
        .route("/v1/reservations/{id}/pay", post(reservations::pay_reservation))
        .route("/v1/reservations/{id}/cancel", post(reservations::cancel_reservation))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // The last layer added runs first: authenticate, then check the admin capability.
    let admin = Router::new()
        .route("/v1/admin/trips/{trip_id}/layout", post(admin::ensure_layout))
        .route("/v1/admin/reservations/{id}/reallocate", post(admin::reallocate))
        .route("/v1/admin/sweep", post(admin::sweep))
        .route_layer(from_fn(middleware::admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .merge(auth::routes())
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let (Some(redis), Some(addr)) = (state.redis.clone(), peer) else {
        return next.run(req).await;
    };

    let key = format!("ratelimit:{}", addr.ip());
    match redis.check_rate_limit(&key, state.rate_limit_per_minute, 60).await {
        Ok(false) => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response(),
        Ok(true) => next.run(req).await,
        Err(e) => {
            // Fail open
            tracing::warn!("Rate limiter unavailable: {}", e);
            next.run(req).await
        }
    }
}
