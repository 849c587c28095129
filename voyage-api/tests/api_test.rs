use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use voyage_api::{app, auth::issue_token, AppState, AuthConfig};
use voyage_core::ManualClock;
use voyage_inventory::MemoryInventoryStore;
use voyage_store::InventoryRules;

const SECRET: &str = "test-secret";

fn test_app() -> Router {
    let state = AppState::new(
        Arc::new(MemoryInventoryStore::new()),
        Arc::new(ManualClock::default()),
        Vec::new(),
        AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        InventoryRules::default(),
    );
    app(state)
}

fn token(sub: &str, role: &str) -> String {
    issue_token(SECRET, sub, role, 3600).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", bearer));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn trip_with_seats(app: &Router, seats: u32) -> Uuid {
    let trip_id = Uuid::new_v4();
    let admin = token("ops", "ADMIN");
    let (status, body) = send(
        app,
        "POST",
        &format!("/v1/admin/trips/{}/layout", trip_id),
        Some(&admin),
        Some(json!({ "seat_count": seats })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], json!(seats));
    trip_id
}

#[tokio::test]
async fn test_guest_token_is_issued() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/v1/auth/guest", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_unknown_trip_is_404() {
    let app = test_app();
    let (status, _) = send(&app, "GET", &format!("/v1/trips/{}/seats", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_holds_require_a_token() {
    let app = test_app();
    let trip_id = trip_with_seats(&app, 4).await;

    let (status, _) = send(&app, "POST", &format!("/v1/trips/{}/seats/1/hold", trip_id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/trips/{}/seats/1/hold", trip_id),
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_competing_hold_is_409_and_foreign_release_is_403() {
    let app = test_app();
    let trip_id = trip_with_seats(&app, 4).await;
    let user_a = token("user-a", "CUSTOMER");
    let user_b = token("user-b", "CUSTOMER");
    let hold = format!("/v1/trips/{}/seats/2/hold", trip_id);

    let (status, body) = send(&app, "POST", &hold, Some(&user_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "HELD");
    assert_eq!(body["holder"], "user-a");

    let (status, body) = send(&app, "POST", &hold, Some(&user_b), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["seats"], json!([2]));

    let (status, _) = send(&app, "DELETE", &hold, Some(&user_b), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "DELETE", &hold, Some(&user_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "AVAILABLE");

    let (_, body) = send(&app, "GET", &format!("/v1/trips/{}/availability", trip_id), None, None).await;
    assert_eq!(body["available"], 4);
}

#[tokio::test]
async fn test_hold_ttl_is_bounded() {
    let app = test_app();
    let trip_id = trip_with_seats(&app, 2).await;
    let user = token("user-a", "CUSTOMER");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/trips/{}/seats/1/hold?ttl_seconds=999999", trip_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/trips/{}/seats/1/hold?ttl_seconds=60", trip_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_over_http() {
    let app = test_app();
    let trip_id = trip_with_seats(&app, 6).await;
    let user = token("user-a", "CUSTOMER");
    let admin = token("ops", "ADMIN");

    for seat in [1, 2] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/trips/{}/seats/{}/hold", trip_id, seat),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, reservation) = send(
        &app,
        "POST",
        "/v1/reservations",
        Some(&user),
        Some(json!({ "trip_id": trip_id, "passenger_count": 2, "seat_numbers": [1, 2] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["status"], "PENDING");
    let id = reservation["id"].as_str().unwrap().to_string();

    let (status, paid) = send(&app, "POST", &format!("/v1/reservations/{}/pay", id), Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");

    let (status, _) = send(&app, "POST", &format!("/v1/reservations/{}/pay", id), Some(&user), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, moved) = send(
        &app,
        "POST",
        &format!("/v1/admin/reservations/{}/reallocate", id),
        Some(&admin),
        Some(json!({ "seat_numbers": [5, 6] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["seat_numbers"], json!([5, 6]));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/admin/reservations/{}/reallocate", id),
        Some(&admin),
        Some(json!({ "seat_numbers": [3] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, seats) = send(&app, "GET", &format!("/v1/trips/{}/seats", trip_id), None, None).await;
    let statuses: Vec<&str> = seats
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec!["AVAILABLE", "AVAILABLE", "AVAILABLE", "AVAILABLE", "OCCUPIED", "OCCUPIED"]
    );
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let app = test_app();
    let user = token("user-a", "CUSTOMER");

    let (status, _) = send(&app, "POST", "/v1/admin/sweep", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", "/v1/admin/sweep", Some(&token("ops", "ADMIN")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], 0);
}
