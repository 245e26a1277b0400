//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, test_config, transport, update};
use geodrop_api::state::AppState;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = build_test_app(AppState::new(test_config()));
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["sessions"], 0);
}

// ---------------------------------------------------------------------------
// Test: the session count reflects the registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_counts_live_sessions() {
    let state = AppState::new(test_config());
    let (tx, _rx) = transport();
    state.registry.upsert(update("a", 0.0, 0.0), "conn-a", &tx).await;
    state.registry.upsert(update("b", 1.0, 1.0), "conn-b", &tx).await;

    let json = body_json(get(build_test_app(state), "/health").await).await;

    assert_eq!(json["sessions"], 2);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(AppState::new(test_config()));
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: a plain GET on the upgrade route is refused
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ws_route_without_upgrade_is_rejected() {
    let app = build_test_app(AppState::new(test_config()));
    let response = get(app, "/ws").await;

    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(AppState::new(test_config()));
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // The value should be a valid UUID (36 chars with hyphens).
    let id_str = request_id.to_str().expect("header should be ASCII");
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}
