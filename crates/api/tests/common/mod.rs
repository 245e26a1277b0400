//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, Response};
use axum::Router;
use geodrop_core::geo::Location;
use geodrop_core::protocol::{DeviceKind, LocationUpdate, ServerFrame};
use serde_json::json;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use geodrop_api::config::ServerConfig;
use geodrop_api::router::build_app_router;
use geodrop_api::state::AppState;
use geodrop_api::ws::WsSender;

/// Build a test `ServerConfig` bound to loopback on an ephemeral port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// Build the full application router around `state`, exactly as `main.rs` does.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state)
}

/// Issue a GET request against `app`.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.oneshot(request).await.expect("router is infallible")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// A fresh outbound channel standing in for a WebSocket transport.
pub fn transport() -> (WsSender, mpsc::UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

pub fn update(session_id: &str, latitude: f64, longitude: f64) -> LocationUpdate {
    LocationUpdate {
        session_id: session_id.to_string(),
        name: format!("user {session_id}"),
        device_type: DeviceKind::Mobile,
        location: Location::new(latitude, longitude),
    }
}

/// JSON text of an `UPDATE_LOCATION` frame.
pub fn location_frame(session_id: &str, latitude: f64, longitude: f64) -> String {
    json!({
        "type": "UPDATE_LOCATION",
        "payload": {
            "sessionId": session_id,
            "name": format!("user {session_id}"),
            "deviceType": "desktop",
            "location": { "latitude": latitude, "longitude": longitude },
            "lastSeen": 0
        }
    })
    .to_string()
}

/// JSON text of a `CHAT_MESSAGE` frame carrying only text.
pub fn chat_frame(from: &str, to: &str, text: &str) -> String {
    json!({
        "type": "CHAT_MESSAGE",
        "payload": { "from": from, "to": to, "text": text, "timestamp": 1_700_000_000_000_i64 }
    })
    .to_string()
}

/// Decode an outbound message as a server frame. Panics on anything else.
pub fn decode(msg: Message) -> ServerFrame {
    match msg {
        Message::Text(text) => {
            serde_json::from_str(text.as_str()).expect("outbound text should be a server frame")
        }
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Take the next queued frame without waiting.
pub fn next_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> ServerFrame {
    decode(rx.try_recv().expect("a frame should be queued"))
}

/// Wait up to a second for the next frame.
pub async fn recv_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> ServerFrame {
    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("channel closed");
    decode(msg)
}

/// Drain everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Session ids of an `UPDATE_LIST` frame, in order.
pub fn list_ids(frame: &ServerFrame) -> Vec<String> {
    match frame {
        ServerFrame::UpdateList(entries) => entries.iter().map(|e| e.session_id.clone()).collect(),
        other => panic!("expected UPDATE_LIST, got {other:?}"),
    }
}
