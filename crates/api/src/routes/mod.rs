pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// WebSocket upgrade routes. Served at `/ws` and at the bare origin.
pub fn ws_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/", get(ws::ws_handler))
}
