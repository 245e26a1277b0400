//! WebSocket presence infrastructure.
//!
//! Provides the session registry, the per-connection lifecycle, the
//! nearby-list dispatcher, heartbeat pings, and the HTTP upgrade handler
//! used by Axum routes.

pub mod connection;
pub mod dispatcher;
mod handler;
mod heartbeat;
pub mod registry;

pub use connection::{Connection, ConnectionState, Handled};
pub use dispatcher::{BroadcastReport, Dispatcher};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use registry::{SessionRegistry, SessionSnapshot, UpsertOutcome, WsSender};
