use std::sync::Arc;

use crate::config::ServerConfig;
use crate::messaging::MessageRouter;
use crate::ws::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live sessions and their transports.
    pub registry: Arc<SessionRegistry>,
    /// Point-to-point chat delivery over the same registry.
    pub router: MessageRouter,
}

impl AppState {
    /// Build state around a fresh, empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            config: Arc::new(config),
            router: MessageRouter::new(Arc::clone(&registry)),
            registry,
        }
    }
}
