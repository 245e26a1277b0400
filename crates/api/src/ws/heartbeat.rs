use std::sync::Arc;
use std::time::Duration;

use crate::ws::registry::SessionRegistry;

/// Spawn a background task that sends periodic Ping frames to every live
/// session.
///
/// Pings keep idle connections open through proxies and surface dead ones:
/// a sink that can no longer be written ends its socket task. Pongs do not
/// count as activity for the reaper.
///
/// The returned `JoinHandle` is aborted during shutdown.
pub fn start_heartbeat(
    registry: Arc<SessionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let count = registry.session_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            registry.ping_all().await;
        }
    })
}
