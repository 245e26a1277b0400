//! Periodic eviction of silent sessions.
//!
//! Transports can vanish without a close handshake (a phone losing signal,
//! a laptop lid closing). Any session that has not sent a valid frame within
//! the timeout is removed and its transport is told to close. Removal marks
//! the registry dirty, so the dispatcher sends everyone a fresh list.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use geodrop_core::types::SessionId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ws::SessionRegistry;

/// Evict every session idle for longer than `timeout` as of `now`.
///
/// Returns the evicted session ids.
pub async fn reap_once(
    registry: &SessionRegistry,
    timeout: Duration,
    now: Instant,
) -> Vec<SessionId> {
    registry
        .remove_stale(now, timeout)
        .await
        .into_iter()
        .map(|session| {
            let _ = session.sender.send(Message::Close(None));
            tracing::info!(
                session_id = %session.session_id(),
                conn_id = %session.conn_id,
                "Evicted stale session"
            );
            session.presence.session_id
        })
        .collect()
}

/// Run the reaper loop until `cancel` is triggered.
pub async fn run(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        timeout_secs = timeout.as_secs(),
        "Session reaper started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session reaper stopping");
                break;
            }
            _ = ticker.tick() => {
                let evicted = reap_once(&registry, timeout, Instant::now()).await;
                if evicted.is_empty() {
                    tracing::trace!("Session reaper: nothing to evict");
                } else {
                    tracing::info!(count = evicted.len(), "Session reaper: evicted stale sessions");
                }
            }
        }
    }
}
