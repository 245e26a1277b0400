//! Personalized `UPDATE_LIST` fan-out.
//!
//! [`Dispatcher::run`] waits for the registry to be marked dirty and then
//! pushes every live session its own nearby list, computed from a single
//! registry snapshot. Changes that land while a cycle is running coalesce
//! into the next one.

use std::sync::Arc;

use axum::extract::ws::Message;
use geodrop_core::protocol::ServerFrame;
use geodrop_core::proximity::nearby_entries;
use tokio_util::sync::CancellationToken;

use crate::ws::registry::{SessionRegistry, SessionSnapshot};

/// Counts from one broadcast cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    threshold_meters: f64,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, threshold_meters: f64) -> Self {
        Self {
            registry,
            threshold_meters,
        }
    }

    /// Run one broadcast cycle over a fresh snapshot.
    ///
    /// Sessions whose transport rejects the write are treated as disconnected
    /// and removed once the fan-out has finished.
    pub async fn broadcast_all(&self) -> BroadcastReport {
        let snapshot = self.registry.snapshot_all().await;
        let (report, failed) = fan_out(&snapshot, self.threshold_meters);

        for session in failed {
            if self
                .registry
                .remove_connection(session.session_id(), &session.conn_id)
                .await
            {
                tracing::info!(
                    session_id = %session.session_id(),
                    conn_id = %session.conn_id,
                    "Removed session after failed delivery"
                );
            }
        }

        report
    }

    /// Broadcast on every registry change until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(threshold_meters = self.threshold_meters, "Broadcast dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Broadcast dispatcher stopping");
                    break;
                }
                _ = self.registry.changed() => {
                    let report = self.broadcast_all().await;
                    tracing::debug!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "Broadcast cycle complete"
                    );
                }
            }
        }
    }
}

/// Send each session in `snapshot` its nearby list.
///
/// Never stops early: a failed write is recorded and the loop moves on.
fn fan_out(
    snapshot: &[SessionSnapshot],
    threshold_meters: f64,
) -> (BroadcastReport, Vec<&SessionSnapshot>) {
    let mut report = BroadcastReport::default();
    let mut failed = Vec::new();

    for session in snapshot {
        let entries = nearby_entries(
            &session.presence,
            snapshot.iter().map(|s| &s.presence),
            threshold_meters,
        );
        let text = match ServerFrame::UpdateList(entries).encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, session_id = %session.session_id(), "Failed to encode nearby list");
                continue;
            }
        };

        if session.sender.send(Message::Text(text.into())).is_ok() {
            report.delivered += 1;
        } else {
            report.failed += 1;
            failed.push(session);
        }
    }

    (report, failed)
}
