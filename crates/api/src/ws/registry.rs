use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use geodrop_core::protocol::LocationUpdate;
use geodrop_core::proximity::Presence;
use geodrop_core::types::SessionId;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::Instant;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// A live session as stored by the registry.
struct SessionEntry {
    presence: Presence,
    /// Server-generated id of the connection this session is bound to.
    conn_id: String,
    /// Channel sender for outbound messages to the bound connection.
    sender: WsSender,
    /// Monotonic time of the last valid inbound frame. Drives reaping.
    seen_at: Instant,
}

impl SessionEntry {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            presence: self.presence.clone(),
            conn_id: self.conn_id.clone(),
            sender: self.sender.clone(),
        }
    }
}

/// Point-in-time copy of a session, safe to use after the lock is released.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub presence: Presence,
    pub conn_id: String,
    pub sender: WsSender,
}

impl SessionSnapshot {
    pub fn session_id(&self) -> &str {
        &self.presence.session_id
    }
}

/// Result of [`SessionRegistry::upsert`].
#[derive(Debug)]
pub enum UpsertOutcome {
    /// The session id was not registered before.
    Inserted,
    /// The same connection refreshed its own session.
    Updated,
    /// A different connection claimed an id that was already bound. The new
    /// connection now owns the session; `previous` is the displaced transport.
    Replaced { previous: WsSender },
}

/// Tracks every live session and its transport.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Each public operation takes the lock once,
/// so operations are atomic with respect to one another. Every mutation marks
/// the registry dirty, which wakes [`SessionRegistry::changed`].
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    changed: Notify,
}

impl SessionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            changed: Notify::new(),
        }
    }

    /// Insert or refresh the session described by `update`, bound to
    /// connection `conn_id`.
    ///
    /// `lastSeen` is stamped with the server clocks, not the client's value.
    pub async fn upsert(
        &self,
        update: LocationUpdate,
        conn_id: &str,
        sender: &WsSender,
    ) -> UpsertOutcome {
        let presence = Presence::from_update(update, chrono::Utc::now());
        let seen_at = Instant::now();

        let outcome = match self
            .sessions
            .write()
            .await
            .entry(presence.session_id.clone())
        {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.presence = presence;
                entry.seen_at = seen_at;
                if entry.conn_id == conn_id {
                    UpsertOutcome::Updated
                } else {
                    entry.conn_id = conn_id.to_string();
                    let previous = std::mem::replace(&mut entry.sender, sender.clone());
                    UpsertOutcome::Replaced { previous }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SessionEntry {
                    presence,
                    conn_id: conn_id.to_string(),
                    sender: sender.clone(),
                    seen_at,
                });
                UpsertOutcome::Inserted
            }
        };

        self.mark_dirty();
        outcome
    }

    /// Apply `update` only while the session is still bound to `conn_id`.
    ///
    /// Returns `false` without touching anything if the session is absent or
    /// has been claimed by another connection.
    pub async fn update_bound(&self, update: LocationUpdate, conn_id: &str) -> bool {
        let updated = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(&update.session_id) {
                Some(entry) if entry.conn_id == conn_id => {
                    entry.presence = Presence::from_update(update, chrono::Utc::now());
                    entry.seen_at = Instant::now();
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.mark_dirty();
        }
        updated
    }

    /// Refresh `lastSeen` for a session still bound to `conn_id`.
    ///
    /// Returns `false` if the session is absent or owned by another connection.
    pub async fn touch(&self, session_id: &str, conn_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(entry) if entry.conn_id == conn_id => {
                entry.seen_at = Instant::now();
                entry.presence.last_seen = chrono::Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Look up a session by id.
    pub async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(SessionEntry::snapshot)
    }

    /// Clone the transport handle bound to `session_id`, if any.
    pub async fn sender_for(&self, session_id: &str) -> Option<WsSender> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.sender.clone())
    }

    /// Remove a session by id. Removing an absent id is a no-op.
    ///
    /// Returns `true` if a session was removed.
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Remove `session_id` only while it is still bound to `conn_id`.
    ///
    /// Used on teardown so that a stale connection closing late cannot evict
    /// a session that a newer connection has since claimed.
    pub async fn remove_connection(&self, session_id: &str, conn_id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(session_id) {
                Some(entry) if entry.conn_id == conn_id => {
                    sessions.remove(session_id);
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Remove and return every session idle for longer than `timeout` as of `now`.
    pub async fn remove_stale(&self, now: Instant, timeout: Duration) -> Vec<SessionSnapshot> {
        let evicted: Vec<SessionSnapshot> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, entry)| now.saturating_duration_since(entry.seen_at) > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            stale
                .iter()
                .filter_map(|id| sessions.remove(id))
                .map(|entry| entry.snapshot())
                .collect()
        };
        if !evicted.is_empty() {
            self.mark_dirty();
        }
        evicted
    }

    /// Copy out every live session, ordered by session id.
    pub async fn snapshot_all(&self) -> Vec<SessionSnapshot> {
        let mut snapshot: Vec<SessionSnapshot> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionEntry::snapshot)
            .collect();
        snapshot.sort_by(|a, b| a.presence.session_id.cmp(&b.presence.session_id));
        snapshot
    }

    /// Return the current number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Wait until the registry is next marked dirty.
    ///
    /// Marks made while nobody is waiting are kept (at most one), so a change
    /// that lands between two waits is never lost. Several marks coalesce.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all sessions");
    }

    /// Send a Ping frame to every session's transport.
    ///
    /// A transport that fails to carry the ping ends its socket task, which
    /// removes the session through the normal teardown path.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Ping(Bytes::new()));
        }
    }

    fn mark_dirty(&self) {
        self.changed.notify_one();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
