//! Per-connection lifecycle: `Connecting -> Bound -> Closed`.
//!
//! A [`Connection`] owns one transport's outbound sender and its bound
//! session id. It talks to the rest of the system only through
//! [`SessionRegistry`] and [`MessageRouter`].

use std::sync::Arc;

use axum::extract::ws::Message;
use geodrop_core::protocol::{ChatEnvelope, ClientFrame, LocationUpdate};
use geodrop_core::types::SessionId;

use crate::error::FrameRejection;
use crate::messaging::{DeliveryOutcome, MessageRouter};
use crate::ws::registry::{SessionRegistry, UpsertOutcome, WsSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted, no session id yet.
    Connecting,
    /// Bound to a session id for the rest of the transport's lifetime.
    Bound(SessionId),
    /// Terminal.
    Closed,
}

/// What an accepted frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// `UPDATE_LOCATION` applied to the registry.
    Location,
    /// `CHAT_MESSAGE` handed to the router.
    Chat(DeliveryOutcome),
}

pub struct Connection {
    conn_id: String,
    state: ConnectionState,
    sender: WsSender,
    registry: Arc<SessionRegistry>,
    router: MessageRouter,
}

impl Connection {
    pub fn new(
        conn_id: String,
        sender: WsSender,
        registry: Arc<SessionRegistry>,
        router: MessageRouter,
    ) -> Self {
        Self {
            conn_id,
            state: ConnectionState::Connecting,
            sender,
            registry,
            router,
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Bound(id) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Decode and dispatch one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) -> Result<Handled, FrameRejection> {
        if self.state == ConnectionState::Closed {
            return Err(FrameRejection::Closed);
        }

        match ClientFrame::decode(text)? {
            ClientFrame::UpdateLocation(update) => self.handle_location(update).await,
            ClientFrame::ChatMessage(envelope) => self.handle_chat(envelope).await,
        }
    }

    async fn handle_location(&mut self, update: LocationUpdate) -> Result<Handled, FrameRejection> {
        if let ConnectionState::Bound(bound) = &self.state {
            if *bound != update.session_id {
                return Err(FrameRejection::Rebind {
                    bound: bound.clone(),
                    claimed: update.session_id,
                });
            }

            // Only a connecting transport may claim an id; a bound one that
            // lost its session must not take it back.
            let session_id = bound.clone();
            if !self.registry.update_bound(update, &self.conn_id).await {
                return Err(FrameRejection::Displaced { session_id });
            }
            tracing::trace!(conn_id = %self.conn_id, session_id = %session_id, "Location updated");
            return Ok(Handled::Location);
        }

        let session_id = update.session_id.clone();
        match self.registry.upsert(update, &self.conn_id, &self.sender).await {
            UpsertOutcome::Inserted => {
                tracing::info!(conn_id = %self.conn_id, session_id = %session_id, "Session registered");
            }
            UpsertOutcome::Updated => {
                tracing::trace!(conn_id = %self.conn_id, session_id = %session_id, "Location updated");
            }
            UpsertOutcome::Replaced { previous } => {
                tracing::info!(
                    conn_id = %self.conn_id,
                    session_id = %session_id,
                    "Session claimed by new connection, closing previous transport"
                );
                let _ = previous.send(Message::Close(None));
            }
        }

        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Bound(session_id);
        }
        Ok(Handled::Location)
    }

    async fn handle_chat(&mut self, envelope: ChatEnvelope) -> Result<Handled, FrameRejection> {
        let bound = match &self.state {
            ConnectionState::Bound(id) => id.clone(),
            ConnectionState::Connecting => return Err(FrameRejection::Unbound),
            ConnectionState::Closed => return Err(FrameRejection::Closed),
        };

        if envelope.from != bound {
            return Err(FrameRejection::SpoofedSender {
                bound,
                claimed: envelope.from,
            });
        }

        if !self.registry.touch(&bound, &self.conn_id).await {
            return Err(FrameRejection::Displaced { session_id: bound });
        }
        let outcome = self.router.route(envelope).await;
        Ok(Handled::Chat(outcome))
    }

    /// Enter `Closed` and drop the bound session from the registry.
    ///
    /// Only removes the session while it is still bound to this connection.
    /// Returns `true` if a registry entry was removed. Calling twice is a no-op.
    pub async fn close(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match previous {
            ConnectionState::Bound(session_id) => {
                let removed = self
                    .registry
                    .remove_connection(&session_id, &self.conn_id)
                    .await;
                if removed {
                    tracing::info!(conn_id = %self.conn_id, session_id = %session_id, "Session removed");
                }
                removed
            }
            _ => false,
        }
    }
}
