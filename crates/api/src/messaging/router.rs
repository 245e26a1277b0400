//! Point-to-point chat and file delivery.
//!
//! [`MessageRouter`] looks up the addressed session in the registry and
//! forwards the message over its transport. Delivery is fire-and-forget: the
//! sender never hears about failures and nothing is retried or stored.

use std::sync::Arc;

use axum::extract::ws::Message;
use geodrop_core::protocol::{ChatEnvelope, ServerFrame};

use crate::ws::registry::SessionRegistry;

/// Result of a routing attempt, for local logging and tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Written to the recipient's transport.
    Delivered,
    /// Recipient absent or its transport already closed.
    UndefinedRecipient,
}

#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Forward `{from, text?, file?, timestamp}` to the session named by `message.to`.
    pub async fn route(&self, message: ChatEnvelope) -> DeliveryOutcome {
        let Some(target) = self.registry.sender_for(&message.to).await else {
            tracing::debug!(from = %message.from, to = %message.to, "Chat recipient not connected");
            return DeliveryOutcome::UndefinedRecipient;
        };

        let to = message.to.clone();
        let from = message.from.clone();
        let frame = ServerFrame::ChatMessage(message.into_delivered(from.clone()));
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, from = %from, to = %to, "Failed to encode chat frame");
                return DeliveryOutcome::UndefinedRecipient;
            }
        };

        if target.send(Message::Text(text.into())).is_err() {
            tracing::debug!(from = %from, to = %to, "Chat recipient transport closed");
            return DeliveryOutcome::UndefinedRecipient;
        }

        tracing::debug!(from = %from, to = %to, "Chat message delivered");
        DeliveryOutcome::Delivered
    }
}
