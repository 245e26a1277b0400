//! JSON wire protocol spoken over the presence WebSocket.
//!
//! Every frame is an object of the shape `{"type": ..., "payload": ...}`.
//! Client frames are decoded with [`ClientFrame::decode`]; server frames are
//! encoded with [`ServerFrame::encode`]. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geo::Location;
use crate::types::{SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Shared payload types
// ---------------------------------------------------------------------------

/// Informational device tag reported by the client. Never affects routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Mobile,
    Desktop,
}

/// An attachment carried inside a chat message.
///
/// `data` is opaque to the server (clients send base64) and no size limit is
/// applied; it is forwarded byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// `UPDATE_LOCATION` payload. The client's own `lastSeen` is ignored; the
/// server stamps its own clock on receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub session_id: SessionId,
    pub name: String,
    pub device_type: DeviceKind,
    pub location: Location,
}

/// `CHAT_MESSAGE` payload as sent by a client.
///
/// `text` and `file` are both optional and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub to: SessionId,
    pub from: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<SharedFile>,
    pub timestamp: i64,
}

impl ChatEnvelope {
    /// Strip the addressing and produce the payload the recipient sees.
    pub fn into_delivered(self, from: SessionId) -> DeliveredChat {
        DeliveredChat {
            from,
            text: self.text,
            file: self.file,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    UpdateLocation(LocationUpdate),
    ChatMessage(ChatEnvelope),
}

impl ClientFrame {
    /// Parse a text frame.
    ///
    /// Fails on invalid JSON, unknown `type`, missing required fields, or a
    /// location with non-finite coordinates.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        let frame: ClientFrame = serde_json::from_str(text)?;

        if let ClientFrame::UpdateLocation(update) = &frame {
            if !update.location.is_finite() {
                return Err(CoreError::NonFiniteCoordinate {
                    latitude: update.location.latitude,
                    longitude: update.location.longitude,
                });
            }
        }

        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// One row of an `UPDATE_LIST` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyEntry {
    pub session_id: SessionId,
    pub name: String,
    pub device_type: DeviceKind,
    pub location: Location,
    /// Meters from the receiving session.
    pub distance: f64,
    /// Epoch milliseconds of the last frame the server saw from this session.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: Timestamp,
}

/// `CHAT_MESSAGE` payload as delivered to the recipient. Carries no `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredChat {
    pub from: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<SharedFile>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    UpdateList(Vec<NearbyEntry>),
    ChatMessage(DeliveredChat),
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::Encode)
    }
}
