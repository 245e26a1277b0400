use geodrop_core::error::CoreError;
use geodrop_core::types::SessionId;

/// Why an inbound frame was dropped.
///
/// Every variant is recovered locally: the frame is discarded, the reason is
/// logged, and the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum FrameRejection {
    /// Unparseable JSON, unknown `type`, missing fields, or bad coordinates.
    #[error(transparent)]
    Malformed(#[from] CoreError),

    /// A non-location frame arrived before the connection was bound.
    #[error("Frame received before the connection was bound to a session")]
    Unbound,

    /// A bound connection tried to switch to another session id.
    #[error("Connection bound to '{bound}' attempted to rebind to '{claimed}'")]
    Rebind { bound: SessionId, claimed: SessionId },

    /// A chat message claimed a sender other than the bound session.
    #[error("Connection bound to '{bound}' sent a message claiming to be '{claimed}'")]
    SpoofedSender { bound: SessionId, claimed: SessionId },

    /// The bound session was taken over by a newer connection or evicted.
    #[error("Session '{session_id}' is no longer bound to this connection")]
    Displaced { session_id: SessionId },

    #[error("Binary frames are not supported")]
    BinaryFrame,

    #[error("Connection is closed")]
    Closed,
}

impl FrameRejection {
    /// Identity violations are worth a warning; everything else is noise
    /// from a misbehaving or outdated client.
    pub fn is_identity_violation(&self) -> bool {
        matches!(
            self,
            FrameRejection::Rebind { .. } | FrameRejection::SpoofedSender { .. }
        )
    }
}
