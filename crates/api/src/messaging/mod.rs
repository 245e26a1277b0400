//! Direct session-to-session messaging.

pub mod router;

pub use router::{DeliveryOutcome, MessageRouter};
