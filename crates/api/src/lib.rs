//! GeoDrop presence server library.
//!
//! Exposes the building blocks (config, state, registry, dispatcher, router,
//! reaper, routes) so integration tests and the binary entrypoint can both
//! access them.

pub mod background;
pub mod config;
pub mod error;
pub mod messaging;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
