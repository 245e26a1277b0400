//! Transport-free building blocks of the GeoDrop presence service.
//!
//! Everything here is synchronous and free of I/O so that the server crate,
//! tests, and any future tooling share one definition of the wire protocol,
//! the distance math, and the proximity filter.

pub mod error;
pub mod geo;
pub mod protocol;
pub mod proximity;
pub mod types;
