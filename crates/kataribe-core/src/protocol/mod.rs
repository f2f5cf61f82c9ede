//! Kataribe envelope protocol.

pub mod envelope;

pub use envelope::{now_ms, Envelope, Kind};
