//! qwire host library entry.
//!
//! Wires configuration, codec construction, logging and decode metrics
//! around the core adapter. Consumed by the `qwire-inspect` binary and by
//! integration tests.

pub mod codecs;
pub mod config;
pub mod obs;

pub use codecs::{CodecBuilder, CodecSet};
