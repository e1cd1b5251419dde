//! qwire core: lazily decoded query messages over a received wire envelope.
//!
//! This crate defines the envelope contract, the codec contract with its
//! serde-backed codecs, and `LazyQueryMessage`, which defers decoding of the
//! payload, response shape and metadata until each is first read. It carries
//! no runtime or subscriber dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every decode
//! failure surfaces as `DecodeError` from the accessor that triggered it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod lazy;
pub mod message;
pub mod metadata;
pub mod protocol;
pub mod shape;

pub use error::{DecodeError, QwireError, Result};
pub use message::{LazyQueryMessage, QueryMessage};
