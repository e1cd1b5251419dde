//! Wire contracts.
//!
//! The query envelope arrives fully received and immutable. Parsing it only
//! checks structure; payload, response type and binary metadata values stay
//! encoded until an accessor asks for them.

pub mod envelope;

pub use envelope::{parse_envelope, MetadataValue, QueryEnvelope, SerializedObject};
