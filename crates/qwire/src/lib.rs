//! Top-level facade crate for qwire.
//!
//! Re-exports core types and the host library so users can depend on a single crate.

pub mod core {
    pub use qwire_core::*;
}

pub mod host {
    pub use qwire_host::*;
}
