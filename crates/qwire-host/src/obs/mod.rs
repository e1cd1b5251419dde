//! Observability: logging setup and in-process decode metrics.
//!
//! Metrics are stored as atomics behind `DashMap` and rendered in Prometheus
//! text format on demand.

pub mod logging;
pub mod metrics;
