//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text rendering
//! - `controller_metrics` - Reconciliations, owned-object upserts, conflict retries, requeues

pub mod controller_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use registry::*;
