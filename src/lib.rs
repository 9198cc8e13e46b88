//! Sentinel Dashboard Operator Library
//!
//! Core functionality of the operator: the `Dashboard` CRD, the reconciler and the
//! runtime that drives it. The binaries are thin wrappers around this crate.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;

// Re-export CRD types for convenience
pub use crd::*;
