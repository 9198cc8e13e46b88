//! # Controller
//!
//! Reconciliation logic and the collaborators it talks to.

pub mod backoff;
pub mod events;
pub mod health;
pub mod reconciler;
pub mod server;
pub mod store;
