//! # Reconciler
//!
//! Converges a Dashboard into its owned Deployment and Service and reports progress
//! through the `Applied` and `Ready` conditions.
//!
//! ## Sub-modules
//!
//! - `conditions` - In-memory condition manipulation
//! - `phase` - Phase derivation from the owned Deployment
//! - `mutate` - Spec-to-object mutators and owner references
//! - `retry` - Optimistic-concurrency conflict retry
//! - `upsert` - Create-or-update with conflict retry
//! - `status` - Status sub-resource persistence
//! - `reconcile` - The reconciliation pass
//! - `types` - Reconciler context and errors

pub mod conditions;
pub mod mutate;
pub mod phase;
pub mod reconcile;
pub mod retry;
pub mod status;
pub mod types;
pub mod upsert;

pub use conditions::{ConditionFormatError, ConditionUpdate};
pub use phase::{derive_phase, DeploymentReadiness};
pub use reconcile::{reconcile, run_pass, PassOutcome};
pub use retry::{retry_on_conflict, RetryError, RetryPolicy, Retryable};
pub use status::{persist_status, PersistOutcome};
pub use types::{BackoffState, PassStage, Reconciler, ReconcilerError, ReconcilerParts};
pub use upsert::{upsert, UpsertError, UpsertOutcome};
