//! # Reconciler Types
//!
//! Shared context handed to every reconciliation pass, plus the pass error type.

use super::conditions::ConditionFormatError;
use super::retry::RetryError;
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::health::{HealthProbe, HttpHealthProbe};
use crate::controller::store::{KubeStore, ObjectKey, ObjectStore, StatusWriter, StoreError};
use crate::crd::{ConditionType, Dashboard};
use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Stage of a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    Fetching,
    Converging,
    PersistingStatus,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStage::Fetching => write!(f, "fetching"),
            PassStage::Converging => write!(f, "converging"),
            PassStage::PersistingStatus => write!(f, "persisting status"),
        }
    }
}

/// Error that aborts a pass and sends it to `error_policy`
///
/// Owned-object write failures never show up here; they end in `Applied=False`.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to fetch dashboard {key}: {source}")]
    Fetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
    #[error("failed to persist status of {key}: {source}")]
    PersistStatus {
        key: ObjectKey,
        #[source]
        source: RetryError<StoreError>,
    },
    #[error("failed to compute {condition_type} condition: {source}")]
    Branch {
        condition_type: ConditionType,
        #[source]
        source: ConditionFormatError,
    },
    #[error("reconciliation timed out after {duration:?} while {stage}")]
    Timeout { stage: PassStage, duration: Duration },
}

impl ReconcilerError {
    /// Metric label / log token for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Fetch { .. } => "fetch",
            ReconcilerError::PersistStatus { .. } => "persist-status",
            ReconcilerError::Branch { .. } => "branch",
            ReconcilerError::Timeout { .. } => "timeout",
        }
    }
}

/// Error backoff of one Dashboard
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Collaborators of the reconciler, for wiring fakes in tests
pub struct ReconcilerParts {
    pub dashboards: Arc<dyn ObjectStore<Dashboard>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub status: Arc<dyn StatusWriter>,
    pub probe: Arc<dyn HealthProbe>,
    pub events: Arc<dyn EventPublisher>,
    pub config: ControllerConfig,
}

impl fmt::Debug for ReconcilerParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerParts")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reconciler context shared by all passes
pub struct Reconciler {
    pub dashboards: Arc<dyn ObjectStore<Dashboard>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub status: Arc<dyn StatusWriter>,
    pub probe: Arc<dyn HealthProbe>,
    pub events: Arc<dyn EventPublisher>,
    pub config: Arc<ControllerConfig>,
    /// Per-resource error backoff, keyed by `namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler backed by the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig) -> Result<Self> {
        let store = Arc::new(KubeStore::new(client.clone()));
        let probe = HttpHealthProbe::new(config.health_probe.clone())
            .context("Failed to build health probe HTTP client")?;

        // Clone as Arc<KubeStore>; each field unsizes it to its own trait object
        Ok(Self::from_parts(ReconcilerParts {
            dashboards: Arc::<KubeStore>::clone(&store),
            deployments: Arc::<KubeStore>::clone(&store),
            services: Arc::<KubeStore>::clone(&store),
            status: store,
            probe: Arc::new(probe),
            events: Arc::new(KubeEventPublisher::new(client)),
            config,
        }))
    }

    pub fn from_parts(parts: ReconcilerParts) -> Self {
        Self {
            dashboards: parts.dashboards,
            deployments: parts.deployments,
            services: parts.services,
            status: parts.status,
            probe: parts.probe,
            events: parts.events,
            config: Arc::new(parts.config),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the error history of `key` after a successful pass
    pub fn reset_backoff(&self, key: &ObjectKey) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                if let Some(state) = states.get_mut(&key.to_string()) {
                    state.reset();
                }
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Drop the error history of a Dashboard that no longer exists
    pub fn forget_backoff(&self, key: &ObjectKey) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(&key.to_string());
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Record a failed pass of `key`; returns the requeue delay and the error count
    pub fn next_error_backoff(&self, key: &ObjectKey) -> Option<(Duration, u32)> {
        let mut states = match self.backoff_states.lock() {
            Ok(states) => states,
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                return None;
            }
        };
        let state = states.entry(key.to_string()).or_insert_with(|| {
            BackoffState::new(
                self.config.error_backoff_min_secs,
                self.config.error_backoff_max_secs,
            )
        });
        state.increment_error();
        Some((
            Duration::from_secs(state.backoff.next_backoff_seconds()),
            state.error_count,
        ))
    }
}
