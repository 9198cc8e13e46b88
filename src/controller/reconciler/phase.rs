//! # Phase Derivation
//!
//! Projects the observed state of the owned Deployment onto the Dashboard phase.

use crate::crd::Phase;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};

/// Readiness signal extracted from a Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentReadiness {
    /// `Some(true)` when the readiness condition is True, `Some(false)` when False,
    /// `None` when the condition is Unknown
    pub ready: Option<bool>,
    /// Number of ready pods reported by the Deployment
    pub ready_replicas: i32,
}

impl DeploymentReadiness {
    /// Extract readiness from a Deployment status
    ///
    /// Uses the `Available` condition, falling back to the first reported condition.
    /// Returns `None` while no condition has been reported.
    pub fn from_status(status: &DeploymentStatus) -> Option<Self> {
        let conditions = status.conditions.as_ref()?;
        let condition = conditions
            .iter()
            .find(|c| c.type_ == "Available")
            .or_else(|| conditions.first())?;

        let ready = match condition.status.as_str() {
            "True" => Some(true),
            "False" => Some(false),
            _ => None,
        };

        Some(Self {
            ready,
            ready_replicas: status.ready_replicas.unwrap_or(0),
        })
    }

    /// Extract readiness from a whole Deployment, if it has reported any status
    pub fn from_deployment(deployment: &Deployment) -> Option<Self> {
        deployment.status.as_ref().and_then(Self::from_status)
    }
}

/// Derive the Dashboard phase
///
/// | observed                              | phase    |
/// |---------------------------------------|----------|
/// | no deployment status                  | Waiting  |
/// | ready, readyReplicas == desired       | Running  |
/// | not ready                             | NotReady |
/// | anything else                         | Waiting  |
pub fn derive_phase(observed: Option<DeploymentReadiness>, desired_replicas: i32) -> Phase {
    match observed {
        None => Phase::Waiting,
        Some(DeploymentReadiness {
            ready: Some(true),
            ready_replicas,
        }) if ready_replicas == desired_replicas => Phase::Running,
        Some(DeploymentReadiness {
            ready: Some(false), ..
        }) => Phase::NotReady,
        Some(_) => Phase::Waiting,
    }
}
