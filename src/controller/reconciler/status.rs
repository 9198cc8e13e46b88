//! # Status Persistence
//!
//! Writes the conditions computed by a pass to the Dashboard status sub-resource.

use super::phase::{derive_phase, DeploymentReadiness};
use super::retry::{retry_on_conflict, RetryError};
use super::types::Reconciler;
use crate::controller::store::{ObjectKey, StoreError};
use crate::crd::DashboardStatus;
use kube::ResourceExt;
use tracing::{debug, info};

/// What persisting the status did
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// The status sub-resource was written
    Written(DashboardStatus),
    /// The stored status already matched; nothing was written
    Unchanged(DashboardStatus),
    /// The Dashboard was deleted during the pass
    Gone,
}

async fn persist_once(
    ctx: &Reconciler,
    key: &ObjectKey,
    computed: &DashboardStatus,
    observed_generation: Option<i64>,
) -> Result<PersistOutcome, StoreError> {
    // CRITICAL: always start from a fresh read; a retried write must carry the latest
    // resourceVersion or it conflicts forever
    let Some(latest) = ctx.dashboards.get(key).await? else {
        return Ok(PersistOutcome::Gone);
    };

    let deployment = ctx.deployments.get(key).await?;
    let readiness = deployment.as_ref().and_then(DeploymentReadiness::from_deployment);

    let mut status = latest.status.clone().unwrap_or_default();
    status.conditions.clone_from(&computed.conditions);
    status.phase = Some(derive_phase(readiness, latest.spec.desired_replicas()));
    status.observed_generation = observed_generation;

    if latest.status.as_ref() == Some(&status) {
        debug!("Skipping status update - status unchanged");
        return Ok(PersistOutcome::Unchanged(status));
    }

    match ctx
        .status
        .update_status(key, latest.resource_version().as_deref(), &status)
        .await
    {
        Ok(_) => Ok(PersistOutcome::Written(status)),
        Err(StoreError::NotFound(_)) => Ok(PersistOutcome::Gone),
        Err(e) => Err(e),
    }
}

/// Persist `computed` conditions, the derived phase and `observed_generation`
///
/// `observed_generation` is the generation the pass converged, not the one found on the
/// re-read; a spec edit racing the pass must not be marked as observed.
pub async fn persist_status(
    ctx: &Reconciler,
    key: &ObjectKey,
    computed: &DashboardStatus,
    observed_generation: Option<i64>,
) -> Result<PersistOutcome, RetryError<StoreError>> {
    let outcome = retry_on_conflict(&ctx.config.conflict_retry, "update-status", || {
        persist_once(ctx, key, computed, observed_generation)
    })
    .await?;

    match &outcome {
        PersistOutcome::Written(status) => info!(
            phase = ?status.phase,
            "📝 Updated dashboard status"
        ),
        PersistOutcome::Unchanged(_) => {}
        PersistOutcome::Gone => info!("Dashboard deleted during reconciliation, skipping status update"),
    }
    Ok(outcome)
}
