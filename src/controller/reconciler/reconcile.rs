//! # Reconciliation Pass
//!
//! One level-triggered pass over a Dashboard:
//!
//! 1. **Fetch** the Dashboard by identity (gone ⇒ done)
//! 2. **Converge** `Applied` (upsert Deployment and Service) and `Ready` (health probe)
//!    concurrently; each branch returns its condition updates
//! 3. **Apply** the updates in one sequential step
//! 4. **Persist** conditions, phase and observed generation to the status sub-resource
//!
//! Owned-object failures are absorbed into `Applied=False`. Only fetch, status persistence,
//! branch and timeout failures fail the pass.

use super::conditions::{coalesce_updates, ConditionFormatError, ConditionUpdate};
use super::mutate::{mutate_deployment, mutate_service, set_controller_reference};
use super::status::{persist_status, PersistOutcome};
use super::types::{PassStage, Reconciler, ReconcilerError};
use super::upsert::{upsert, UpsertError};
use crate::constants::{NOT_READY_MESSAGE, NOT_READY_REASON};
use crate::controller::events::transition_events;
use crate::controller::store::ObjectKey;
use crate::crd::{ConditionStatus, ConditionType, Dashboard, DashboardStatus};
use crate::observability;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube_runtime::controller::Action;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Result of a pass that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The Dashboard no longer exists; nothing was touched
    NotFound,
    /// Conditions were computed and handed to the status writer
    Reconciled(PersistOutcome),
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassOutcome::NotFound => write!(f, "not-found"),
            PassOutcome::Reconciled(PersistOutcome::Written(_)) => write!(f, "status-written"),
            PassOutcome::Reconciled(PersistOutcome::Unchanged(_)) => write!(f, "status-unchanged"),
            PassOutcome::Reconciled(PersistOutcome::Gone) => write!(f, "deleted-during-pass"),
        }
    }
}

fn branch_error(condition_type: ConditionType) -> impl Fn(ConditionFormatError) -> ReconcilerError {
    move |source| ReconcilerError::Branch {
        condition_type,
        source,
    }
}

async fn within<T>(
    deadline: Instant,
    budget: Duration,
    stage: PassStage,
    fut: impl Future<Output = T>,
) -> Result<T, ReconcilerError> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_elapsed| ReconcilerError::Timeout {
            stage,
            duration: budget,
        })
}

/// Whether `Applied=True` was recorded for the generation currently in the spec
fn applied_for_current_generation(dashboard: &Dashboard, status: &DashboardStatus) -> bool {
    status.is_condition_true(ConditionType::Applied)
        && status.observed_generation == dashboard.metadata.generation
}

async fn apply_owned_objects(
    ctx: &Reconciler,
    key: &ObjectKey,
    dashboard: &Dashboard,
) -> Result<(), UpsertError> {
    let policy = &ctx.config.conflict_retry;

    upsert(ctx.deployments.as_ref(), key, policy, |deployment: &mut Deployment| {
        mutate_deployment(dashboard, deployment);
        set_controller_reference(dashboard, deployment)
    })
    .await?;

    upsert(ctx.services.as_ref(), key, policy, |service: &mut Service| {
        mutate_service(dashboard, service);
        set_controller_reference(dashboard, service)
    })
    .await?;

    Ok(())
}

/// Applied branch: make the owned objects reflect the spec
async fn converge_applied(
    ctx: &Reconciler,
    key: &ObjectKey,
    dashboard: &Dashboard,
    current: &DashboardStatus,
) -> Result<Vec<ConditionUpdate>, ReconcilerError> {
    let to_error = branch_error(ConditionType::Applied);

    if applied_for_current_generation(dashboard, current) {
        debug!("Applied is True for the current generation, skipping owned object writes");
        return Ok(Vec::new());
    }

    let mut updates = vec![
        ConditionUpdate::new(ConditionType::Applied, ConditionStatus::False, &[]).map_err(&to_error)?,
    ];

    match apply_owned_objects(ctx, key, dashboard).await {
        Ok(()) => {
            updates.push(
                ConditionUpdate::new(ConditionType::Applied, ConditionStatus::True, &[])
                    .map_err(&to_error)?,
            );
        }
        Err(e) => {
            warn!(reason = e.reason(), "❌ Failed to apply owned objects: {}", e);
            let message = e.to_string();
            updates.push(
                ConditionUpdate::new(
                    ConditionType::Applied,
                    ConditionStatus::False,
                    &[e.reason(), &message],
                )
                .map_err(&to_error)?,
            );
        }
    }
    Ok(updates)
}

/// Ready branch: ask the workload whether it is healthy
async fn converge_ready(
    ctx: &Reconciler,
    dashboard: &Dashboard,
) -> Result<Vec<ConditionUpdate>, ReconcilerError> {
    let to_error = branch_error(ConditionType::Ready);

    let update = match ctx.probe.probe(dashboard).await {
        Ok(true) => ConditionUpdate::new(ConditionType::Ready, ConditionStatus::True, &[]),
        Ok(false) => ConditionUpdate::new(
            ConditionType::Ready,
            ConditionStatus::False,
            &[NOT_READY_REASON, NOT_READY_MESSAGE],
        ),
        Err(e) => {
            debug!(reason = e.reason(), "Health probe failed: {}", e);
            ConditionUpdate::new(
                ConditionType::Ready,
                ConditionStatus::False,
                &[e.reason(), e.to_string().as_str()],
            )
        }
    }
    .map_err(to_error)?;

    Ok(vec![update])
}

async fn publish_transitions(ctx: &Reconciler, dashboard: &Dashboard, before: &DashboardStatus, after: &DashboardStatus) {
    for event in transition_events(before, after) {
        if let Err(e) = ctx.events.publish(dashboard, &event).await {
            warn!(reason = event.reason, "Failed to publish event: {}", e);
        }
    }
}

/// Run one pass for `key` under the configured timeout
pub async fn run_pass(ctx: &Reconciler, key: &ObjectKey) -> Result<PassOutcome, ReconcilerError> {
    let budget = ctx.config.reconcile_timeout;
    let deadline = Instant::now() + budget;

    let fetched = within(deadline, budget, PassStage::Fetching, ctx.dashboards.get(key))
        .await?
        .map_err(|source| ReconcilerError::Fetch {
            key: key.clone(),
            source,
        })?;
    let Some(dashboard) = fetched else {
        info!("Dashboard not found, nothing to reconcile");
        return Ok(PassOutcome::NotFound);
    };

    let before = dashboard.status.clone().unwrap_or_default();

    let (applied, ready) = within(deadline, budget, PassStage::Converging, async {
        tokio::try_join!(
            converge_applied(ctx, key, &dashboard, &before),
            converge_ready(ctx, &dashboard)
        )
    })
    .await??;

    let mut computed = before.clone();
    let now = chrono::Utc::now();
    for update in coalesce_updates(applied.into_iter().chain(ready)) {
        computed.apply_update(&update, now);
    }

    let persisted = within(
        deadline,
        budget,
        PassStage::PersistingStatus,
        persist_status(ctx, key, &computed, dashboard.metadata.generation),
    )
    .await?
    .map_err(|source| ReconcilerError::PersistStatus {
        key: key.clone(),
        source,
    })?;

    if let PersistOutcome::Written(after) | PersistOutcome::Unchanged(after) = &persisted {
        // Events never fail the pass, but they share its deadline
        if tokio::time::timeout_at(deadline, publish_transitions(ctx, &dashboard, &before, after))
            .await
            .is_err()
        {
            warn!("Event publishing did not finish before the reconcile deadline");
        }
    }

    Ok(PassOutcome::Reconciled(persisted))
}

/// Controller entry point
///
/// Success waits for the next watch event: owned Deployment and Service changes (including
/// Deployment status moving towards ready) re-trigger the Dashboard.
pub async fn reconcile(dashboard: Arc<Dashboard>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::of(dashboard.as_ref());
    let span = info_span!(
        "controller.reconcile",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        resource.generation = ?dashboard.metadata.generation
    );

    async move {
        let start = std::time::Instant::now();
        observability::metrics::increment_reconciliations();

        let result = run_pass(&ctx, &key).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        match &outcome {
            PassOutcome::NotFound | PassOutcome::Reconciled(PersistOutcome::Gone) => {
                ctx.forget_backoff(&key);
            }
            PassOutcome::Reconciled(_) => ctx.reset_backoff(&key),
        }
        info!(result = %outcome, "✅ Reconciliation complete");
        Ok(Action::await_change())
    }
    .instrument(span)
    .await
}
