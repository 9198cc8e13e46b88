//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! Failed passes are requeued with per-resource Fibonacci backoff; stream errors are
//! classified and logged.

use crate::constants;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::crd::Dashboard;
use crate::observability;
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing Dashboard does not delay others.
pub fn handle_reconciliation_error(
    obj: Arc<Dashboard>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ObjectKey::of(obj.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        error.kind = error.kind(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    observability::metrics::increment_reconciliation_errors();

    let (delay, error_count) = ctx.next_error_backoff(&key).unwrap_or((
        Duration::from_secs(constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS),
        0,
    ));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        delay.as_secs(),
        error_count
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Class of a watch stream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401/403: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old; the watcher relists
    Expired,
    /// 429: API server throttling or storage re-initializing
    Throttled,
    Other,
}

/// Classify a watch error from its rendered message
pub fn classify_watch_error(message: &str) -> WatchErrorClass {
    if message.contains("401") || message.contains("403") || message.contains("Unauthorized") || message.contains("Forbidden") {
        WatchErrorClass::Unauthorized
    } else if message.contains("410") || message.contains("too old resource version") || message.contains("Expired") {
        WatchErrorClass::Expired
    } else if message.contains("429") || message.contains("TooManyRequests") || message.contains("storage is (re)initializing") {
        WatchErrorClass::Throttled
    } else {
        WatchErrorClass::Other
    }
}

/// Log one item of the controller output stream
pub fn report_controller_result(
    result: Result<(ObjectRef<Dashboard>, Action), controller::Error<ReconcilerError, watcher::Error>>,
) {
    match result {
        Ok((obj, _action)) => debug!(resource = %obj, "reconciled"),
        Err(controller::Error::ObjectNotFound(obj)) => {
            debug!(resource = %obj, "Dashboard not found (likely deleted), continuing watch...");
        }
        // Already logged and counted by handle_reconciliation_error
        Err(controller::Error::ReconcilerFailed(_, obj)) => {
            debug!(resource = %obj, "reconciliation failed, requeued with backoff");
        }
        Err(controller::Error::QueueError(e)) => {
            let message = e.to_string();
            match classify_watch_error(&message) {
                WatchErrorClass::Unauthorized => {
                    error!("❌ Watch authentication failed - RBAC may have been revoked or token expired: {}", message);
                    error!("   Verify permissions: kubectl auth can-i watch dashboards.sentinel.sentinelguard.io --as=system:serviceaccount:<namespace>:{}", constants::CONTROLLER_NAME);
                }
                WatchErrorClass::Expired => {
                    warn!("Watch resource version expired (410) - watch will restart");
                }
                WatchErrorClass::Throttled => {
                    warn!("API server is throttling watches (429), watcher backs off: {}", message);
                }
                WatchErrorClass::Other => error!("Controller stream error: {}", message),
            }
        }
        Err(e) => error!("Controller stream error: {}", e),
    }
}
