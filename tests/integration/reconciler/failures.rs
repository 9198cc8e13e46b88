//! Failure handling: which failures are absorbed into conditions and which fail the pass

use super::common::*;
use sentinel_dashboard_operator::controller::health::ProbeError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use sentinel_dashboard_operator::controller::reconciler::{
    reconcile, run_pass, PassOutcome, PassStage, PersistOutcome, ReconcilerError,
};
use sentinel_dashboard_operator::crd::{ConditionStatus, ConditionType};
use sentinel_dashboard_operator::runtime::handle_reconciliation_error;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_probe_transport_error_sets_ready_false_with_class() {
    let harness = Harness::new(Err(ProbeError::ConnectionFailed {
        url: "http://sentinel.default.svc.cluster.local:8080/version".to_string(),
        message: "dns error: failed to lookup address information".to_string(),
    }));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));

    run_pass(&harness.reconciler, &key()).await.unwrap();

    let status = harness.status();
    let ready = status.condition(ConditionType::Ready);
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason.as_deref(), Some("ProbeConnectionFailed"));
    assert!(ready.message.unwrap().contains("failed to lookup address information"));
    // Applied is independent of the probe
    assert!(status.is_condition_true(ConditionType::Applied));
}

#[tokio::test]
async fn test_owned_object_failure_is_absorbed() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.deployments.write_failure.lock().unwrap() =
        Some("deployments.apps is forbidden".to_string());

    run_pass(&harness.reconciler, &key())
        .await
        .expect("owned object failures must not fail the pass");

    let applied = harness.status().condition(ConditionType::Applied);
    assert_eq!(applied.status, ConditionStatus::False);
    assert_eq!(applied.reason.as_deref(), Some("WriteFailed"));
    assert!(applied.message.unwrap().contains("deployments.apps is forbidden"));

    // Service is only attempted after the Deployment succeeded
    assert_eq!(harness.services.writes(), 0);
    assert!(harness.events.reasons().contains(&"ApplyFailed"));
}

#[tokio::test]
async fn test_service_failure_after_deployment_is_absorbed() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.services.write_failure.lock().unwrap() = Some("services is forbidden".to_string());

    run_pass(&harness.reconciler, &key())
        .await
        .expect("owned object failures must not fail the pass");

    assert!(harness.deployments.stored(&key()).is_some());
    assert_eq!(harness.deployments.creates.load(Ordering::SeqCst), 1);
    assert!(harness.services.stored(&key()).is_none());

    let status = harness.status();
    let applied = status.condition(ConditionType::Applied);
    assert_eq!(applied.status, ConditionStatus::False);
    assert_eq!(applied.reason.as_deref(), Some("WriteFailed"));
    assert!(applied.message.unwrap().contains("services is forbidden"));
    assert!(!harness.events.reasons().contains(&"Applied"));
    assert!(harness.events.reasons().contains(&"ApplyFailed"));
}

#[tokio::test]
async fn test_deleting_owner_is_not_adopted() {
    let harness = Harness::new(Ok(true));
    let mut dashboard = new_dashboard("app:v1", 1);
    dashboard.metadata.deletion_timestamp =
        Some(serde_json::from_value::<Time>(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
    harness.dashboards.insert(&key(), dashboard);

    run_pass(&harness.reconciler, &key()).await.unwrap();

    let applied = harness.status().condition(ConditionType::Applied);
    assert_eq!(applied.status, ConditionStatus::False);
    assert_eq!(applied.reason.as_deref(), Some("OwnerReferenceFailed"));
    assert!(applied.message.unwrap().contains("being deleted"));
    assert_eq!(harness.deployments.writes(), 0);
    assert_eq!(harness.services.writes(), 0);
}

#[tokio::test]
async fn test_stuck_event_publishing_respects_pass_deadline() {
    let config = sentinel_dashboard_operator::config::ControllerConfig {
        reconcile_timeout: Duration::from_millis(200),
        ..test_config()
    };
    let harness = Harness::with_config(Ok(true), config);
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.events.delay.lock().unwrap() = Duration::from_secs(30);

    let outcome = tokio::time::timeout(Duration::from_secs(2), run_pass(&harness.reconciler, &key()))
        .await
        .expect("pass must end at its deadline")
        .expect("event publishing never fails the pass");

    assert!(matches!(outcome, PassOutcome::Reconciled(PersistOutcome::Written(_))));
    assert!(harness.status().is_condition_true(ConditionType::Applied));
}

#[tokio::test]
async fn test_deleted_dashboard_drops_backoff_state() {
    let harness = Harness::new(Ok(true));
    let dashboard = Arc::new(new_dashboard("app:v1", 1));
    let error = ReconcilerError::Timeout {
        stage: PassStage::Fetching,
        duration: Duration::from_secs(1),
    };
    handle_reconciliation_error(dashboard.clone(), &error, harness.reconciler.clone());
    assert!(harness
        .reconciler
        .backoff_states
        .lock()
        .unwrap()
        .contains_key(&key().to_string()));

    reconcile(dashboard, harness.reconciler.clone()).await.unwrap();

    assert!(harness.reconciler.backoff_states.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_apply_is_retried_on_next_pass() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.deployments.write_failure.lock().unwrap() = Some("quota exceeded".to_string());
    run_pass(&harness.reconciler, &key()).await.unwrap();

    *harness.deployments.write_failure.lock().unwrap() = None;
    run_pass(&harness.reconciler, &key()).await.unwrap();

    assert!(harness.status().is_condition_true(ConditionType::Applied));
    assert_eq!(harness.deployments.creates.load(Ordering::SeqCst), 1);
    assert_eq!(harness.services.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fetch_failure_fails_the_pass() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.dashboards.read_failure.lock().unwrap() = Some("etcdserver: request timed out".to_string());

    let err = run_pass(&harness.reconciler, &key()).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Fetch { .. }));
    assert_eq!(harness.deployments.writes(), 0);
}

#[tokio::test]
async fn test_slow_pass_times_out_naming_the_stage() {
    let config = sentinel_dashboard_operator::config::ControllerConfig {
        reconcile_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let harness = Harness::with_config(Ok(true), config);
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.probe.delay.lock().unwrap() = Duration::from_millis(500);

    let err = run_pass(&harness.reconciler, &key()).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Timeout {
            stage: PassStage::Converging,
            ..
        }
    ));
    assert_eq!(harness.dashboards.status_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_policy_backs_off_per_resource() {
    let harness = Harness::new(Ok(true));
    let dashboard = Arc::new(new_dashboard("app:v1", 1));
    let error = ReconcilerError::Timeout {
        stage: PassStage::Fetching,
        duration: Duration::from_secs(1),
    };

    let delays: Vec<_> = (0..4)
        .map(|_| handle_reconciliation_error(dashboard.clone(), &error, harness.reconciler.clone()))
        .collect();

    let expected: Vec<_> = [5, 5, 10, 15]
        .into_iter()
        .map(|secs| kube_runtime::controller::Action::requeue(Duration::from_secs(secs)))
        .collect();
    assert_eq!(delays, expected);

    // Success resets the sequence
    harness.reconciler.reset_backoff(&key());
    let action = handle_reconciliation_error(dashboard, &error, harness.reconciler.clone());
    assert_eq!(action, kube_runtime::controller::Action::requeue(Duration::from_secs(5)));
}
