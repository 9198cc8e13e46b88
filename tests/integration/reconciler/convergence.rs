//! Happy-path convergence: first pass, redelivery, spec edits, readiness

use super::common::*;
use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
use kube::ResourceExt;
use sentinel_dashboard_operator::controller::reconciler::{reconcile, run_pass, PassOutcome, PersistOutcome};
use sentinel_dashboard_operator::crd::{ConditionStatus, ConditionType, Phase};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn mark_deployment_available(harness: &Harness, ready_replicas: i32) {
    harness.deployments.modify(&key(), |deployment| {
        deployment.status = Some(DeploymentStatus {
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ready_replicas: Some(ready_replicas),
            ..Default::default()
        });
    });
}

#[tokio::test]
async fn test_first_pass_creates_owned_objects() {
    let harness = Harness::new(Ok(false));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));

    let outcome = run_pass(&harness.reconciler, &key()).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Reconciled(PersistOutcome::Written(_))));

    let deployment = harness.deployments.stored(&key()).expect("deployment created");
    let spec = deployment.spec.as_ref().unwrap();
    assert_eq!(spec.replicas, Some(3));
    let pod_spec = spec.template.spec.as_ref().unwrap();
    assert_eq!(pod_spec.containers[0].image.as_deref(), Some("app:v1"));
    assert_eq!(deployment.labels().get("app").map(String::as_str), Some(NAME));

    let owners = deployment.owner_references();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "Dashboard");
    assert_eq!(owners[0].uid, "uid-sentinel");
    assert_eq!(owners[0].controller, Some(true));

    let service = harness.services.stored(&key()).expect("service created");
    let service_spec = service.spec.as_ref().unwrap();
    assert_eq!(service_spec.type_.as_deref(), Some("ClusterIP"));
    assert_eq!(service_spec.ports.as_ref().unwrap()[0].port, 8080);
    assert_eq!(service.owner_references()[0].uid, "uid-sentinel");

    let status = harness.status();
    assert_eq!(status.condition(ConditionType::Applied).status, ConditionStatus::True);
    let ready = status.condition(ConditionType::Ready);
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason.as_deref(), Some("DeploymentOrServiceNotReady"));
    assert_eq!(ready.message.as_deref(), Some("deployment or service not ready"));
    assert_eq!(status.phase, Some(Phase::Waiting));
    assert_eq!(status.observed_generation, Some(1));

    let types: Vec<_> = status.conditions.iter().map(|c| c.r#type.as_str()).collect();
    assert_eq!(types, vec!["Applied", "Ready"]);

    assert_eq!(harness.events.reasons(), vec!["Applied", "HealthCheckFailed"]);
}

#[tokio::test]
async fn test_redelivered_pass_is_idempotent() {
    let harness = Harness::new(Ok(false));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));

    run_pass(&harness.reconciler, &key()).await.unwrap();
    let first_status = harness.status();
    let deployment_writes = harness.deployments.writes();
    let service_writes = harness.services.writes();
    let status_writes = harness.dashboards.status_writes.load(Ordering::SeqCst);
    let events = harness.events.reasons().len();

    let outcome = run_pass(&harness.reconciler, &key()).await.unwrap();

    assert!(matches!(outcome, PassOutcome::Reconciled(PersistOutcome::Unchanged(_))));
    assert_eq!(harness.deployments.writes(), deployment_writes);
    assert_eq!(harness.services.writes(), service_writes);
    assert_eq!(harness.dashboards.status_writes.load(Ordering::SeqCst), status_writes);
    assert_eq!(harness.status(), first_status);
    assert_eq!(harness.events.reasons().len(), events);
}

#[tokio::test]
async fn test_spec_edit_reapplies_owned_objects() {
    let harness = Harness::new(Ok(false));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));
    run_pass(&harness.reconciler, &key()).await.unwrap();

    harness
        .dashboards
        .modify(&key(), |d| d.spec.image = "app:v2".to_string());
    assert_eq!(harness.dashboard().metadata.generation, Some(2));

    run_pass(&harness.reconciler, &key()).await.unwrap();

    let deployment = harness.deployments.stored(&key()).unwrap();
    let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
    assert_eq!(pod_spec.containers[0].image.as_deref(), Some("app:v2"));
    assert_eq!(harness.deployments.replaces.load(Ordering::SeqCst), 1);
    // Service did not change, so it is not rewritten
    assert_eq!(harness.services.replaces.load(Ordering::SeqCst), 0);

    let status = harness.status();
    assert_eq!(status.observed_generation, Some(2));
    assert!(status.is_condition_true(ConditionType::Applied));
}

#[tokio::test]
async fn test_spec_edit_keeps_applied_transition_time() {
    let harness = Harness::new(Ok(false));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));
    run_pass(&harness.reconciler, &key()).await.unwrap();
    let applied_before = harness.status().condition(ConditionType::Applied);

    // Transition times have second resolution
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    harness
        .dashboards
        .modify(&key(), |d| d.spec.image = "app:v2".to_string());
    run_pass(&harness.reconciler, &key()).await.unwrap();

    let applied_after = harness.status().condition(ConditionType::Applied);
    assert_eq!(applied_after.status, ConditionStatus::True);
    assert_eq!(
        applied_after.last_transition_time, applied_before.last_transition_time,
        "Applied stayed True, so its transition time must not move"
    );
    assert_eq!(harness.deployments.replaces.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ready_deployment_reports_running() {
    let harness = Harness::new(Ok(false));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));
    run_pass(&harness.reconciler, &key()).await.unwrap();

    mark_deployment_available(&harness, 3);
    harness.probe.set(Ok(true));
    run_pass(&harness.reconciler, &key()).await.unwrap();

    let status = harness.status();
    assert_eq!(status.phase, Some(Phase::Running));
    assert!(status.is_condition_true(ConditionType::Ready));
    assert_eq!(status.condition(ConditionType::Ready).reason, None);
    assert!(harness.events.reasons().contains(&"Ready"));
}

#[tokio::test]
async fn test_partial_rollout_stays_waiting() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 3));
    run_pass(&harness.reconciler, &key()).await.unwrap();

    mark_deployment_available(&harness, 1);
    run_pass(&harness.reconciler, &key()).await.unwrap();

    assert_eq!(harness.status().phase, Some(Phase::Waiting));
}

#[tokio::test]
async fn test_missing_dashboard_is_success_without_writes() {
    let harness = Harness::new(Ok(true));

    let outcome = run_pass(&harness.reconciler, &key()).await.unwrap();

    assert_eq!(outcome, PassOutcome::NotFound);
    assert_eq!(harness.deployments.writes(), 0);
    assert_eq!(harness.services.writes(), 0);
    assert_eq!(harness.dashboards.status_writes.load(Ordering::SeqCst), 0);
    assert_eq!(harness.probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dashboard_deleted_during_pass() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    *harness.probe.delay.lock().unwrap() = std::time::Duration::from_millis(200);

    let reconciler = Arc::clone(&harness.reconciler);
    let pass = tokio::spawn(async move { run_pass(&reconciler, &key()).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    harness.dashboards.remove(&key());

    let outcome = pass.await.unwrap().unwrap();
    assert_eq!(outcome, PassOutcome::Reconciled(PersistOutcome::Gone));
    assert_eq!(harness.dashboards.status_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reconcile_waits_for_next_change() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));

    let action = reconcile(Arc::new(harness.dashboard()), Arc::clone(&harness.reconciler))
        .await
        .unwrap();

    assert_eq!(action, kube_runtime::controller::Action::await_change());
}
