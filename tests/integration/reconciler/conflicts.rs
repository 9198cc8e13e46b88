//! Optimistic-concurrency conflicts on owned objects and on the status sub-resource

use super::common::*;
use k8s_openapi::api::core::v1::Service;
use sentinel_dashboard_operator::controller::reconciler::mutate::MutateError;
use sentinel_dashboard_operator::controller::reconciler::{
    run_pass, upsert, ReconcilerError, RetryError, RetryPolicy, UpsertOutcome,
};
use sentinel_dashboard_operator::crd::{ConditionStatus, ConditionType};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_owned_object_conflicts_below_limit_converge() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    harness.deployments.write_conflicts.store(4, Ordering::SeqCst);

    run_pass(&harness.reconciler, &key()).await.unwrap();

    assert!(harness.status().is_condition_true(ConditionType::Applied));
    assert_eq!(harness.deployments.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_owned_object_conflicts_at_limit_are_reported() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    harness.deployments.write_conflicts.store(5, Ordering::SeqCst);

    run_pass(&harness.reconciler, &key()).await.unwrap();

    let applied = harness.status().condition(ConditionType::Applied);
    assert_eq!(applied.status, ConditionStatus::False);
    assert_eq!(applied.reason.as_deref(), Some("ConflictRetriesExhausted"));
    assert!(harness.deployments.stored(&key()).is_none());
}

#[tokio::test]
async fn test_upsert_reports_each_outcome() {
    let store = MemoryStore::<Service>::default();
    let owner = {
        let mut d = new_dashboard("app:v1", 1);
        d.metadata.namespace = Some(NAMESPACE.to_string());
        d.metadata.uid = Some("uid-sentinel".to_string());
        d
    };
    let policy = RetryPolicy::immediate(5);
    let mutate = |svc: &mut Service| -> Result<(), MutateError> {
        sentinel_dashboard_operator::controller::reconciler::mutate::mutate_service(&owner, svc);
        sentinel_dashboard_operator::controller::reconciler::mutate::set_controller_reference(&owner, svc)
    };

    let first = upsert(&store, &key(), &policy, mutate).await.unwrap();
    assert_eq!(first, UpsertOutcome::Created);
    // Another client strips the owner link; the next upsert restores it
    store.modify(&key(), |svc| {
        svc.metadata.owner_references = None;
    });

    let second = upsert(&store, &key(), &policy, mutate).await.unwrap();
    assert_eq!(second, UpsertOutcome::Updated);

    let third = upsert(&store, &key(), &policy, mutate).await.unwrap();
    assert_eq!(third, UpsertOutcome::Unchanged);
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.replaces.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_race_falls_back_to_update() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 2));
    *harness.deployments.racing_create.lock().unwrap() = Some(Default::default());

    run_pass(&harness.reconciler, &key()).await.unwrap();

    assert!(harness.status().is_condition_true(ConditionType::Applied));
    assert_eq!(harness.deployments.creates.load(Ordering::SeqCst), 0);
    assert_eq!(harness.deployments.replaces.load(Ordering::SeqCst), 1);
    let deployment = harness.deployments.stored(&key()).unwrap();
    assert_eq!(deployment.spec.unwrap().replicas, Some(2));
    assert_eq!(deployment.metadata.owner_references.unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_conflicts_below_limit_persist() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    harness.dashboards.status_conflicts.store(4, Ordering::SeqCst);

    run_pass(&harness.reconciler, &key()).await.unwrap();

    assert_eq!(harness.dashboards.status_writes.load(Ordering::SeqCst), 1);
    assert!(harness.status().is_condition_true(ConditionType::Ready));
}

#[tokio::test]
async fn test_status_conflicts_at_limit_fail_the_pass() {
    let harness = Harness::new(Ok(true));
    harness.dashboards.insert(&key(), new_dashboard("app:v1", 1));
    harness.dashboards.status_conflicts.store(5, Ordering::SeqCst);

    let err = run_pass(&harness.reconciler, &key()).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::PersistStatus {
            source: RetryError::Exhausted { attempts: 5, .. },
            ..
        }
    ));
    assert!(harness.dashboard().status.is_none());
}
