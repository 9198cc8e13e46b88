//! # Watch Loop
//!
//! Runs the kube-runtime controller: Dashboards are the primary resource, owned
//! Deployments and Services map back to their Dashboard through owner references.

use super::error_policy::{handle_reconciliation_error, report_controller_result};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Dashboard;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Watch all namespaces until SIGINT/SIGTERM
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<()> {
    let dashboards: Api<Dashboard> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client);

    info!("👀 Watching Dashboards, owned Deployments and Services in all namespaces");

    Controller::new(dashboards, watcher::Config::default().any_semantic())
        .owns(deployments, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move { report_controller_result(result) })
        .await;

    // CRITICAL: stop advertising readiness before the pod is torn down
    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controller stopped");
    Ok(())
}
