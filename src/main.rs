//! # Sentinel Dashboard Operator
//!
//! A Kubernetes operator that converges `Dashboard` resources
//! (`sentinel.sentinelguard.io/v1alpha1`) into an owned Deployment and Service.
//!
//! ## Overview
//!
//! For every Dashboard the operator:
//!
//! 1. **Applies** a Deployment and a Service named after the Dashboard, linked back to it
//!    with a controller owner reference
//! 2. **Probes** the dashboard through its Service
//! 3. **Reports** `Applied` and `Ready` conditions plus a `phase` on the status
//!
//! Owned object changes trigger a new pass, so drift and rollouts are picked up without
//! polling. Deleting a Dashboard garbage-collects its objects through owner references.
//!
//! ## Features
//!
//! - **Optimistic concurrency**: conflicting writes are retried with a configurable policy
//! - **Multi-namespace**: watches Dashboards across all namespaces
//! - **Prometheus metrics** and **health probes** on the metrics port

use anyhow::Result;
use sentinel_dashboard_operator::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.client,
        init_result.reconciler,
        init_result.server_state,
    )
    .await
}
