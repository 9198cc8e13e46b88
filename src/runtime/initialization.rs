//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, probe server startup,
//! Kubernetes client and reconciler context.

use crate::config::{self, ServerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::Dashboard;
use crate::observability;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Components needed by the watch loop
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .field("server_state", &self.server_state)
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_dashboard_operator=info".into()),
        )
        .try_init()
    {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
pub async fn initialize() -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    init_tracing();

    info!("Starting Sentinel Dashboard Operator v{}", env!("CARGO_PKG_VERSION"));

    let (controller_config, server_config) = config::load_config();
    info!(
        conflict_retry_attempts = controller_config.conflict_retry.max_attempts,
        reconcile_timeout_secs = controller_config.reconcile_timeout.as_secs(),
        probe_timeout_secs = controller_config.health_probe.timeout.as_secs(),
        "Loaded controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    let server_state_clone = Arc::clone(&server_state);
    let server_addr = server_config.socket_addr();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_addr, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    // Readiness probes must pass before the watch loop starts
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    check_crd_queryable(&client).await;

    let reconciler = Arc::new(Reconciler::new(client.clone(), controller_config)?);

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout;
    let poll_interval = server_config.poll_interval;
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log the Dashboards present at startup, or why the CRD cannot be listed
///
/// Not fatal: the watcher keeps retrying until the CRD is installed.
async fn check_crd_queryable(client: &Client) {
    let dashboards: Api<Dashboard> = Api::all(client.clone());

    match dashboards.list(&ListParams::default()).await {
        Ok(list) => {
            info!(
                "CRD is queryable, found {} existing Dashboard resources",
                list.items.len()
            );

            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.metadata.namespace.clone().unwrap_or_else(|| "default".to_string()))
                    .or_default()
                    .push(item.metadata.name.clone().unwrap_or_default());
            }
            for (namespace, mut names) in by_namespace {
                names.sort();
                info!("  {}: {}", namespace, names.join(", "));
            }
        }
        Err(e) => {
            error!("CRD is not queryable; {}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
