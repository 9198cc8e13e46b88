//! # dashctl
//!
//! Command-line interface for Dashboards managed by the Sentinel Dashboard Operator.
//!
//! ## Usage
//!
//! ```bash
//! # Force a reconciliation pass for a Dashboard
//! dashctl reconcile --namespace default --name sentinel-dashboard
//!
//! # List all Dashboards
//! dashctl list
//!
//! # Show conditions and phase of a Dashboard
//! dashctl status --namespace default --name sentinel-dashboard
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use sentinel_dashboard_operator::constants::{CONTROLLER_NAME, RECONCILE_REQUEST_ANNOTATION};
use sentinel_dashboard_operator::crd::{ConditionType, Dashboard};
use serde_json::json;

/// Sentinel Dashboard Operator CLI
#[derive(Debug, Parser)]
#[command(name = "dashctl")]
#[command(about = "Inspect and nudge Sentinel Dashboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to `default`, or all namespaces for `list`)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Force a reconciliation pass by annotating the Dashboard
    Reconcile {
        /// Name of the Dashboard
        #[arg(long)]
        name: String,
    },
    /// List Dashboards with their phase and conditions
    List,
    /// Show the status of a Dashboard
    Status {
        /// Name of the Dashboard
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::Reconcile { name } => reconcile_command(client, &name, cli.namespace).await,
        Commands::List => list_command(client, cli.namespace).await,
        Commands::Status { name } => status_command(client, &name, cli.namespace).await,
    }
}

/// Touch the reconcile-request annotation; the metadata change is a watch event
async fn reconcile_command(client: Client, name: &str, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<Dashboard> = Api::namespaced(client, ns);

    let timestamp = chrono::Utc::now().to_rfc3339();
    let patch = json!({
        "metadata": {
            "annotations": {
                RECONCILE_REQUEST_ANNOTATION: timestamp
            }
        }
    });

    api.patch(
        name,
        &PatchParams {
            field_manager: Some(format!("{CONTROLLER_NAME}-cli")),
            ..Default::default()
        },
        &Patch::Merge(patch),
    )
    .await
    .with_context(|| format!("Failed to trigger reconciliation for '{ns}/{name}'"))?;

    println!("✅ Reconciliation triggered for Dashboard '{ns}/{name}' at {timestamp}");
    Ok(())
}

fn condition_cell(dashboard: &Dashboard, condition_type: ConditionType) -> String {
    dashboard
        .status
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |s| s.condition(condition_type).status.to_string())
}

async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<Dashboard> = match namespace.as_deref() {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };

    let dashboards = api
        .list(&ListParams::default())
        .await
        .context("Failed to list Dashboard resources")?;

    if dashboards.items.is_empty() {
        println!("No Dashboard resources found.");
        return Ok(());
    }

    println!(
        "{:<30} {:<20} {:<10} {:<10} {:<10}",
        "NAME", "NAMESPACE", "PHASE", "APPLIED", "READY"
    );
    for dashboard in &dashboards.items {
        let phase = dashboard
            .status
            .as_ref()
            .and_then(|s| s.phase)
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:<30} {:<20} {:<10} {:<10} {:<10}",
            dashboard.metadata.name.as_deref().unwrap_or("<unknown>"),
            dashboard.metadata.namespace.as_deref().unwrap_or("<unknown>"),
            phase,
            condition_cell(dashboard, ConditionType::Applied),
            condition_cell(dashboard, ConditionType::Ready),
        );
    }
    Ok(())
}

async fn status_command(client: Client, name: &str, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<Dashboard> = Api::namespaced(client, ns);

    let dashboard = api
        .get(name)
        .await
        .with_context(|| format!("Failed to get Dashboard '{ns}/{name}'"))?;

    println!("Dashboard {ns}/{name}");
    println!("  Image: {}", dashboard.spec.image);
    println!("  Replicas: {}", dashboard.spec.desired_replicas());
    println!("  Port: {}", dashboard.spec.primary_port());
    if let Some(generation) = dashboard.metadata.generation {
        println!("  Generation: {generation}");
    }

    let Some(status) = &dashboard.status else {
        println!("\nStatus: not reconciled yet");
        return Ok(());
    };

    if let Some(phase) = status.phase {
        println!("  Phase: {phase}");
    }
    if let Some(observed) = status.observed_generation {
        println!("  Observed Generation: {observed}");
    }

    println!("\nConditions:");
    for condition in &status.conditions {
        println!("  {}: {}", condition.r#type, condition.status);
        if let Some(reason) = &condition.reason {
            println!("    Reason: {reason}");
        }
        if let Some(message) = &condition.message {
            println!("    Message: {message}");
        }
        if let Some(time) = &condition.last_transition_time {
            println!("    Last Transition: {time}");
        }
    }
    Ok(())
}
