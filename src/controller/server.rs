//! # HTTP Server
//!
//! Serves Prometheus metrics and the liveness/readiness probes of the operator pod.
//!
//! - `/metrics` - Prometheus text format
//! - `/healthz` - liveness, always `200` while the process runs
//! - `/readyz` - readiness, `200` once the listener is bound, `503` before

use crate::observability;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state of the probe server
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    /// Flipped to `true` once the listener is bound
    pub is_ready: Arc<AtomicBool>,
}

async fn metrics_handler() -> impl IntoResponse {
    match observability::metrics::gather_text() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Router with the metrics and probe endpoints
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits
///
/// Marks the state ready right after the bind succeeds.
pub async fn start_server(addr: SocketAddr, state: Arc<ServerState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;

    state.is_ready.store(true, Ordering::Relaxed);
    info!("✅ HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server terminated")?;
    Ok(())
}
