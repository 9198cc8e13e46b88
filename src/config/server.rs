//! # Server Configuration
//!
//! Where the metrics/probe server listens and how long startup may take.

use super::env_var_or_default;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Metrics and probe server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address; `0.0.0.0` so kubelet probes reach the pod IP
    pub bind_address: IpAddr,
    pub metrics_port: u16,
    /// Give up when the listener is not bound within this time
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout: Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        let defaults = Self::default();
        Self {
            bind_address: env_var_or_default("METRICS_BIND_ADDRESS", defaults.bind_address),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout: Duration::from_secs(env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(
                env_var_or_default("SERVER_POLL_INTERVAL_MS", DEFAULT_SERVER_POLL_INTERVAL_MS).max(1),
            ),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.metrics_port)
    }
}
