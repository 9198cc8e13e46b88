//! # Configuration
//!
//! Operator settings read once at startup from the process environment.
//! The operator Deployment fills the environment from a ConfigMap via `envFrom`;
//! unset or unparsable values fall back to the defaults in [`crate::constants`].

mod controller;
pub mod duration;
mod server;

pub use controller::{ControllerConfig, HealthProbeConfig};
pub use duration::parse_kubernetes_duration;
pub use server::ServerConfig;

use std::time::Duration;
use tracing::warn;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read a Kubernetes duration string from the environment, falling back to `default`
/// when the variable is unset or malformed
pub(crate) fn env_duration_or_default(key: &str, default: &str) -> Duration {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    match parse_kubernetes_duration(&raw) {
        Ok(duration) => duration,
        Err(e) => {
            warn!("Invalid {} value '{}': {}, using default {}", key, raw, e, default);
            parse_kubernetes_duration(default).unwrap_or(Duration::from_secs(60))
        }
    }
}
