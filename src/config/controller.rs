//! # Reconciler Configuration
//!
//! Settings that shape a reconciliation pass: conflict retry policy, pass timeout,
//! health probe target and error backoff bounds.

use super::{env_duration_or_default, env_var_or_default};
use crate::controller::reconciler::RetryPolicy;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Optimistic-concurrency retry policy for owned object and status writes
    pub conflict_retry: RetryPolicy,
    /// Upper bound for a single reconciliation pass
    pub reconcile_timeout: Duration,
    /// Health probe target and timeout
    pub health_probe: HealthProbeConfig,
    /// Minimum requeue delay after a failed pass (seconds)
    pub error_backoff_min_secs: u64,
    /// Maximum requeue delay after a failed pass (seconds)
    pub error_backoff_max_secs: u64,
}

/// How the HTTP health probe reaches a Dashboard
#[derive(Debug, Clone)]
pub struct HealthProbeConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Path requested on the dashboard service
    pub path: String,
    /// URL scheme (`http` or `https`)
    pub scheme: String,
    /// Cluster DNS domain used to build `<svc>.<ns>.svc.<domain>`
    pub cluster_domain: String,
    /// Replaces the in-cluster service host and port, e.g. `127.0.0.1:8080` while
    /// running out of cluster behind `kubectl port-forward`
    pub host_override: Option<String>,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            timeout: Duration::from_secs(5),
            path: DEFAULT_HEALTH_PROBE_PATH.to_string(),
            scheme: DEFAULT_HEALTH_PROBE_SCHEME.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            host_override: None,
        }
    }
}

impl HealthProbeConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            timeout: env_duration_or_default("HEALTH_PROBE_TIMEOUT", DEFAULT_HEALTH_PROBE_TIMEOUT),
            path: env_var_or_default("HEALTH_PROBE_PATH", DEFAULT_HEALTH_PROBE_PATH.to_string()),
            scheme: env_var_or_default(
                "HEALTH_PROBE_SCHEME",
                DEFAULT_HEALTH_PROBE_SCHEME.to_string(),
            ),
            cluster_domain: env_var_or_default(
                "CLUSTER_DOMAIN",
                DEFAULT_CLUSTER_DOMAIN.to_string(),
            ),
            host_override: std::env::var("HEALTH_PROBE_HOST_OVERRIDE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            conflict_retry: RetryPolicy::default(),
            reconcile_timeout: Duration::from_secs(120),
            health_probe: HealthProbeConfig::default(),
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        let conflict_retry = RetryPolicy {
            max_attempts: env_var_or_default(
                "CONFLICT_RETRY_MAX_ATTEMPTS",
                DEFAULT_CONFLICT_RETRY_MAX_ATTEMPTS,
            )
            .max(1),
            initial_delay: Duration::from_millis(env_var_or_default(
                "CONFLICT_RETRY_INITIAL_DELAY_MS",
                DEFAULT_CONFLICT_RETRY_INITIAL_DELAY_MS,
            )),
            factor: env_var_or_default("CONFLICT_RETRY_FACTOR", DEFAULT_CONFLICT_RETRY_FACTOR),
            max_delay: Duration::from_millis(env_var_or_default(
                "CONFLICT_RETRY_MAX_DELAY_MS",
                DEFAULT_CONFLICT_RETRY_MAX_DELAY_MS,
            )),
        };

        let error_backoff_min_secs =
            env_var_or_default("ERROR_BACKOFF_MIN_SECS", DEFAULT_ERROR_BACKOFF_MIN_SECS).max(1);
        let error_backoff_max_secs =
            env_var_or_default("ERROR_BACKOFF_MAX_SECS", DEFAULT_ERROR_BACKOFF_MAX_SECS)
                .max(error_backoff_min_secs);

        Self {
            conflict_retry,
            reconcile_timeout: env_duration_or_default("RECONCILE_TIMEOUT", DEFAULT_RECONCILE_TIMEOUT),
            health_probe: HealthProbeConfig::from_env(),
            error_backoff_min_secs,
            error_backoff_max_secs,
        }
    }
}
