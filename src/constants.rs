//! # Constants
//!
//! Default values shared by configuration, the reconciler and the runtime.

/// Field manager / event reporter name used for all writes made by the operator
pub const CONTROLLER_NAME: &str = "sentinel-dashboard-operator";

/// Label key used to select the pods of a Dashboard
pub const APP_LABEL: &str = "app";

/// Annotation written by `dashctl reconcile` to force a watch event
pub const RECONCILE_REQUEST_ANNOTATION: &str = "sentinel.sentinelguard.io/reconcile-requested-at";

/// Container port exposed when the Dashboard declares no ports
pub const DEFAULT_DASHBOARD_PORT: i32 = 8080;

/// Replica count used when the Dashboard leaves `replicas` unset
pub const DEFAULT_REPLICAS: i32 = 1;

// Conflict retry: 5 attempts, flat 10ms delay
pub const DEFAULT_CONFLICT_RETRY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_CONFLICT_RETRY_INITIAL_DELAY_MS: u64 = 10;
pub const DEFAULT_CONFLICT_RETRY_FACTOR: f64 = 1.0;
pub const DEFAULT_CONFLICT_RETRY_MAX_DELAY_MS: u64 = 1_000;

// Ready=False when the probe answers but reports unhealthy
pub const NOT_READY_REASON: &str = "DeploymentOrServiceNotReady";
pub const NOT_READY_MESSAGE: &str = "deployment or service not ready";

// Reconciliation pass bounds
pub const DEFAULT_RECONCILE_TIMEOUT: &str = "2m";

// Health probe
pub const DEFAULT_HEALTH_PROBE_TIMEOUT: &str = "5s";
pub const DEFAULT_HEALTH_PROBE_PATH: &str = "/version";
pub const DEFAULT_HEALTH_PROBE_SCHEME: &str = "http";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

// Error backoff for failed passes (Fibonacci, seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;

// HTTP server
pub const DEFAULT_METRICS_PORT: u16 = 5000;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
