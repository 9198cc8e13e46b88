//! # Health Probe
//!
//! Decides whether a Dashboard's workload answers on its Service.
//!
//! `Ok(false)` means the endpoint answered but is not healthy; `Err` means the endpoint
//! could not be asked at all. The reconciler reports both as `Ready=False`, but only the
//! error carries a class token and the transport detail.

use crate::config::HealthProbeConfig;
use crate::crd::Dashboard;
use async_trait::async_trait;
use kube::ResourceExt;
use reqwest::Url;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport-level probe failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("GET {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("GET {url} could not connect: {message}")]
    ConnectionFailed { url: String, message: String },
    #[error("GET {url} failed: {message}")]
    RequestFailed { url: String, message: String },
    #[error("invalid health endpoint {0}")]
    InvalidEndpoint(String),
}

impl ProbeError {
    /// Short machine token used as condition reason
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::Timeout { .. } => "ProbeTimeout",
            ProbeError::ConnectionFailed { .. } => "ProbeConnectionFailed",
            ProbeError::RequestFailed { .. } => "ProbeRequestFailed",
            ProbeError::InvalidEndpoint(_) => "ProbeInvalidEndpoint",
        }
    }
}

/// Readiness check of a Dashboard workload
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, dashboard: &Dashboard) -> Result<bool, ProbeError>;
}

/// Probe issuing `GET <scheme>://<name>.<namespace>.svc.<domain>:<port><path>`
#[derive(Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    config: HealthProbeConfig,
}

impl fmt::Debug for HttpHealthProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpHealthProbe")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpHealthProbe {
    /// Build a probe whose requests time out after `config.timeout`
    pub fn new(config: HealthProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// URL probed for `dashboard`
    pub fn endpoint(&self, dashboard: &Dashboard) -> Result<Url, ProbeError> {
        let port = dashboard.spec.primary_port();
        let authority = match &self.config.host_override {
            Some(host) if host.contains(':') => host.clone(),
            Some(host) => format!("{host}:{port}"),
            None => format!(
                "{}.{}.svc.{}:{}",
                dashboard.name_any(),
                dashboard.namespace().unwrap_or_else(|| "default".to_string()),
                self.config.cluster_domain,
                port
            ),
        };
        let path = if self.config.path.starts_with('/') {
            self.config.path.clone()
        } else {
            format!("/{}", self.config.path)
        };
        let raw = format!("{}://{}{}", self.config.scheme, authority, path);
        Url::parse(&raw).map_err(|e| ProbeError::InvalidEndpoint(format!("{raw}: {e}")))
    }
}

/// `reqwest::Error` display hides the cause; walk the chain so the condition message
/// names the real failure (DNS, refused, reset)
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, dashboard: &Dashboard) -> Result<bool, ProbeError> {
        let url = self.endpoint(dashboard)?;
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_string(),
                    timeout: self.config.timeout,
                }
            } else if e.is_connect() {
                ProbeError::ConnectionFailed {
                    url: url.to_string(),
                    message: error_chain(&e),
                }
            } else {
                ProbeError::RequestFailed {
                    url: url.to_string(),
                    message: error_chain(&e),
                }
            }
        })?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "health probe answered");
        Ok(status.is_success())
    }
}
