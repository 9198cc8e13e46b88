//! # Custom Resource Definitions
//!
//! CRD types for the Sentinel Dashboard Operator.
//!
//! The `Dashboard` resource declares a Sentinel dashboard workload. The operator owns one
//! Deployment and one Service per Dashboard, both named after it.

mod status;

pub use status::*;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_DASHBOARD_PORT, DEFAULT_REPLICAS};

/// Dashboard Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: sentinel.sentinelguard.io/v1alpha1
/// kind: Dashboard
/// metadata:
///   name: sentinel-dashboard
///   namespace: default
/// spec:
///   image: bladex/sentinel-dashboard:1.8.6
///   replicas: 1
///   type: NodePort
///   ports:
///     - port: 8080
///       nodePort: 30080
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "Dashboard",
    group = "sentinel.sentinelguard.io",
    version = "v1alpha1",
    namespaced,
    status = "DashboardStatus",
    shortname = "sdb",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Applied", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Applied\")].status"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    /// Container image of the dashboard
    pub image: String,
    /// Desired number of dashboard pods
    /// Default: 1
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Ports exposed by the Service; only the first entry is used
    #[serde(default)]
    pub ports: Vec<DashboardPort>,
    /// Service type: ClusterIP, NodePort or LoadBalancer
    /// Default: ClusterIP
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
    /// Compute resources of the dashboard container
    #[serde(default)]
    pub resources: Option<DashboardResources>,
    /// Extra environment variables for the dashboard container
    #[serde(default)]
    pub env: Vec<EnvEntry>,
}

/// A port exposed by the dashboard Service
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPort {
    /// Service and container port
    pub port: i32,
    /// Node port, honoured for NodePort and LoadBalancer services
    #[serde(default)]
    pub node_port: Option<i32>,
}

/// Resource requests and limits as Kubernetes quantity strings (e.g. "500m", "1Gi")
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResources {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

/// A literal environment variable
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl DashboardSpec {
    /// Replica count the owned Deployment should converge to
    pub fn desired_replicas(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    /// The port exposed by the Service and probed for health
    pub fn primary_port(&self) -> i32 {
        self.ports
            .first()
            .map_or(DEFAULT_DASHBOARD_PORT, |p| p.port)
    }

    /// Whether the Service type allocates node ports
    pub fn exposes_node_port(&self) -> bool {
        self.service_type.as_deref().is_some_and(|t| {
            t.eq_ignore_ascii_case("NodePort") || t.eq_ignore_ascii_case("LoadBalancer")
        })
    }
}
