//! # Dashboard Status
//!
//! Status types for tracking convergence: conditions and the derived phase.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the Dashboard resource
///
/// Written only by the reconciler through the status sub-resource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatus {
    /// Conditions represent the latest available observations, at most one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Coarse lifecycle phase derived from the owned Deployment
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Generation the conditions were computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

/// Condition represents one facet of convergence health
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (Applied, Ready)
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time the status changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the last update
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known condition types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// Owned Deployment and Service reflect the spec
    Applied,
    /// The dashboard answers its health endpoint
    Ready,
}

impl ConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::Applied => "Applied",
            ConditionType::Ready => "Ready",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase, recomputed every pass
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    /// Deployment not observed yet, or only partially rolled out
    Waiting,
    /// Deployment ready with the desired number of ready replicas
    Running,
    /// Deployment reports it is not ready
    NotReady,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Waiting => "Waiting",
            Phase::Running => "Running",
            Phase::NotReady => "NotReady",
        };
        f.write_str(s)
    }
}
