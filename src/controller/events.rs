//! # Kubernetes Events
//!
//! Publishes condition transitions on the Dashboard so `kubectl describe` shows them.

use crate::constants::CONTROLLER_NAME;
use crate::crd::{ConditionStatus, ConditionType, Dashboard, DashboardStatus};
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::fmt;

/// Severity of a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// An event about a Dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardEvent {
    pub severity: EventSeverity,
    pub reason: &'static str,
    pub note: String,
}

impl DashboardEvent {
    fn normal(reason: &'static str, note: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Normal,
            reason,
            note: note.into(),
        }
    }

    fn warning(reason: &'static str, note: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Warning,
            reason,
            note: note.into(),
        }
    }
}

/// Sink for Dashboard events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, dashboard: &Dashboard, event: &DashboardEvent) -> Result<(), kube::Error>;
}

/// Events API backed publisher
#[derive(Clone)]
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, dashboard: &Dashboard, event: &DashboardEvent) -> Result<(), kube::Error> {
        let type_ = match event.severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        self.recorder
            .publish(
                &Event {
                    type_,
                    reason: event.reason.to_string(),
                    note: Some(event.note.clone()),
                    action: "Reconcile".to_string(),
                    secondary: None,
                },
                &dashboard.object_ref(&()),
            )
            .await
    }
}

fn transitioned(
    before: &DashboardStatus,
    after: &DashboardStatus,
    ty: ConditionType,
) -> Option<ConditionStatus> {
    let old = before.condition(ty);
    let new = after.condition(ty);
    (old.status != new.status || old.reason != new.reason).then_some(new.status)
}

/// Events implied by the condition changes between two statuses
///
/// Only transitions produce events, so redelivered passes stay silent.
pub fn transition_events(before: &DashboardStatus, after: &DashboardStatus) -> Vec<DashboardEvent> {
    let mut events = Vec::new();

    match transitioned(before, after, ConditionType::Applied) {
        Some(ConditionStatus::True) => events.push(DashboardEvent::normal(
            "Applied",
            "deployment and service are up to date",
        )),
        Some(ConditionStatus::False) => {
            let condition = after.condition(ConditionType::Applied);
            // Applied=False without a reason is the in-progress marker, not a failure
            if let Some(reason) = condition.reason.filter(|r| !r.is_empty()) {
                events.push(DashboardEvent::warning(
                    "ApplyFailed",
                    format!("{}: {}", reason, condition.message.unwrap_or_default()),
                ));
            }
        }
        _ => {}
    }

    match transitioned(before, after, ConditionType::Ready) {
        Some(ConditionStatus::True) => {
            events.push(DashboardEvent::normal("Ready", "dashboard answers its health probe"));
        }
        Some(ConditionStatus::False) => {
            let condition = after.condition(ConditionType::Ready);
            events.push(DashboardEvent::warning(
                "HealthCheckFailed",
                format!(
                    "{}: {}",
                    condition.reason.unwrap_or_default(),
                    condition.message.unwrap_or_default()
                ),
            ));
        }
        _ => {}
    }

    events
}
