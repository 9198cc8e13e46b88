//! # Conditions
//!
//! In-memory manipulation of a Dashboard's status conditions. Nothing here performs I/O;
//! persisting the result is the job of [`super::status::persist_status`].
//!
//! Conditions are keyed by type: at most one entry per type, insertion order preserved.
//! `lastTransitionTime` moves only when the status value changes (or was never set).

use crate::crd::{Condition, ConditionStatus, ConditionType, DashboardStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Raised when a caller passes more detail strings than `[reason, message]`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expecting reason and message, but got {0} params")]
pub struct ConditionFormatError(pub usize);

/// A condition change produced by one convergence branch and applied later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionUpdate {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ConditionUpdate {
    /// Build an update from `[]`, `[reason]` or `[reason, message]`
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        details: &[&str],
    ) -> Result<Self, ConditionFormatError> {
        let (reason, message) = split_details(details)?;
        Ok(Self {
            condition_type,
            status,
            reason: reason.map(str::to_string),
            message: message.map(str::to_string),
        })
    }
}

/// Keep only the last update per condition type, in first-seen order
///
/// Intermediate values a branch produced on its way to a result never reach the status, so
/// they cannot move `lastTransitionTime`.
pub fn coalesce_updates(updates: impl IntoIterator<Item = ConditionUpdate>) -> Vec<ConditionUpdate> {
    let mut merged: Vec<ConditionUpdate> = Vec::new();
    for update in updates {
        match merged
            .iter_mut()
            .find(|m| m.condition_type == update.condition_type)
        {
            Some(slot) => *slot = update,
            None => merged.push(update),
        }
    }
    merged
}

fn split_details<'a>(
    details: &[&'a str],
) -> Result<(Option<&'a str>, Option<&'a str>), ConditionFormatError> {
    match details {
        [] => Ok((None, None)),
        [reason] => Ok((Some(*reason), None)),
        [reason, message] => Ok((Some(*reason), Some(*message))),
        _ => Err(ConditionFormatError(details.len())),
    }
}

fn format_time(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl DashboardStatus {
    /// Stored condition for `condition_type`, or `{type, Unknown}` when absent
    pub fn condition(&self, condition_type: ConditionType) -> Condition {
        self.conditions
            .iter()
            .find(|c| c.r#type == condition_type.as_str())
            .cloned()
            .unwrap_or_else(|| Condition {
                r#type: condition_type.as_str().to_string(),
                status: ConditionStatus::Unknown,
                last_transition_time: None,
                reason: None,
                message: None,
            })
    }

    /// Set a condition using the current time
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        details: &[&str],
    ) -> Result<(), ConditionFormatError> {
        self.set_condition_at(condition_type, status, details, Utc::now())
    }

    /// Set a condition as of `now`
    ///
    /// Reason and message are replaced on every call; the transition time only when the
    /// status differs from the stored one or no transition time was recorded.
    pub fn set_condition_at(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        details: &[&str],
        now: DateTime<Utc>,
    ) -> Result<(), ConditionFormatError> {
        let (reason, message) = split_details(details)?;
        self.write_condition(
            condition_type,
            status,
            reason.map(str::to_string),
            message.map(str::to_string),
            now,
        );
        Ok(())
    }

    /// Apply an update produced by a convergence branch
    ///
    /// Reason and message are taken as they are; a message without a reason stays that way.
    pub fn apply_update(&mut self, update: &ConditionUpdate, now: DateTime<Utc>) {
        self.write_condition(
            update.condition_type,
            update.status,
            update.reason.clone(),
            update.message.clone(),
            now,
        );
    }

    fn write_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: Option<String>,
        message: Option<String>,
        now: DateTime<Utc>,
    ) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition_type.as_str())
        {
            if existing.last_transition_time.is_none() || existing.status != status {
                existing.last_transition_time = Some(format_time(now));
            }
            existing.status = status;
            existing.reason = reason;
            existing.message = message;
            return;
        }

        self.conditions.push(Condition {
            r#type: condition_type.as_str().to_string(),
            status,
            last_transition_time: Some(format_time(now)),
            reason,
            message,
        });
    }

    /// Whether the condition of `condition_type` is currently True
    pub fn is_condition_true(&self, condition_type: ConditionType) -> bool {
        self.condition(condition_type).status == ConditionStatus::True
    }
}
