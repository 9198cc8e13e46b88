//! # Create-or-Update
//!
//! Fetch-or-initialize an owned object, apply a mutation and write it back, retrying the
//! whole cycle when the write loses an optimistic-concurrency race.

use super::mutate::MutateError;
use super::retry::{retry_on_conflict, RetryError, RetryPolicy, Retryable};
use crate::controller::store::{ObjectKey, ObjectStore, StoreError};
use crate::observability;
use kube::Resource;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::info;

/// What a successful upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// The mutation produced no difference; nothing was written
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upsert failure; the object may not reflect the mutation
#[derive(Debug, Error)]
pub enum UpsertError {
    /// The mutation (owner link) was refused
    #[error("{kind} {key}: {source}")]
    Mutate {
        kind: String,
        key: ObjectKey,
        #[source]
        source: MutateError,
    },
    /// Every attempt conflicted with a concurrent writer
    #[error("{kind} {key}: gave up after {attempts} conflicting attempts: {last}")]
    ConflictsExhausted {
        kind: String,
        key: ObjectKey,
        attempts: u32,
        last: String,
    },
    /// Read or write failed for a non-conflict reason
    #[error("{kind} {key}: {source}")]
    Store {
        kind: String,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

impl UpsertError {
    /// Short machine token describing the failure class
    pub fn reason(&self) -> &'static str {
        match self {
            UpsertError::Mutate { .. } => "OwnerReferenceFailed",
            UpsertError::ConflictsExhausted { .. } => "ConflictRetriesExhausted",
            UpsertError::Store { .. } => "WriteFailed",
        }
    }
}

#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Mutate(#[from] MutateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Retryable for CycleError {
    fn is_conflict(&self) -> bool {
        matches!(self, CycleError::Store(e) if e.is_conflict())
    }
}

fn same_content<K: Serialize>(a: &K, b: &K) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn create_or_update<K, F>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    mutate: &F,
) -> Result<UpsertOutcome, CycleError>
where
    K: Resource<DynamicType = ()> + Default + Clone + Serialize + Send + Sync + 'static,
    F: Fn(&mut K) -> Result<(), MutateError> + Sync,
{
    match store.get(key).await? {
        None => {
            let mut obj = K::default();
            obj.meta_mut().name = Some(key.name.clone());
            obj.meta_mut().namespace = Some(key.namespace.clone());
            mutate(&mut obj)?;
            store.create(key, &obj).await?;
            Ok(UpsertOutcome::Created)
        }
        Some(existing) => {
            let mut desired = existing.clone();
            mutate(&mut desired)?;
            if same_content(&existing, &desired) {
                return Ok(UpsertOutcome::Unchanged);
            }
            store.replace(key, &desired).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

/// Create or update the object at `key` so that it reflects `mutate`
///
/// A create that races another create, or a replace carrying a stale `resourceVersion`,
/// restarts the cycle from the fetch. Anything else is returned immediately.
pub async fn upsert<K, F>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    policy: &RetryPolicy,
    mutate: F,
) -> Result<UpsertOutcome, UpsertError>
where
    K: Resource<DynamicType = ()> + Default + Clone + Serialize + Send + Sync + 'static,
    F: Fn(&mut K) -> Result<(), MutateError> + Sync,
{
    let kind = K::kind(&()).to_string();
    let mutate = &mutate;

    match retry_on_conflict(policy, "upsert", || create_or_update(store, key, mutate)).await {
        Ok(outcome) => {
            info!(kind = %kind, key = %key, result = %outcome, "upserted owned object");
            observability::metrics::increment_owned_object_upserts(&kind, outcome.as_str());
            Ok(outcome)
        }
        Err(RetryError::Exhausted { attempts, last }) => Err(UpsertError::ConflictsExhausted {
            kind,
            key: key.clone(),
            attempts,
            last: last.to_string(),
        }),
        Err(RetryError::Failed(CycleError::Mutate(source))) => Err(UpsertError::Mutate {
            kind,
            key: key.clone(),
            source,
        }),
        Err(RetryError::Failed(CycleError::Store(source))) => Err(UpsertError::Store {
            kind,
            key: key.clone(),
            source,
        }),
    }
}
