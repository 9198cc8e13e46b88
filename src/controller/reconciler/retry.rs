//! # Conflict Retry
//!
//! Bounded retry of read-modify-write cycles that lose an optimistic-concurrency race.
//!
//! Only conflicts are retried. Every other failure is returned on the attempt that
//! produced it.

use crate::controller::store::StoreError;
use crate::observability;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Retry policy for optimistic-concurrency conflicts
///
/// Delay before attempt `n + 1` is `initial_delay * factor^(n - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first conflict
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after each conflict
    pub factor: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_attempts: DEFAULT_CONFLICT_RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_CONFLICT_RETRY_INITIAL_DELAY_MS),
            factor: DEFAULT_CONFLICT_RETRY_FACTOR,
            max_delay: Duration::from_millis(DEFAULT_CONFLICT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for tests and tight loops
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the `conflicts`-th consecutive conflict (1-based)
    pub fn delay_after(&self, conflicts: u32) -> Duration {
        let exponent = i32::try_from(conflicts.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.factor.max(0.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Errors that may be caused by a lost optimistic-concurrency race
pub trait Retryable {
    fn is_conflict(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_conflict(&self) -> bool {
        StoreError::is_conflict(self)
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every attempt ended in a conflict
    #[error("gave up after {attempts} conflicting attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
    /// A non-conflict failure; never retried
    #[error(transparent)]
    Failed(E),
}

/// Run `op` until it succeeds, fails with a non-conflict error, or the policy runs out
pub async fn retry_on_conflict<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                observability::metrics::increment_conflict_retries(operation);
                let delay = policy.delay_after(attempt);
                debug!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(RetryError::Failed(e)),
        }
    }
}
