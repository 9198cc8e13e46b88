//! # Fibonacci Backoff
//!
//! Per-resource requeue delays after failed reconciliation passes.
//!
//! The sequence is `min, min, 2*min, 3*min, 5*min, ...` capped at `max`. Every resource
//! keeps its own instance so one failing Dashboard never slows down the others.

/// Stateful Fibonacci sequence of delays in seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// New sequence starting at `min_secs` and never exceeding `max_secs`
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            max_secs,
            previous: 0,
            current: min_secs,
        }
    }

    /// Return the current delay and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let value = self.current.min(self.max_secs);
        let next = self.previous.saturating_add(self.current);
        self.previous = self.current;
        self.current = next.min(self.max_secs);
        value
    }

    /// Restart the sequence at `min_secs`
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.min_secs;
    }
}
