//! # Fibonacci Backoff
//!
//! Spaces out retries of intents whose last pass asked to be retried
//! immediately (bootstrap and finalizer failures, store errors). Grows more
//! slowly than exponential backoff: 1s, 1s, 2s, 3s, 5s, 8s, ... capped at
//! the maximum. Each intent key has its own sequence, reset as soon as a
//! pass for that key stops asking for a retry.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// First retry delay
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Retry delay cap
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff between `min` and `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);
        result
    }
}

/// Per-key retry sequences
#[derive(Debug)]
pub struct RetryTracker {
    min: Duration,
    max: Duration,
    sequences: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new(MIN_RETRY_DELAY, MAX_RETRY_DELAY)
    }
}

impl RetryTracker {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Next retry delay for `key`
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        sequences
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(self.min, self.max))
            .next_backoff()
    }

    /// Forgets the sequence of `key`
    pub fn reset(&self, key: &str) {
        self.sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
