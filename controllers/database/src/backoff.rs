//! # Exponential Backoff
//!
//! Retry delays for failed reconciliations. Each Database gets its own
//! sequence that doubles from a base delay up to a cap and starts over after
//! the next successful reconciliation.
//!
//! Sequence with the defaults: 5s, 10s, 20s, 40s, 80s, 160s, 300s (max).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Exponential backoff calculator
///
/// Each call to `next_backoff()` returns the current delay and doubles it for
/// the next call, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay returned by the next call
    current: Duration,
    /// Cap on the delay
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `base` and capped at `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { current: base, max }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }
}

/// Per-Database backoff state shared across reconciliations.
///
/// Keyed by `namespace/name`.
#[derive(Debug, Clone)]
pub struct BackoffTracker {
    base: Duration,
    max: Duration,
    states: Arc<Mutex<HashMap<String, ExponentialBackoff>>>,
}

impl BackoffTracker {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states
            .entry(key.to_string())
            .or_insert_with(|| ExponentialBackoff::new(self.base, self.max))
            .next_backoff()
    }

    /// Forget `key` after a success, so its next failure starts from `base`.
    pub fn reset(&self, key: &str) {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.remove(key);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or_default()
    }
}
