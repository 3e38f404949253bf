use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeletionConfig;

/// A single retry attempt record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u8,
    /// Error message from the failed attempt.
    pub error: String,
    /// When this attempt failed.
    pub timestamp: DateTime<Utc>,
}

impl RetryAttempt {
    pub fn new(attempt: u8, error: impl Into<String>) -> Self {
        Self {
            attempt,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of recording a failure in the RetryTracker.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `next_attempt`.
    Retry { next_attempt: u8, delay: Duration },
    Exhausted { history: Vec<RetryAttempt> },
}

/// Exponential backoff without jitter.
///
/// The first attempt runs immediately; after failed attempt `i` the caller
/// waits `base_delay * 2^(i-1)`. With the defaults (5 attempts, 5s) the waits
/// are 5s, 10s, 20s and 40s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u8,
    pub base_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u8, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u8) -> Duration {
        calculate_backoff(attempt, self.base_delay)
    }

    /// Sum of every wait the policy can impose before giving up.
    pub fn total_budget(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_after(a)).sum()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        DeletionConfig::default().backoff()
    }
}

/// Calculate the exponential backoff delay for a failed attempt.
///
/// Formula: `base * 2^(attempt-1)`, saturating.
pub fn calculate_backoff(attempt: u8, base: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u32.saturating_pow((attempt - 1) as u32);
    base.saturating_mul(exp_factor)
}

/// Per-key retry bookkeeping.
#[derive(Debug, Clone, Default)]
struct RetryState {
    history: Vec<RetryAttempt>,
}

/// Tracks retry state for multiple units of work by key.
#[derive(Debug)]
pub struct RetryTracker {
    state: HashMap<String, RetryState>,
    policy: BackoffPolicy,
}

impl RetryTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Start tracking a key. Already-tracked keys keep their history.
    pub fn register(&mut self, id: &str) {
        self.state.entry(id.to_string()).or_default();
    }

    /// Record a failure for the given key.
    pub fn record_failure(&mut self, id: &str, error: &str) -> RetryDecision {
        let retry_state = self.state.entry(id.to_string()).or_default();

        let attempt = retry_state.history.len() as u8 + 1;
        retry_state.history.push(RetryAttempt::new(attempt, error));

        if attempt < self.policy.max_attempts {
            RetryDecision::Retry {
                next_attempt: attempt + 1,
                delay: self.policy.delay_after(attempt),
            }
        } else {
            let final_history = self
                .state
                .remove(id)
                .map(|s| s.history)
                .unwrap_or_default();
            RetryDecision::Exhausted {
                history: final_history,
            }
        }
    }

    /// Clear retry state for a key.
    pub fn clear(&mut self, id: &str) {
        self.state.remove(id);
    }

    /// Number of failed attempts recorded so far for a key.
    pub fn failures(&self, id: &str) -> u8 {
        self.state
            .get(id)
            .map(|s| s.history.len() as u8)
            .unwrap_or(0)
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.state.contains_key(id)
    }

    /// Keys currently being tracked.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
