//! Retry policy: deterministic backoff and terminal-decision over (retry_count, policy).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 300_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `Backoff(n) = min(initial * multiplier^n, max)`.
    pub fn backoff(&self, n: u32) -> u64 {
        let scaled = self.initial_backoff_ms as f64 * self.multiplier.powi(n as i32);
        if !scaled.is_finite() || scaled > self.max_backoff_ms as f64 {
            self.max_backoff_ms
        } else {
            scaled.round() as u64
        }
    }

    /// `IsExhausted(n) = n >= max_retries`.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_matches_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), 1_000);
        assert_eq!(policy.backoff(1), 2_000);
        assert_eq!(policy.backoff(2), 4_000);
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let policy = RetryPolicy {
            max_retries: 50,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        };
        let mut prev = 0;
        for n in 0..20 {
            let b = policy.backoff(n);
            assert!(b >= prev, "backoff({}) = {} should be >= backoff({}) = {}", n, b, n - 1, prev);
            assert!(b <= policy.max_backoff_ms);
            prev = b;
        }
    }

    #[test]
    fn max_retries_zero_exhausts_immediately() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(policy.is_exhausted(0));
    }

    #[test]
    fn exhaustion_boundary() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
