//! Retry decisions and backoff computation.
//!
//! Stateless: the engine owns the attempt counter and asks `RetryHandler`
//! whether a failed attempt should be retried and how long to wait first.

use std::time::Duration;

use waypoint_types::workflow::RetryPolicy;
use waypoint_types::error::error_kind;

/// Whether `kind` is named by `kinds`, where `*` matches everything.
pub fn kind_matches(kinds: &[String], kind: &str) -> bool {
    kinds.iter().any(|k| k == error_kind::ALL || k == kind)
}

/// Stateless retry handler for Task and Notify attempts.
pub struct RetryHandler;

impl RetryHandler {
    /// `attempt` is the 1-based number of the attempt that just failed.
    ///
    /// Attempts never exceed `max_attempts` in total, first call included.
    pub fn should_retry(policy: &RetryPolicy, attempt: u32, kind: &str) -> bool {
        attempt < policy.max_attempts && kind_matches(&policy.error_kinds, kind)
    }

    /// Delay before the retry that follows failed attempt `attempt`:
    /// `interval * backoff_rate^(attempt - 1)`, capped at `max_delay_seconds`.
    pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut secs = policy.interval_seconds * policy.backoff_rate.powi(exponent);
        if let Some(cap) = policy.max_delay_seconds {
            secs = secs.min(cap);
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Check a policy for values that would make retries meaningless.
    pub fn validate(policy: &RetryPolicy) -> Result<(), String> {
        if policy.max_attempts == 0 {
            return Err("maxAttempts must be at least 1".to_string());
        }
        if !(policy.interval_seconds.is_finite() && policy.interval_seconds > 0.0) {
            return Err("intervalSeconds must be a positive number".to_string());
        }
        if !(policy.backoff_rate.is_finite() && policy.backoff_rate >= 1.0) {
            return Err("backoffRate must be at least 1.0".to_string());
        }
        if let Some(cap) = policy.max_delay_seconds {
            if !(cap.is_finite() && cap > 0.0) {
                return Err("maxDelaySeconds must be positive".to_string());
            }
        }
        if policy.error_kinds.is_empty() {
            return Err("errorKinds must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, interval: f64, rate: f64) -> RetryPolicy {
        RetryPolicy {
            error_kinds: vec!["ServiceBusy".to_string()],
            interval_seconds: interval,
            max_attempts,
            backoff_rate: rate,
            max_delay_seconds: None,
        }
    }

    #[test]
    fn should_retry_counts_total_attempts() {
        let p = policy(2, 10.0, 2.0);
        assert!(RetryHandler::should_retry(&p, 1, "ServiceBusy"));
        assert!(!RetryHandler::should_retry(&p, 2, "ServiceBusy"));
    }

    #[test]
    fn should_retry_requires_matching_kind() {
        let p = policy(5, 1.0, 2.0);
        assert!(!RetryHandler::should_retry(&p, 1, "Task.Failed"));

        let mut all = p.clone();
        all.error_kinds = vec!["*".to_string()];
        assert!(RetryHandler::should_retry(&all, 1, "Task.Failed"));
    }

    #[test]
    fn single_attempt_never_retries() {
        let p = policy(1, 1.0, 2.0);
        assert!(!RetryHandler::should_retry(&p, 1, "ServiceBusy"));
    }

    #[test]
    fn backoff_grows_exponentially() {
        let p = policy(4, 10.0, 2.0);
        assert_eq!(RetryHandler::backoff_delay(&p, 1), Duration::from_secs(10));
        assert_eq!(RetryHandler::backoff_delay(&p, 2), Duration::from_secs(20));
        assert_eq!(RetryHandler::backoff_delay(&p, 3), Duration::from_secs(40));
    }

    #[test]
    fn backoff_respects_cap() {
        let mut p = policy(10, 10.0, 3.0);
        p.max_delay_seconds = Some(25.0);
        assert_eq!(RetryHandler::backoff_delay(&p, 1), Duration::from_secs(10));
        assert_eq!(RetryHandler::backoff_delay(&p, 2), Duration::from_secs(25));
        assert_eq!(RetryHandler::backoff_delay(&p, 9), Duration::from_secs(25));
    }

    #[test]
    fn backoff_overflow_saturates() {
        let p = policy(u32::MAX, 1.0, 10.0);
        assert_eq!(RetryHandler::backoff_delay(&p, 10_000), Duration::MAX);
    }

    #[test]
    fn validate_rejects_bad_policies() {
        assert!(RetryHandler::validate(&policy(2, 10.0, 2.0)).is_ok());
        assert!(RetryHandler::validate(&policy(0, 10.0, 2.0)).is_err());
        assert!(RetryHandler::validate(&policy(2, -1.0, 2.0)).is_err());
        assert!(RetryHandler::validate(&policy(2, 0.0, 2.0)).is_err());
        assert!(RetryHandler::validate(&policy(2, 1.0, 0.5)).is_err());
        let mut empty = policy(2, 1.0, 2.0);
        empty.error_kinds.clear();
        assert!(RetryHandler::validate(&empty).is_err());
    }

    #[test]
    fn kind_matches_wildcard_and_exact() {
        let kinds = vec!["A".to_string(), "B".to_string()];
        assert!(kind_matches(&kinds, "B"));
        assert!(!kind_matches(&kinds, "C"));
        assert!(kind_matches(&["*".to_string()], "anything"));
    }
}
