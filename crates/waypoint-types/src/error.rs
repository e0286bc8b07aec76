use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known error kinds raised by the engine and the bundled collaborators.
///
/// Executors may raise any other kind string; retry and catch matchers compare
/// kinds by exact string equality, with [`ALL`] matching everything.
pub mod error_kind {
    /// Wildcard matcher: matches every error kind.
    pub const ALL: &str = "*";
    /// Generic task failure. Not retried unless a policy names it or uses `*`.
    pub const TASK_FAILED: &str = "Task.Failed";
    /// Transient service failure (throttling, unavailable backend).
    pub const TASK_TRANSIENT: &str = "Task.Transient";
    /// The task call exceeded its timeout.
    pub const TASK_TIMEOUT: &str = "Task.Timeout";
    /// No executor is registered under the requested name.
    pub const TASK_NOT_FOUND: &str = "Task.NotFound";
    /// Notification delivery failed and delivery failures are configured fatal.
    pub const NOTIFY_DELIVERY_FAILED: &str = "Notify.DeliveryFailed";
    /// The run was cancelled.
    pub const RUN_CANCELLED: &str = "Run.Cancelled";
    /// The run exceeded its overall timeout.
    pub const RUN_TIMEOUT: &str = "Run.Timeout";
    /// The run entered more states than the configured limit.
    pub const RUN_TRANSITION_LIMIT: &str = "Run.TransitionLimit";
    /// Control reached a state ID the definition does not contain.
    pub const RUN_INVALID_STATE: &str = "Run.InvalidState";
}

/// Error raised by a task executor: a kind used for retry/catch matching and
/// a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: String,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Generic, non-retryable-by-default failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(error_kind::TASK_FAILED, message)
    }

    /// Transient failure, the kind retry policies usually name.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(error_kind::TASK_TRANSIENT, message)
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(
            error_kind::TASK_TIMEOUT,
            format!("task did not complete within {secs}s"),
        )
    }

    pub fn not_found(executor: &str) -> Self {
        Self::new(
            error_kind::TASK_NOT_FOUND,
            format!("no executor registered as '{executor}'"),
        )
    }
}

/// Errors raised by notification sinks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no notification sink registered as '{0}'")]
    UnknownSink(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_display() {
        let err = TaskError::new("ServiceBusy", "try again later");
        assert_eq!(err.to_string(), "ServiceBusy: try again later");
    }

    #[test]
    fn test_task_error_constructors_use_well_known_kinds() {
        assert_eq!(TaskError::failed("x").kind, error_kind::TASK_FAILED);
        assert_eq!(TaskError::transient("x").kind, error_kind::TASK_TRANSIENT);
        assert_eq!(TaskError::timeout(5).kind, error_kind::TASK_TIMEOUT);
        assert!(TaskError::timeout(5).message.contains("5s"));
        let missing = TaskError::not_found("lambda9");
        assert_eq!(missing.kind, error_kind::TASK_NOT_FOUND);
        assert!(missing.message.contains("lambda9"));
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::UnknownSink("alerts".to_string());
        assert_eq!(err.to_string(), "no notification sink registered as 'alerts'");
    }
}
