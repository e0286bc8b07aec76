//! Workflow run events published on the engine's event bus.
//!
//! `StateEntered` and `StateExited` carry immutable snapshots of the execution
//! context before and after each state, which is how observers see context
//! propagation without touching the engine's own copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Events emitted while a workflow run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
        at: DateTime<Utc>,
    },

    /// A state is about to run. `scope` is the branch path (empty at top level).
    StateEntered {
        run_id: Uuid,
        scope: Vec<String>,
        state: String,
        state_type: String,
        input: Value,
    },

    /// A state finished and control moves on to `next` (None for terminal states).
    StateExited {
        run_id: Uuid,
        scope: Vec<String>,
        state: String,
        output: Value,
        next: Option<String>,
    },

    RetryScheduled {
        run_id: Uuid,
        state: String,
        /// Attempt that just failed (1-based).
        attempt: u32,
        delay_ms: u64,
        error_kind: String,
    },

    ErrorCaught {
        run_id: Uuid,
        state: String,
        error_kind: String,
        next: String,
    },

    BranchCancelled {
        run_id: Uuid,
        parallel: String,
        branch: usize,
    },

    NotificationFailed {
        run_id: Uuid,
        state: String,
        sink: String,
        error: String,
    },

    RunSucceeded {
        run_id: Uuid,
        workflow: String,
        duration_ms: u64,
    },

    RunFailed {
        run_id: Uuid,
        workflow: String,
        error_kind: String,
        state: String,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            WorkflowEvent::RunStarted { run_id, .. }
            | WorkflowEvent::StateEntered { run_id, .. }
            | WorkflowEvent::StateExited { run_id, .. }
            | WorkflowEvent::RetryScheduled { run_id, .. }
            | WorkflowEvent::ErrorCaught { run_id, .. }
            | WorkflowEvent::BranchCancelled { run_id, .. }
            | WorkflowEvent::NotificationFailed { run_id, .. }
            | WorkflowEvent::RunSucceeded { run_id, .. }
            | WorkflowEvent::RunFailed { run_id, .. } => *run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_with_tag() {
        let run_id = Uuid::now_v7();
        let event = WorkflowEvent::RetryScheduled {
            run_id,
            state: "RunReport".to_string(),
            attempt: 1,
            delay_ms: 10_000,
            error_kind: "ServiceBusy".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], json!("retry_scheduled"));
        assert_eq!(value["delay_ms"], json!(10_000));
        assert_eq!(event.run_id(), run_id);
    }
}
