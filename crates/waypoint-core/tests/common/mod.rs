//! Scripted collaborators shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;
use waypoint_core::executor::TaskExecutor;
use waypoint_core::notify::{Ack, NotificationSink};
use waypoint_core::workflow::definition::Workflow;
use waypoint_core::workflow::engine::WorkflowEngine;
use waypoint_types::config::EngineConfig;
use waypoint_types::error::{DeliveryError, TaskError};
use waypoint_types::event::WorkflowEvent;
use waypoint_types::workflow::WorkflowDefinition;

// ---------------------------------------------------------------------------
// ScriptedExecutor
// ---------------------------------------------------------------------------

/// What a scripted executor call does.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Err(TaskError),
    /// Wait, then behave like the inner reply.
    After(Duration, Box<Reply>),
}

impl Reply {
    pub fn after(secs: u64, reply: Reply) -> Self {
        Reply::After(Duration::from_secs(secs), Box::new(reply))
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub executor: String,
    pub input: Value,
    pub at: Instant,
}

#[derive(Default)]
struct ExecutorState {
    scripts: HashMap<String, VecDeque<Reply>>,
    calls: Vec<Call>,
    completed: Vec<String>,
}

/// Replays a per-executor script. The last reply of a script repeats forever.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, executor: &str, replies: Vec<Reply>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(executor.to_string(), replies.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, executor: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.executor == executor)
            .collect()
    }

    /// Executors whose calls ran to completion, in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.state.lock().unwrap().completed.clone()
    }
}

impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, executor: &str, input: Value) -> Result<Value, TaskError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call {
                executor: executor.to_string(),
                input,
                at: Instant::now(),
            });
            state.scripts.get_mut(executor).and_then(|script| {
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            })
        };

        let mut reply = match reply {
            Some(reply) => reply,
            None => return Err(TaskError::not_found(executor)),
        };
        let result = loop {
            match reply {
                Reply::After(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                Reply::Ok(value) => break Ok(value),
                Reply::Err(err) => break Err(err),
            }
        };

        self.state.lock().unwrap().completed.push(executor.to_string());
        result
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub sink: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
struct SinkState {
    sent: Vec<Sent>,
    attempts: u32,
    failures_left: u32,
}

/// Records deliveries; can be told to reject the next N sends.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().failures_left = times;
        sink
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().unwrap().attempts
    }
}

impl NotificationSink for RecordingSink {
    async fn send(&self, sink: &str, subject: &str, body: &str) -> Result<Ack, DeliveryError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(DeliveryError::Rejected("topic unavailable".to_string()));
        }
        state.sent.push(Sent {
            sink: sink.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(Ack {
            message_id: Some(format!("msg-{}", state.sent.len())),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn workflow(definition: Value) -> Workflow {
    let def: WorkflowDefinition = serde_json::from_value(definition).expect("definition parses");
    Workflow::new(def).expect("definition validates")
}

pub fn engine(executor: &ScriptedExecutor, sink: &RecordingSink) -> WorkflowEngine {
    engine_with(executor, sink, EngineConfig::default())
}

pub fn engine_with(
    executor: &ScriptedExecutor,
    sink: &RecordingSink,
    config: EngineConfig,
) -> WorkflowEngine {
    WorkflowEngine::new(executor.clone(), sink.clone(), &config)
}

/// Drain every event already published to `rx`.
pub fn drain(rx: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Assert `actual` is `expected` give or take timer granularity.
pub fn assert_close(actual: Duration, expected: Duration) {
    let slack = Duration::from_millis(5);
    assert!(
        actual >= expected && actual <= expected + slack,
        "expected ~{expected:?}, got {actual:?}"
    );
}
