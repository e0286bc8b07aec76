//! Workflow domain types for Waypoint.
//!
//! Defines the canonical intermediate representation for workflows: a rooted
//! graph of tagged states keyed by state ID. YAML and JSON documents both
//! deserialize into `WorkflowDefinition`; the engine interprets it directly.
//! This module also contains the run result types (`RunStatus`, `RunError`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::error_kind;

// ---------------------------------------------------------------------------
// Workflow Definition (canonical IR)
// ---------------------------------------------------------------------------

/// A rooted graph of states with a designated start state.
///
/// State IDs are the keys of `states`. Parallel branches are themselves
/// `WorkflowDefinition`s and are validated independently of their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Human-readable workflow name (also used as the branch label).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// ID of the first state to execute.
    pub start_state: String,
    /// Whole-run timeout in seconds (overrides the engine default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// All states of this graph, keyed by state ID.
    pub states: BTreeMap<String, State>,
}

impl WorkflowDefinition {
    /// Look up a state by ID.
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// Display name, falling back to the start state ID.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.start_state)
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// One node of the workflow graph.
///
/// Internally tagged by `type` to match the interchange format:
/// ```yaml
/// RunReport:
///   type: task
///   executor: find_expensive_lambdas
///   resultPath: $.output
///   next: NotifyReport
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum State {
    /// Invoke a task executor.
    Task(TaskState),
    /// Fan out into concurrently executed branches and join their outputs.
    Parallel(ParallelState),
    /// Deliver a message through a notification sink.
    Notify(NotifyState),
    /// Terminal success.
    Succeed,
    /// Terminal failure with a declared error kind.
    Fail(FailState),
}

impl State {
    /// The `type` tag as written in definition files.
    pub fn type_name(&self) -> &'static str {
        match self {
            State::Task(_) => "task",
            State::Parallel(_) => "parallel",
            State::Notify(_) => "notify",
            State::Succeed => "succeed",
            State::Fail(_) => "fail",
        }
    }

    /// The successor state, or `None` for terminal states.
    pub fn next(&self) -> Option<&str> {
        match self {
            State::Task(t) => Some(&t.next),
            State::Parallel(p) => Some(&p.next),
            State::Notify(n) => Some(&n.next),
            State::Succeed | State::Fail(_) => None,
        }
    }

    /// Whether this state ends its execution scope.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Succeed | State::Fail(_))
    }

    /// Catch policies declared on this state (empty for states that cannot catch).
    pub fn catches(&self) -> &[CatchPolicy] {
        match self {
            State::Task(t) => &t.catches,
            State::Parallel(p) => &p.catches,
            _ => &[],
        }
    }

    /// Retry policy declared on this state, if any.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        match self {
            State::Task(t) => t.retry.as_ref(),
            State::Notify(n) => n.retry.as_ref(),
            _ => None,
        }
    }
}

/// Task state: calls `executor` with the value at `input_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    /// Name of the executor to invoke.
    pub executor: String,
    /// Context path passed as executor input (`$` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    /// Where the executor result is written (`$.<state id>` when absent, `$` replaces the context).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    /// Per-call timeout in seconds (overrides the engine default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, rename = "catch", skip_serializing_if = "Vec::is_empty")]
    pub catches: Vec<CatchPolicy>,
    pub next: String,
}

/// Parallel state: runs every enabled branch concurrently, then joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelState {
    pub branches: Vec<Branch>,
    /// Where the joined branch array is written (`$.<state id>` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(default, rename = "catch", skip_serializing_if = "Vec::is_empty")]
    pub catches: Vec<CatchPolicy>,
    pub next: String,
}

impl ParallelState {
    /// Branches that will actually run, with their declaration index.
    pub fn enabled_branches(&self) -> impl Iterator<Item = (usize, &Branch)> {
        self.branches.iter().enumerate().filter(|(_, b)| b.enabled)
    }
}

/// One sub-graph of a Parallel state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Disabled branches are kept in the definition but never run.
    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub workflow: WorkflowDefinition,
}

fn default_enabled() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Notify state: renders `message` and hands it to `sink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyState {
    /// Name of the notification sink.
    pub sink: String,
    pub subject: String,
    pub message: MessageTemplate,
    /// Optional delivery retry (delivery failures are otherwise logged once).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    pub next: String,
}

/// Source of a notification body.
///
/// ```yaml
/// message:
///   path: $.output.Payload
/// # or
/// message:
///   text: "Report ready: {{ $.output.Summary }}"
/// ```
///
/// Serialized as a plain map with exactly one of `text` or `path`, so it
/// survives YAML inside the `type`-tagged state map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MessageFields", into = "MessageFields")]
pub enum MessageTemplate {
    /// Literal text with `{{ $.path }}` interpolation.
    Text(String),
    /// The value found at a context path.
    Path(String),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl TryFrom<MessageFields> for MessageTemplate {
    type Error = String;

    fn try_from(fields: MessageFields) -> Result<Self, Self::Error> {
        match (fields.text, fields.path) {
            (Some(text), None) => Ok(Self::Text(text)),
            (None, Some(path)) => Ok(Self::Path(path)),
            (Some(_), Some(_)) => Err("message takes either `text` or `path`, not both".to_string()),
            (None, None) => Err("message needs a `text` or `path` field".to_string()),
        }
    }
}

impl From<MessageTemplate> for MessageFields {
    fn from(template: MessageTemplate) -> Self {
        match template {
            MessageTemplate::Text(text) => Self { text: Some(text), path: None },
            MessageTemplate::Path(path) => Self { text: None, path: Some(path) },
        }
    }
}

/// Fail state: terminates its scope with `error_kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailState {
    pub error_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

// ---------------------------------------------------------------------------
// Retry / Catch policies
// ---------------------------------------------------------------------------

/// Retry rules for a state.
///
/// `max_attempts` counts every call, including the first one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Error kinds that are retried; `*` matches every kind.
    #[serde(default = "default_error_kinds")]
    pub error_kinds: Vec<String>,
    /// Delay before the first retry, in seconds.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    /// Upper bound on a single delay, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_seconds: Option<f64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            error_kinds: default_error_kinds(),
            interval_seconds: default_interval_seconds(),
            max_attempts: default_max_attempts(),
            backoff_rate: default_backoff_rate(),
            max_delay_seconds: None,
        }
    }
}

fn default_error_kinds() -> Vec<String> {
    vec![error_kind::ALL.to_string()]
}

fn default_interval_seconds() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_rate() -> f64 {
    2.0
}

/// Recovery rule: on a matching error, record it and jump to `next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchPolicy {
    #[serde(default = "default_error_kinds")]
    pub error_kinds: Vec<String>,
    /// Target state ID.
    pub next: String,
    /// Where `{kind, message}` is written before transitioning.
    #[serde(default = "default_error_result_path")]
    pub result_path: String,
}

fn default_error_result_path() -> String {
    "$.error".to_string()
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// Terminal status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Structured detail of an unrecovered run error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub kind: String,
    pub message: String,
    /// ID of the state where the error originated.
    pub state: String,
    /// Scope path to the originating state, outermost first
    /// (e.g. `["Fanout", "branches[0]", "RunA"]`).
    pub path: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
