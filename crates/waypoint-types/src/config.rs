//! Engine configuration types for Waypoint.
//!
//! `EngineConfig` represents the top-level `config.toml`: engine limits plus
//! the named task executors and notification sinks that definitions refer to
//! through `executor:` and `sink:`.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the engine and its collaborators.
///
/// All fields have sensible defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default whole-run timeout (definition `timeoutSeconds` overrides it).
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Default per-call task timeout (state `timeoutSeconds` overrides it).
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Maximum number of state entries in one run, across all branches.
    #[serde(default = "default_max_transitions")]
    pub max_transitions: u32,

    /// Event bus channel capacity.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Fail the run when a notification cannot be delivered.
    #[serde(default)]
    pub notify_failures_fatal: bool,

    #[serde(default)]
    pub executors: BTreeMap<String, ExecutorConfig>,

    #[serde(default)]
    pub sinks: BTreeMap<String, SinkConfig>,
}

fn default_run_timeout_secs() -> u64 {
    1800
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_max_transitions() -> u32 {
    10_000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            max_transitions: default_max_transitions(),
            event_capacity: default_event_capacity(),
            notify_failures_fatal: false,
            executors: BTreeMap::new(),
            sinks: BTreeMap::new(),
        }
    }
}

/// How a named task executor is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorConfig {
    /// Spawn a local process: JSON input on stdin, JSON result on stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
    /// POST the input as JSON to an HTTP endpoint.
    Http {
        url: String,
        /// Bearer token sent in `Authorization`.
        #[serde(default, skip_serializing)]
        auth_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

/// How a named notification sink delivers messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Emit the notification as a structured log line.
    Log,
    /// POST `{subject, body, sentAt}` to a URL.
    Webhook {
        url: String,
        /// HMAC-SHA256 key for the `X-Waypoint-Signature` header.
        #[serde(default, skip_serializing)]
        signing_secret: Option<String>,
    },
}
