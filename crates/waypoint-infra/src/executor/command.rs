//! CommandExecutor -- runs a Task state as a local subprocess.
//!
//! The task input is written to the child's stdin as JSON and the child's
//! stdout is parsed as the JSON result. A non-zero exit fails the task with
//! `Task.Failed`, unless stdout holds a `{"kind", "message"}` error document,
//! in which case that kind is raised so retry and catch policies can match it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use waypoint_core::executor::TaskExecutor;
use waypoint_types::error::TaskError;

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 512;

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    kind: String,
    #[serde(default)]
    message: String,
}

/// Subprocess-backed task executor.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

impl TaskExecutor for CommandExecutor {
    async fn execute(&self, executor: &str, input: Value) -> Result<Value, TaskError> {
        let payload = serde_json::to_vec(&input)
            .map_err(|e| TaskError::failed(format!("failed to encode input: {e}")))?;

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // An aborted call (task timeout) must not leave the child behind.
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            TaskError::failed(format!("failed to spawn '{}' for '{executor}': {e}", self.program))
        })?;

        // Input is written while output is drained; a filter that echoes a
        // large payload would otherwise fill its stdout pipe and stall.
        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                // A child that never reads its input closes the pipe early; its exit status decides.
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!(executor, "stdin write failed: {e}");
                }
            }
        };
        let ((), output) = tokio::join!(write_input, child.wait_with_output());
        let output =
            output.map_err(|e| TaskError::failed(format!("failed to wait for '{}': {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();

        if !output.status.success() {
            if let Ok(doc) = serde_json::from_str::<ErrorDocument>(stdout) {
                return Err(TaskError::new(doc.kind, doc.message));
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(TaskError::failed(format!(
                "'{executor}' exited with {}: {stderr}",
                output.status
            )));
        }

        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout)
            .map_err(|e| TaskError::failed(format!("'{executor}' wrote invalid JSON: {e}")))
    }
}
