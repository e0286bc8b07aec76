//! Application state wiring config, collaborators and the engine together.
//!
//! Both the CLI and the HTTP trigger build their engine here so that the
//! same config produces the same executors and sinks everywhere.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use waypoint_core::workflow::definition::{Workflow, discover_workflows};
use waypoint_core::workflow::engine::WorkflowEngine;
use waypoint_infra::config::{default_config_path, load_engine_config, read_engine_config};
use waypoint_infra::wiring::{build_executor_registry, build_sink_registry};
use waypoint_types::config::EngineConfig;

/// Resolve the engine config.
///
/// An explicitly named file must exist and parse. Otherwise the default
/// location is tried, falling back to built-in defaults.
pub async fn resolve_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    match explicit {
        Some(path) => read_engine_config(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => match default_config_path() {
            Some(path) => Ok(load_engine_config(&path).await),
            None => Ok(EngineConfig::default()),
        },
    }
}

/// Build an engine whose executors and sinks come from `config`.
pub fn build_engine(config: &EngineConfig) -> Result<WorkflowEngine> {
    let executors = build_executor_registry(config).context("Failed to set up task executors")?;
    let sinks = build_sink_registry(config).context("Failed to set up notification sinks")?;
    tracing::debug!(
        executors = ?executors.list_names(),
        sinks = ?sinks.list_names(),
        "collaborators ready"
    );
    Ok(WorkflowEngine::new(executors, sinks, config))
}

/// Shared state for the HTTP trigger.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    /// Served workflows keyed by definition name.
    pub workflows: Arc<BTreeMap<String, Workflow>>,
}

impl AppState {
    pub fn new(engine: WorkflowEngine, workflows: BTreeMap<String, Workflow>) -> Self {
        Self {
            engine: Arc::new(engine),
            workflows: Arc::new(workflows),
        }
    }

    /// Load every valid workflow under `dir`. The first file wins when two
    /// definitions share a name.
    pub fn load_workflows(dir: &Path) -> Result<BTreeMap<String, Workflow>> {
        let found = discover_workflows(dir)
            .with_context(|| format!("Failed to scan {}", dir.display()))?;

        let mut workflows = BTreeMap::new();
        for (path, workflow) in found {
            let name = workflow.name().to_string();
            if workflows.contains_key(&name) {
                tracing::warn!(
                    workflow = %name,
                    path = %path.display(),
                    "duplicate workflow name, skipping"
                );
                continue;
            }
            workflows.insert(name, workflow);
        }
        Ok(workflows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WORKFLOW: &str = r#"
name: hello
startState: Done
states:
  Done:
    type: succeed
"#;

    #[tokio::test]
    async fn explicit_config_must_exist() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_config(Some(&tmp.path().join("missing.toml"))).await.unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }

    #[tokio::test]
    async fn explicit_config_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_transitions = 7\n").unwrap();
        let config = resolve_config(Some(&path)).await.unwrap();
        assert_eq!(config.max_transitions, 7);
    }

    #[test]
    fn duplicate_names_keep_the_first_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.yaml"), WORKFLOW).unwrap();
        std::fs::write(tmp.path().join("b.yaml"), WORKFLOW).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let workflows = AppState::load_workflows(tmp.path()).unwrap();
        assert_eq!(workflows.keys().collect::<Vec<_>>(), vec!["hello"]);
    }
}
