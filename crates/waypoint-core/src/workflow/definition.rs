//! Workflow definition parsing, validation, and filesystem operations.
//!
//! Converts between YAML/JSON documents and the canonical `WorkflowDefinition`
//! IR, validates every scope (top level and each Parallel branch
//! independently), and wraps the result in a `Workflow` handle the engine
//! accepts. A definition that fails validation never reaches the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use waypoint_types::workflow::{
    CatchPolicy, MessageTemplate, RetryPolicy, State, WorkflowDefinition,
};

use super::context::{PathError, parse_path};
use super::graph::analyze_graph;
use super::retry::RetryHandler;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a workflow definition.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// `next` edges form a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// The start state, a `next`, or a catch target does not exist.
    #[error("unknown state: {0}")]
    UnknownState(String),

    /// A context path in the definition is malformed.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// A Parallel branch failed validation.
    #[error("in branch {index} of parallel state '{state}': {source}")]
    Branch {
        state: String,
        index: usize,
        #[source]
        source: Box<WorkflowError>,
    },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Document format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Yaml,
    Json,
}

impl DefinitionFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => DefinitionFormat::Json,
            _ => DefinitionFormat::Yaml,
        }
    }
}

/// Parse a YAML string into a validated `Workflow`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<Workflow, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    Workflow::new(def)
}

/// Parse a JSON string into a validated `Workflow`.
pub fn parse_workflow_json(json: &str) -> Result<Workflow, WorkflowError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    Workflow::new(def)
}

pub fn parse_workflow(content: &str, format: DefinitionFormat) -> Result<Workflow, WorkflowError> {
    match format {
        DefinitionFormat::Yaml => parse_workflow_yaml(content),
        DefinitionFormat::Json => parse_workflow_json(content),
    }
}

pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(def).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

pub fn serialize_workflow_json(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_json::to_string_pretty(def).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Outcome of a successful validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Top-level states reachable from the start state.
    pub reachable: Vec<String>,
    /// Unreachable states across all scopes, branch states qualified as
    /// `Parallel/branches[i]/State`.
    pub unreachable: Vec<String>,
    /// Total number of states, branch states included.
    pub state_count: usize,
}

/// Validate a definition and every Parallel branch inside it.
///
/// Checks, per scope:
/// - at least one state; `startState`, every `next` and every catch target resolve
/// - `next` edges are acyclic
/// - context paths parse; timeouts are positive
/// - retry policies are usable; catch and retry kind lists are non-empty
/// - Parallel states declare at least one branch
/// - branch scopes carry no run-level `timeoutSeconds`
///
/// Unreachable states are reported, not rejected.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<ValidationReport, WorkflowError> {
    let mut report = ValidationReport::default();
    let reachable = validate_scope(def, "", &mut report)?;
    report.reachable = reachable;
    Ok(report)
}

fn validate_scope(
    def: &WorkflowDefinition,
    prefix: &str,
    report: &mut ValidationReport,
) -> Result<Vec<String>, WorkflowError> {
    if let Some(name) = &def.name {
        if name.is_empty() {
            return Err(WorkflowError::ValidationError(
                "workflow name must not be empty".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(WorkflowError::ValidationError(format!(
                "workflow name '{name}' contains invalid characters (only alphanumeric, '-' and '_' allowed)"
            )));
        }
    }
    check_timeout(def.timeout_seconds, "workflow")?;
    if !prefix.is_empty() && def.timeout_seconds.is_some() {
        return Err(WorkflowError::ValidationError(
            "timeoutSeconds applies to the whole run; set it on the workflow or on branch task states"
                .to_string(),
        ));
    }

    let analysis = analyze_graph(def)?;
    report.state_count += def.states.len();
    report
        .unreachable
        .extend(analysis.unreachable.iter().map(|id| format!("{prefix}{id}")));

    for (id, state) in &def.states {
        match state {
            State::Task(t) => {
                if t.executor.trim().is_empty() {
                    return Err(invalid(id, "executor must not be empty"));
                }
                check_optional_path(t.input_path.as_deref())?;
                check_optional_path(t.result_path.as_deref())?;
                check_timeout(t.timeout_seconds, id)?;
                check_retry(id, t.retry.as_ref())?;
                check_catches(id, &t.catches)?;
            }
            State::Parallel(p) => {
                if p.branches.is_empty() {
                    return Err(invalid(id, "parallel state must declare at least one branch"));
                }
                check_optional_path(p.result_path.as_deref())?;
                check_catches(id, &p.catches)?;
                for (index, branch) in p.branches.iter().enumerate() {
                    let branch_prefix = format!("{prefix}{id}/branches[{index}]/");
                    validate_scope(&branch.workflow, &branch_prefix, report).map_err(|source| {
                        WorkflowError::Branch {
                            state: id.clone(),
                            index,
                            source: Box::new(source),
                        }
                    })?;
                }
            }
            State::Notify(n) => {
                if n.sink.trim().is_empty() {
                    return Err(invalid(id, "sink must not be empty"));
                }
                if let MessageTemplate::Path(path) = &n.message {
                    parse_path(path)?;
                }
                check_retry(id, n.retry.as_ref())?;
            }
            State::Fail(f) => {
                if f.error_kind.trim().is_empty() {
                    return Err(invalid(id, "errorKind must not be empty"));
                }
            }
            State::Succeed => {}
        }
    }

    Ok(analysis.reachable)
}

fn invalid(state: &str, reason: &str) -> WorkflowError {
    WorkflowError::ValidationError(format!("state '{state}': {reason}"))
}

fn check_optional_path(path: Option<&str>) -> Result<(), WorkflowError> {
    if let Some(path) = path {
        parse_path(path)?;
    }
    Ok(())
}

fn check_timeout(timeout: Option<u64>, owner: &str) -> Result<(), WorkflowError> {
    if timeout == Some(0) {
        return Err(WorkflowError::ValidationError(format!(
            "{owner}: timeoutSeconds must be > 0"
        )));
    }
    Ok(())
}

fn check_retry(state: &str, retry: Option<&RetryPolicy>) -> Result<(), WorkflowError> {
    match retry {
        Some(policy) => RetryHandler::validate(policy).map_err(|reason| invalid(state, &reason)),
        None => Ok(()),
    }
}

fn check_catches(state: &str, catches: &[CatchPolicy]) -> Result<(), WorkflowError> {
    for catch in catches {
        if catch.error_kinds.is_empty() {
            return Err(invalid(state, "catch errorKinds must not be empty"));
        }
        parse_path(&catch.result_path)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validated handle
// ---------------------------------------------------------------------------

/// A definition that passed validation, ready to run.
///
/// Cheap to clone: the definition is shared.
#[derive(Debug, Clone)]
pub struct Workflow {
    definition: Arc<WorkflowDefinition>,
    report: ValidationReport,
}

impl Workflow {
    /// Validate `definition`, logging a warning per unreachable state.
    pub fn new(definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
        let report = validate_definition(&definition)?;
        for state in &report.unreachable {
            tracing::warn!(
                workflow = definition.display_name(),
                state = %state,
                "state is unreachable from the start state"
            );
        }
        Ok(Self {
            definition: Arc::new(definition),
            report,
        })
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub(crate) fn shared(&self) -> Arc<WorkflowDefinition> {
        Arc::clone(&self.definition)
    }

    pub fn name(&self) -> &str {
        self.definition.display_name()
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a workflow from a YAML or JSON file (format chosen by extension).
pub fn load_workflow_file(path: &Path) -> Result<Workflow, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow(&content, DefinitionFormat::from_path(path))
}

/// Save a definition, creating parent directories as needed.
pub fn save_workflow_file(path: &Path, def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = match DefinitionFormat::from_path(path) {
        DefinitionFormat::Json => serialize_workflow_json(def)?,
        DefinitionFormat::Yaml => serialize_workflow_yaml(def)?,
    };
    std::fs::write(path, content)?;
    Ok(())
}

/// Discover all workflow files (`.yaml`, `.yml`, `.json`) under `base_dir`.
///
/// Files that fail to parse or validate are skipped with a warning.
pub fn discover_workflows(base_dir: &Path) -> Result<Vec<(PathBuf, Workflow)>, WorkflowError> {
    let mut results = Vec::new();
    if !base_dir.exists() {
        return Ok(results);
    }
    discover_recursive(base_dir, &mut results)?;
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn discover_recursive(
    dir: &Path,
    results: &mut Vec<(PathBuf, Workflow)>,
) -> Result<(), WorkflowError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            discover_recursive(&path, results)?;
            continue;
        }
        let is_definition = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml" | "json")
        );
        if !is_definition {
            continue;
        }
        match load_workflow_file(&path) {
            Ok(workflow) => results.push((path, workflow)),
            Err(e) => tracing::warn!(?path, error = %e, "skipping invalid workflow file"),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT_YAML: &str = r#"
name: cost-report
startState: RunReport
states:
  RunReport:
    type: task
    executor: find_expensive_lambdas
    resultPath: $.output
    retry:
      errorKinds: [ServiceBusy]
      intervalSeconds: 10
      maxAttempts: 2
      backoffRate: 2
    catch:
      - errorKinds: ["*"]
        next: Failed
    next: NotifyReport
  NotifyReport:
    type: notify
    sink: alerts
    subject: Expensive functions
    message:
      path: $.output.Payload
    next: Done
  Done:
    type: succeed
  Failed:
    type: fail
    errorKind: Report.Failed
"#;

    #[test]
    fn parse_valid_yaml() {
        let workflow = parse_workflow_yaml(REPORT_YAML).unwrap();
        assert_eq!(workflow.name(), "cost-report");
        assert_eq!(workflow.report().state_count, 4);
        assert!(workflow.report().unreachable.is_empty());
    }

    #[test]
    fn parse_json_equivalent() {
        let yaml = parse_workflow_yaml(REPORT_YAML).unwrap();
        let json = serialize_workflow_json(yaml.definition()).unwrap();
        let back = parse_workflow_json(&json).unwrap();
        assert_eq!(back.definition(), yaml.definition());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_workflow_yaml("startState: [").unwrap_err();
        assert!(matches!(err, WorkflowError::ParseError(_)));
    }

    #[test]
    fn unknown_state_type_is_parse_error() {
        let yaml = "startState: A\nstates:\n  A:\n    type: wait\n";
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::ParseError(_))
        ));
    }

    #[test]
    fn invalid_name_rejected() {
        let yaml = REPORT_YAML.replace("name: cost-report", "name: cost report!");
        assert!(matches!(
            parse_workflow_yaml(&yaml),
            Err(WorkflowError::ValidationError(_))
        ));
    }

    #[test]
    fn bad_retry_policy_rejected() {
        let yaml = REPORT_YAML.replace("maxAttempts: 2", "maxAttempts: 0");
        let err = parse_workflow_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("maxAttempts"));
    }

    #[test]
    fn bad_result_path_rejected() {
        let yaml = REPORT_YAML.replace("resultPath: $.output", "resultPath: output");
        assert!(matches!(
            parse_workflow_yaml(&yaml),
            Err(WorkflowError::InvalidPath(_))
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let yaml = REPORT_YAML.replace("resultPath: $.output", "resultPath: $.output\n    timeoutSeconds: 0");
        assert!(matches!(
            parse_workflow_yaml(&yaml),
            Err(WorkflowError::ValidationError(_))
        ));
    }

    #[test]
    fn branch_errors_are_scoped() {
        let yaml = r#"
startState: Fanout
states:
  Fanout:
    type: parallel
    branches:
      - startState: A
        states:
          A: { type: succeed }
      - startState: Missing
        states:
          B: { type: succeed }
    next: Done
  Done:
    type: succeed
"#;
        match parse_workflow_yaml(yaml).unwrap_err() {
            WorkflowError::Branch { state, index, source } => {
                assert_eq!(state, "Fanout");
                assert_eq!(index, 1);
                assert!(matches!(*source, WorkflowError::UnknownState(_)));
            }
            other => panic!("expected branch error, got {other:?}"),
        }
    }

    #[test]
    fn disabled_branches_are_still_validated() {
        let yaml = r#"
startState: Fanout
states:
  Fanout:
    type: parallel
    branches:
      - enabled: false
        startState: A
        states:
          A: { type: task, executor: x, next: A }
    next: Done
  Done:
    type: succeed
"#;
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::Branch { .. })
        ));
    }

    #[test]
    fn branch_level_run_timeout_rejected() {
        let yaml = r#"
startState: Fanout
states:
  Fanout:
    type: parallel
    branches:
      - startState: A
        timeoutSeconds: 30
        states:
          A: { type: succeed }
    next: Done
  Done:
    type: succeed
"#;
        match parse_workflow_yaml(yaml).unwrap_err() {
            WorkflowError::Branch { source, .. } => {
                assert!(source.to_string().contains("timeoutSeconds"));
            }
            other => panic!("expected branch error, got {other:?}"),
        }
    }

    #[test]
    fn empty_parallel_rejected() {
        let yaml = "startState: P\nstates:\n  P: { type: parallel, branches: [], next: D }\n  D: { type: succeed }\n";
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::ValidationError(_))
        ));
    }

    #[test]
    fn unreachable_states_are_reported_with_branch_prefix() {
        let yaml = r#"
startState: Fanout
states:
  Fanout:
    type: parallel
    branches:
      - startState: A
        states:
          A: { type: succeed }
          Stray: { type: succeed }
    next: Done
  Done:
    type: succeed
  Orphan:
    type: succeed
"#;
        let workflow = parse_workflow_yaml(yaml).unwrap();
        assert_eq!(
            workflow.report().unreachable,
            vec!["Orphan".to_string(), "Fanout/branches[0]/Stray".to_string()]
        );
        assert_eq!(workflow.report().state_count, 5);
    }

    // -----------------------------------------------------------------------
    // Filesystem
    // -----------------------------------------------------------------------

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = parse_workflow_yaml(REPORT_YAML).unwrap();

        let yaml_path = dir.path().join("nested/report.yaml");
        save_workflow_file(&yaml_path, workflow.definition()).unwrap();
        let loaded = load_workflow_file(&yaml_path).unwrap();
        assert_eq!(loaded.definition(), workflow.definition());

        let json_path = dir.path().join("report.json");
        save_workflow_file(&json_path, workflow.definition()).unwrap();
        let content = std::fs::read_to_string(&json_path).unwrap();
        assert!(content.trim_start().starts_with('{'));
        assert_eq!(load_workflow_file(&json_path).unwrap().definition(), workflow.definition());
    }

    #[test]
    fn discover_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), REPORT_YAML).unwrap();
        std::fs::write(dir.path().join("bad.yml"), "startState: Nope\nstates: {}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a workflow").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/other.yaml"), REPORT_YAML).unwrap();

        let found = discover_workflows(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|(_, w)| w.name() == "cost-report"));
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let found = discover_workflows(Path::new("/definitely/not/here")).unwrap();
        assert!(found.is_empty());
    }
}
