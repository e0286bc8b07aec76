//! Request handlers for the trigger API.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;
use waypoint_core::workflow::engine::ExecutionResult;

use crate::http::error::AppError;
use crate::state::AppState;

/// Summary of a served workflow.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub start_state: String,
    pub state_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreachable: Vec<String>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "workflows": state.workflows.len(),
        "activeRuns": state.engine.active_runs().len(),
    }))
}

/// GET /workflows
pub async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowSummary>> {
    let summaries = state
        .workflows
        .iter()
        .map(|(name, workflow)| {
            let def = workflow.definition();
            WorkflowSummary {
                name: name.clone(),
                comment: def.comment.clone(),
                start_state: def.start_state.clone(),
                state_count: workflow.report().state_count,
                unreachable: workflow.report().unreachable.clone(),
            }
        })
        .collect();
    Json(summaries)
}

/// POST /workflows/{name}/runs
///
/// The request body is the trigger payload (empty means `{}`). Responds once
/// the run finishes: 200 when it succeeded, 422 when it failed.
pub async fn start_run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ExecutionResult>), AppError> {
    let workflow = state
        .workflows
        .get(&name)
        .ok_or_else(|| AppError::WorkflowNotFound(name.clone()))?;

    let payload = parse_payload(&body)?;
    let result = state.engine.run(workflow, payload).await;

    tracing::info!(
        workflow = %name,
        run_id = %result.run_id,
        status = %result.status,
        "run finished via trigger"
    );

    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)))
}

/// GET /runs
pub async fn list_runs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "active": state.engine.active_runs() }))
}

/// POST /runs/{run_id}/cancel
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let id = Uuid::parse_str(&run_id)
        .map_err(|e| AppError::BadRequest(format!("invalid run id '{run_id}': {e}")))?;

    if state.engine.cancel(id) {
        Ok((StatusCode::ACCEPTED, Json(json!({ "runId": id, "cancelled": true }))))
    } else {
        Err(AppError::RunNotFound(run_id))
    }
}

fn parse_payload(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("trigger payload is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_empty_object() {
        assert_eq!(parse_payload(b"").unwrap(), json!({}));
        assert_eq!(parse_payload(b"  \n").unwrap(), json!({}));
    }

    #[test]
    fn payload_must_be_json() {
        assert_eq!(parse_payload(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(parse_payload(b"{oops"), Err(AppError::BadRequest(_))));
    }
}
