//! Application error type mapping to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// No workflow is served under this name.
    WorkflowNotFound(String),
    /// No active run has this ID.
    RunNotFound(String),
    /// Malformed request (bad payload or path parameter).
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::WorkflowNotFound(name) => (
                StatusCode::NOT_FOUND,
                "WORKFLOW_NOT_FOUND",
                format!("Workflow '{name}' not found"),
            ),
            AppError::RunNotFound(id) => (
                StatusCode::NOT_FOUND,
                "RUN_NOT_FOUND",
                format!("No active run '{id}'"),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
