//! HttpExecutor -- runs a Task state by POSTing its input to an HTTP endpoint.
//!
//! The auth token is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building the `Authorization` header.
//!
//! Status mapping:
//! - 2xx: the body is the JSON result (an empty body is `null`)
//! - 429 and 5xx, connection failures: `Task.Transient`
//! - client-side timeout: `Task.Timeout`
//! - any other status: `Task.Failed`

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use waypoint_core::executor::TaskExecutor;
use waypoint_types::error::{TaskError, error_kind};

/// HTTP-backed task executor.
pub struct HttpExecutor {
    client: reqwest::Client,
    url: String,
    auth_token: Option<SecretString>,
}

impl HttpExecutor {
    /// Create an executor for `url`, optionally bounding each request.
    pub fn new(
        url: impl Into<String>,
        auth_token: Option<SecretString>,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent("waypoint/0.1");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn request_error(executor: &str, err: reqwest::Error) -> TaskError {
    if err.is_timeout() {
        TaskError::new(error_kind::TASK_TIMEOUT, format!("'{executor}' request timed out: {err}"))
    } else if err.is_connect() {
        TaskError::transient(format!("'{executor}' connection failed: {err}"))
    } else {
        TaskError::failed(format!("'{executor}' request failed: {err}"))
    }
}

impl TaskExecutor for HttpExecutor {
    async fn execute(&self, executor: &str, input: Value) -> Result<Value, TaskError> {
        let mut request = self.client.post(&self.url).json(&input);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| request_error(executor, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(executor, e))?;

        if !status.is_success() {
            let message = format!("'{executor}' returned HTTP {status}: {}", body.trim());
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                TaskError::transient(message)
            } else {
                TaskError::failed(message)
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| TaskError::failed(format!("'{executor}' returned invalid JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::json;

    async fn spawn_server() -> String {
        async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Json(json!({ "received": body, "auth": auth }))
        }

        let app = Router::new()
            .route("/echo", post(echo))
            .route("/busy", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }))
            .route("/limited", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .route("/bad", post(|| async { (StatusCode::BAD_REQUEST, "missing field") }))
            .route("/empty", post(|| async { StatusCode::NO_CONTENT }))
            .route("/garbled", post(|| async { "<html>" }))
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "{}"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn executor(url: String) -> HttpExecutor {
        HttpExecutor::new(url, None, None).unwrap()
    }

    #[tokio::test]
    async fn posts_input_and_returns_json_body() {
        let base = spawn_server().await;
        let exec = HttpExecutor::new(
            format!("{base}/echo"),
            Some(SecretString::from("s3cret".to_string())),
            None,
        )
        .unwrap();

        let out = exec.execute("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(out["received"], json!({"x": 1}));
        assert_eq!(out["auth"], json!("Bearer s3cret"));
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_transient() {
        let base = spawn_server().await;
        let err = executor(format!("{base}/busy")).execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_TRANSIENT);
        assert!(err.message.contains("503"));
        assert!(err.message.contains("overloaded"));

        let err = executor(format!("{base}/limited")).execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_TRANSIENT);
    }

    #[tokio::test]
    async fn client_errors_are_task_failed() {
        let base = spawn_server().await;
        let err = executor(format!("{base}/bad")).execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_FAILED);
        assert!(err.message.contains("missing field"));
    }

    #[tokio::test]
    async fn empty_and_invalid_bodies() {
        let base = spawn_server().await;
        let out = executor(format!("{base}/empty")).execute("t", json!({})).await.unwrap();
        assert_eq!(out, Value::Null);

        let err = executor(format!("{base}/garbled")).execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_FAILED);
        assert!(err.message.contains("invalid JSON"));
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = executor(format!("http://{addr}/gone")).execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_TRANSIENT);
    }

    #[tokio::test]
    async fn request_timeout_is_task_timeout() {
        let base = spawn_server().await;
        let exec = HttpExecutor::new(format!("{base}/slow"), None, Some(Duration::from_millis(100)))
            .unwrap();
        let err = exec.execute("t", json!({})).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_TIMEOUT);
    }

    #[test]
    fn debug_redacts_token() {
        let exec = HttpExecutor::new(
            "http://localhost/x",
            Some(SecretString::from("s3cret".to_string())),
            None,
        )
        .unwrap();
        let debug = format!("{exec:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("REDACTED"));
    }
}
