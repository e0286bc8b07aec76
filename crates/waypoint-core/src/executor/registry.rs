//! Executor registry: routes Task states to executors by name.

use std::collections::HashMap;

use serde_json::Value;
use waypoint_types::error::TaskError;

use super::box_executor::BoxTaskExecutor;
use super::task::TaskExecutor;

/// Name-indexed registry of boxed task executors.
///
/// The registry is itself a `TaskExecutor`: it looks up the requested name
/// and delegates, failing with `Task.NotFound` when nothing is registered.
pub struct ExecutorRegistry {
    executors: HashMap<String, BoxTaskExecutor>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor under the given name, replacing any existing one.
    pub fn register(&mut self, name: impl Into<String>, executor: BoxTaskExecutor) {
        self.executors.insert(name.into(), executor);
    }

    pub fn get(&self, name: &str) -> Option<&BoxTaskExecutor> {
        self.executors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Registered executor names, sorted.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executors.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.list_names())
            .finish()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for ExecutorRegistry {
    async fn execute(&self, executor: &str, input: Value) -> Result<Value, TaskError> {
        match self.executors.get(executor) {
            Some(found) => found.execute(executor, input).await,
            None => Err(TaskError::not_found(executor)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_types::error::error_kind;

    struct Constant(Value);

    impl TaskExecutor for Constant {
        async fn execute(&self, _executor: &str, _input: Value) -> Result<Value, TaskError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let mut registry = ExecutorRegistry::new();
        registry.register("a", BoxTaskExecutor::new(Constant(json!("from a"))));
        registry.register("b", BoxTaskExecutor::new(Constant(json!("from b"))));

        assert_eq!(registry.execute("b", Value::Null).await.unwrap(), json!("from b"));
        assert_eq!(registry.execute("a", Value::Null).await.unwrap(), json!("from a"));
        assert_eq!(registry.list_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unknown_executor_is_not_found() {
        let registry = ExecutorRegistry::default();
        let err = registry.execute("ghost", Value::Null).await.unwrap_err();
        assert_eq!(err.kind, error_kind::TASK_NOT_FOUND);
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = ExecutorRegistry::new();
        registry.register("a", BoxTaskExecutor::new(Constant(json!(1))));
        registry.register("a", BoxTaskExecutor::new(Constant(json!(2))));
        assert_eq!(registry.list_names().len(), 1);
        assert!(registry.contains("a"));
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn debug_lists_registered_names() {
        let mut registry = ExecutorRegistry::new();
        registry.register("report", BoxTaskExecutor::new(Constant(json!(1))));
        assert_eq!(format!("{registry:?}"), r#"ExecutorRegistry { executors: ["report"] }"#);
    }
}
