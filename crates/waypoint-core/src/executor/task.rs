//! TaskExecutor trait definition.

use serde_json::Value;
use waypoint_types::error::TaskError;

/// Something that can run a Task state's unit of work.
///
/// `executor` is the name the definition used in `executor:`. Implementations
/// that serve a single name may ignore it; routers use it to dispatch.
///
/// Implementations live in waypoint-infra (e.g., `CommandExecutor`,
/// `HttpExecutor`). Errors carry a kind string that retry and catch
/// policies match on.
pub trait TaskExecutor: Send + Sync {
    fn execute(
        &self,
        executor: &str,
        input: Value,
    ) -> impl std::future::Future<Output = Result<Value, TaskError>> + Send;
}
