//! Workflow engine: interprets a validated `Workflow` against a task executor
//! and a notification sink.
//!
//! # Execution flow
//!
//! 1. Seed the `ExecutionContext` from the trigger payload and register a
//!    cancellation token for the run.
//! 2. Walk the graph from the start state. Task states call the executor
//!    (with per-call timeout and retry), Notify states call the sink, Parallel
//!    states fan out one tokio task per enabled branch and join in
//!    declaration order.
//! 3. Unrecovered errors go through the state's catch list; unmatched errors
//!    leave the current scope (a branch error becomes the Parallel's error).
//! 4. Succeed/Fail, cancellation, run timeout or the transition limit end the
//!    run. Runtime failures are reported in the `ExecutionResult`, never as `Err`.
//!
//! Every wait (executor call, backoff sleep, branch join) observes the run's
//! `CancellationToken`. Executor calls run in their own task so a cancelled
//! call is detached rather than aborted; its late result is discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use waypoint_types::config::EngineConfig;
use waypoint_types::error::{TaskError, error_kind};
use waypoint_types::event::WorkflowEvent;
use waypoint_types::workflow::{
    CatchPolicy, NotifyState, ParallelState, RetryPolicy, RunError, RunStatus, State, TaskState,
    WorkflowDefinition,
};

use crate::event::bus::EventBus;
use crate::executor::{BoxTaskExecutor, TaskExecutor};
use crate::notify::{Ack, BoxNotificationSink, NotificationSink};

use super::catch;
use super::context::{ExecutionContext, ROOT_PATH};
use super::definition::{Workflow, WorkflowError};
use super::retry::RetryHandler;

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Outcome of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub workflow: String,
    pub status: RunStatus,
    /// Context at the terminal state (or at the point of failure).
    pub context: ExecutionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Removes a run's token when the run future finishes or is dropped.
struct RunRegistration<'a> {
    tokens: &'a DashMap<Uuid, CancellationToken>,
    run_id: Uuid,
}

impl Drop for RunRegistration<'_> {
    fn drop(&mut self) {
        self.tokens.remove(&self.run_id);
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    run_timeout: Duration,
    task_timeout_secs: u64,
    max_transitions: u32,
    notify_failures_fatal: bool,
}

impl From<&EngineConfig> for Limits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            run_timeout: Duration::from_secs(config.run_timeout_secs),
            task_timeout_secs: config.task_timeout_secs,
            max_transitions: config.max_transitions,
            notify_failures_fatal: config.notify_failures_fatal,
        }
    }
}

/// Runs workflows against constructor-injected collaborators.
///
/// One engine serves any number of concurrent runs; each run owns its
/// context and cancellation token.
pub struct WorkflowEngine {
    executor: Arc<BoxTaskExecutor>,
    sink: Arc<BoxNotificationSink>,
    event_bus: EventBus,
    limits: Limits,
    /// Cancellation tokens keyed by run_id.
    cancellation_tokens: DashMap<Uuid, CancellationToken>,
}

impl WorkflowEngine {
    pub fn new<E, S>(executor: E, sink: S, config: &EngineConfig) -> Self
    where
        E: TaskExecutor + 'static,
        S: NotificationSink + 'static,
    {
        let event_bus = EventBus::new(config.event_capacity);
        Self::with_event_bus(executor, sink, config, event_bus)
    }

    /// Build an engine that publishes to an existing bus.
    pub fn with_event_bus<E, S>(executor: E, sink: S, config: &EngineConfig, event_bus: EventBus) -> Self
    where
        E: TaskExecutor + 'static,
        S: NotificationSink + 'static,
    {
        Self {
            executor: Arc::new(BoxTaskExecutor::new(executor)),
            sink: Arc::new(BoxNotificationSink::new(sink)),
            event_bus,
            limits: Limits::from(config),
            cancellation_tokens: DashMap::new(),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_bus.subscribe()
    }

    /// Run a validated workflow to completion.
    pub async fn run(&self, workflow: &Workflow, input: Value) -> ExecutionResult {
        self.run_with_token(workflow, input, CancellationToken::new()).await
    }

    /// Validate `definition`, then run it.
    pub async fn run_definition(
        &self,
        definition: WorkflowDefinition,
        input: Value,
    ) -> Result<ExecutionResult, WorkflowError> {
        let workflow = Workflow::new(definition)?;
        Ok(self.run(&workflow, input).await)
    }

    /// Run with a caller-owned cancellation token.
    ///
    /// Cancelling `token` unwinds every pending wait of the run, which then
    /// fails with `Run.Cancelled`.
    pub async fn run_with_token(
        &self,
        workflow: &Workflow,
        input: Value,
        token: CancellationToken,
    ) -> ExecutionResult {
        let run_id = Uuid::now_v7();
        self.cancellation_tokens.insert(run_id, token.clone());
        let _registration = RunRegistration {
            tokens: &self.cancellation_tokens,
            run_id,
        };

        let span = tracing::info_span!("workflow_run", run_id = %run_id, workflow = workflow.name());
        self.drive(run_id, workflow, input, token).instrument(span).await
    }

    /// Cancel an active run. Returns `false` if no such run is active.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.cancellation_tokens.get(&run_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(run_id = %run_id, "workflow run cancelled");
                true
            }
            None => false,
        }
    }

    /// IDs of runs currently in progress.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.cancellation_tokens.iter().map(|e| *e.key()).collect()
    }

    async fn drive(
        &self,
        run_id: Uuid,
        workflow: &Workflow,
        input: Value,
        token: CancellationToken,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let definition = workflow.shared();
        let name = workflow.name().to_string();
        let run_timeout = definition
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.limits.run_timeout);

        self.event_bus.publish(WorkflowEvent::RunStarted {
            run_id,
            workflow: name.clone(),
            at: started_at,
        });
        tracing::info!(timeout_secs = run_timeout.as_secs(), "starting workflow run");

        let run = Arc::new(Run {
            id: run_id,
            executor: Arc::clone(&self.executor),
            sink: Arc::clone(&self.sink),
            event_bus: self.event_bus.clone(),
            limits: self.limits,
            transitions: AtomicU32::new(0),
        });

        let mut scope = run.run_scope(
            definition,
            ExecutionContext::from_value(input),
            token.clone(),
            Vec::new(),
        );
        let (outcome, timed_out) = tokio::select! {
            outcome = &mut scope => (outcome, false),
            _ = tokio::time::sleep(run_timeout) => {
                tracing::warn!(timeout_secs = run_timeout.as_secs(), "workflow run timed out, cancelling");
                token.cancel();
                (scope.await, true)
            }
        };

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (status, context, error) = match outcome {
            Ok(context) => {
                tracing::info!(duration_ms, "workflow run succeeded");
                self.event_bus.publish(WorkflowEvent::RunSucceeded {
                    run_id,
                    workflow: name.clone(),
                    duration_ms,
                });
                (RunStatus::Succeeded, context, None)
            }
            Err(failure) => {
                let mut error = failure.error;
                if timed_out && failure.cancelled {
                    error.kind = error_kind::RUN_TIMEOUT.to_string();
                    error.message = format!("run exceeded its {}s timeout", run_timeout.as_secs());
                }
                tracing::warn!(
                    duration_ms,
                    error_kind = %error.kind,
                    state = %error.state,
                    error = %error.message,
                    "workflow run failed"
                );
                self.event_bus.publish(WorkflowEvent::RunFailed {
                    run_id,
                    workflow: name.clone(),
                    error_kind: error.kind.clone(),
                    state: error.state.clone(),
                });
                (RunStatus::Failed, failure.context, Some(error))
            }
        };

        ExecutionResult {
            run_id,
            workflow: name,
            status,
            context,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run internals
// ---------------------------------------------------------------------------

/// Why a wait ended without a value.
enum Interrupt<E> {
    Cancelled,
    Failed(E),
}

/// An execution scope (the top level or one branch) that did not succeed.
struct ScopeFailure {
    error: RunError,
    /// Context at the point of failure.
    context: ExecutionContext,
    /// The scope unwound because its token was cancelled.
    cancelled: bool,
}

impl ScopeFailure {
    fn failed(error: RunError, context: ExecutionContext) -> Self {
        Self {
            error,
            context,
            cancelled: false,
        }
    }

    fn cancelled(scope: &[String], state: &str, context: ExecutionContext) -> Self {
        Self {
            error: error_at(scope, state, error_kind::RUN_CANCELLED, "run cancelled"),
            context,
            cancelled: true,
        }
    }
}

type ScopeFuture = Pin<Box<dyn Future<Output = Result<ExecutionContext, ScopeFailure>> + Send>>;

fn error_at(
    scope: &[String],
    state: &str,
    kind: impl Into<String>,
    message: impl Into<String>,
) -> RunError {
    let mut path = scope.to_vec();
    path.push(state.to_string());
    RunError {
        kind: kind.into(),
        message: message.into(),
        state: state.to_string(),
        path,
    }
}

/// Shared state of one run, handed to every branch task.
struct Run {
    id: Uuid,
    executor: Arc<BoxTaskExecutor>,
    sink: Arc<BoxNotificationSink>,
    event_bus: EventBus,
    limits: Limits,
    /// State entries so far, across all branches.
    transitions: AtomicU32,
}

impl Run {
    /// Drive one scope from its start state to a terminal state.
    ///
    /// Boxed so Parallel states can recurse into branch scopes.
    fn run_scope(
        self: &Arc<Self>,
        graph: Arc<WorkflowDefinition>,
        mut ctx: ExecutionContext,
        token: CancellationToken,
        scope: Vec<String>,
    ) -> ScopeFuture {
        let run = Arc::clone(self);
        Box::pin(async move {
            let mut current = graph.start_state.clone();
            loop {
                if token.is_cancelled() {
                    return Err(ScopeFailure::cancelled(&scope, &current, ctx));
                }

                let entered = run.transitions.fetch_add(1, Ordering::Relaxed) + 1;
                if entered > run.limits.max_transitions {
                    let error = error_at(
                        &scope,
                        &current,
                        error_kind::RUN_TRANSITION_LIMIT,
                        format!("exceeded {} state transitions", run.limits.max_transitions),
                    );
                    return Err(ScopeFailure::failed(error, ctx));
                }

                let Some(state) = graph.state(&current) else {
                    let error = error_at(
                        &scope,
                        &current,
                        error_kind::RUN_INVALID_STATE,
                        format!("state '{current}' does not exist"),
                    );
                    return Err(ScopeFailure::failed(error, ctx));
                };

                tracing::debug!(state = %current, state_type = state.type_name(), "entering state");
                run.publish(WorkflowEvent::StateEntered {
                    run_id: run.id,
                    scope: scope.clone(),
                    state: current.clone(),
                    state_type: state.type_name().to_string(),
                    input: ctx.snapshot(),
                });

                let next = match state {
                    State::Succeed => {
                        run.exited(&scope, &current, &ctx, None);
                        return Ok(ctx);
                    }
                    State::Fail(fail) => {
                        run.exited(&scope, &current, &ctx, None);
                        let message = fail
                            .cause
                            .clone()
                            .unwrap_or_else(|| format!("reached fail state '{current}'"));
                        let error = error_at(&scope, &current, &fail.error_kind, message);
                        return Err(ScopeFailure::failed(error, ctx));
                    }
                    State::Task(task) => match run.run_task(&current, task, &ctx, &token).await {
                        Ok(result) => {
                            run.write_result(&mut ctx, task.result_path.as_deref(), &current, result);
                            task.next.clone()
                        }
                        Err(Interrupt::Cancelled) => {
                            return Err(ScopeFailure::cancelled(&scope, &current, ctx));
                        }
                        Err(Interrupt::Failed(err)) => {
                            let error = error_at(&scope, &current, err.kind, err.message);
                            match run.catch_error(&mut ctx, &current, &task.catches, &error) {
                                Some(target) => target,
                                None => return Err(ScopeFailure::failed(error, ctx)),
                            }
                        }
                    },
                    State::Parallel(parallel) => {
                        match run.run_parallel(&current, parallel, &ctx, &token, &scope).await {
                            Ok(children) => {
                                run.write_join(&mut ctx, parallel.result_path.as_deref(), &current, children);
                                parallel.next.clone()
                            }
                            Err(Interrupt::Cancelled) => {
                                return Err(ScopeFailure::cancelled(&scope, &current, ctx));
                            }
                            Err(Interrupt::Failed(error)) => {
                                match run.catch_error(&mut ctx, &current, &parallel.catches, &error) {
                                    Some(target) => target,
                                    None => return Err(ScopeFailure::failed(error, ctx)),
                                }
                            }
                        }
                    }
                    State::Notify(notify) => match run.run_notify(&current, notify, &ctx, &token).await {
                        Ok(()) => notify.next.clone(),
                        Err(Interrupt::Cancelled) => {
                            return Err(ScopeFailure::cancelled(&scope, &current, ctx));
                        }
                        Err(Interrupt::Failed(err)) => {
                            let error = error_at(&scope, &current, err.kind, err.message);
                            return Err(ScopeFailure::failed(error, ctx));
                        }
                    },
                };

                run.exited(&scope, &current, &ctx, Some(next.as_str()));
                current = next;
            }
        })
    }

    fn publish(&self, event: WorkflowEvent) {
        self.event_bus.publish(event);
    }

    fn exited(&self, scope: &[String], state: &str, ctx: &ExecutionContext, next: Option<&str>) {
        self.publish(WorkflowEvent::StateExited {
            run_id: self.id,
            scope: scope.to_vec(),
            state: state.to_string(),
            output: ctx.snapshot(),
            next: next.map(str::to_string),
        });
    }

    // -- Task -----------------------------------------------------------------

    async fn run_task(
        &self,
        state_id: &str,
        task: &TaskState,
        ctx: &ExecutionContext,
        token: &CancellationToken,
    ) -> Result<Value, Interrupt<TaskError>> {
        let input = ctx.get(task.input_path.as_deref().unwrap_or(ROOT_PATH));
        let timeout_secs = task.timeout_seconds.unwrap_or(self.limits.task_timeout_secs);
        let executor = task.executor.as_str();

        self.with_retry(state_id, task.retry.as_ref(), token, move || {
            self.call_executor(executor, input.clone(), timeout_secs, token)
        })
        .await
    }

    /// One executor call, bounded by `timeout_secs` and the run's token.
    async fn call_executor(
        &self,
        executor: &str,
        input: Value,
        timeout_secs: u64,
        token: &CancellationToken,
    ) -> Result<Value, Interrupt<TaskError>> {
        let backend = Arc::clone(&self.executor);
        let name = executor.to_string();
        let call = tokio::spawn(async move { backend.execute(&name, input).await });
        let abort = call.abort_handle();

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(executor, "cancelled with task call in flight, detaching it");
                Err(Interrupt::Cancelled)
            }
            joined = tokio::time::timeout(Duration::from_secs(timeout_secs), call) => match joined {
                Err(_elapsed) => {
                    abort.abort();
                    Err(Interrupt::Failed(TaskError::timeout(timeout_secs)))
                }
                Ok(Err(join_err)) => Err(Interrupt::Failed(TaskError::failed(format!(
                    "executor '{executor}' panicked: {join_err}"
                )))),
                Ok(Ok(result)) => result.map_err(Interrupt::Failed),
            },
        }
    }

    /// Repeat `attempt_fn` while `policy` allows, sleeping the backoff delay
    /// between attempts. The sleep ends early on cancellation.
    async fn with_retry<T, F, Fut>(
        &self,
        state_id: &str,
        policy: Option<&RetryPolicy>,
        token: &CancellationToken,
        mut attempt_fn: F,
    ) -> Result<T, Interrupt<TaskError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Interrupt<TaskError>>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(Interrupt::Cancelled) => return Err(Interrupt::Cancelled),
                Err(Interrupt::Failed(err)) => err,
            };

            let Some(policy) = policy.filter(|p| RetryHandler::should_retry(p, attempt, &err.kind))
            else {
                return Err(Interrupt::Failed(err));
            };

            let delay = RetryHandler::backoff_delay(policy, attempt);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(
                state = state_id,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms,
                error_kind = %err.kind,
                error = %err.message,
                "attempt failed, retrying"
            );
            self.publish(WorkflowEvent::RetryScheduled {
                run_id: self.id,
                state: state_id.to_string(),
                attempt,
                delay_ms,
                error_kind: err.kind.clone(),
            });

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn write_result(&self, ctx: &mut ExecutionContext, result_path: Option<&str>, state_id: &str, value: Value) {
        match result_path {
            Some(path) => {
                if let Err(e) = ctx.set(path, value) {
                    tracing::warn!(state = state_id, error = %e, "could not write state result");
                }
            }
            None => ctx.insert(state_id, value),
        }
    }

    // -- Catch ----------------------------------------------------------------

    /// Apply the first matching catch policy. Returns the state to jump to.
    fn catch_error(
        &self,
        ctx: &mut ExecutionContext,
        state_id: &str,
        catches: &[CatchPolicy],
        error: &RunError,
    ) -> Option<String> {
        let policy = catch::resolve(catches, &error.kind)?;
        tracing::info!(
            state = state_id,
            error_kind = %error.kind,
            next = %policy.next,
            "error caught"
        );
        if let Err(e) = ctx.set(&policy.result_path, catch::error_output(&error.kind, &error.message)) {
            tracing::warn!(state = state_id, error = %e, "could not record caught error");
        }
        self.publish(WorkflowEvent::ErrorCaught {
            run_id: self.id,
            state: state_id.to_string(),
            error_kind: error.kind.clone(),
            next: policy.next.clone(),
        });
        Some(policy.next.clone())
    }

    // -- Parallel -------------------------------------------------------------

    /// Run every enabled branch concurrently on a clone of `ctx`.
    ///
    /// Outputs come back in declaration order. The first branch to fail (by
    /// completion order) cancels its siblings and becomes the result.
    async fn run_parallel(
        self: &Arc<Self>,
        state_id: &str,
        parallel: &ParallelState,
        ctx: &ExecutionContext,
        token: &CancellationToken,
        scope: &[String],
    ) -> Result<Vec<ExecutionContext>, Interrupt<RunError>> {
        let siblings = token.child_token();
        let mut join_set = JoinSet::new();
        let mut outputs: Vec<Option<ExecutionContext>> = vec![None; parallel.branches.len()];

        for (index, branch) in parallel.enabled_branches() {
            let mut branch_scope = scope.to_vec();
            branch_scope.push(state_id.to_string());
            branch_scope.push(format!("branches[{index}]"));

            let branch_run = self.run_scope(
                Arc::new(branch.workflow.clone()),
                ctx.clone(),
                siblings.clone(),
                branch_scope,
            );
            let span = tracing::info_span!(
                "branch",
                parallel = %state_id,
                index,
                name = branch.workflow.display_name()
            );
            join_set.spawn(async move { (index, branch_run.await) }.instrument(span));
        }
        tracing::debug!(state = state_id, branches = join_set.len(), "parallel fan-out");

        let mut first_error: Option<RunError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(branch_ctx))) => outputs[index] = Some(branch_ctx),
                Ok((index, Err(failure))) if failure.cancelled => {
                    if first_error.is_some() {
                        tracing::debug!(state = state_id, branch = index, "branch cancelled");
                        self.publish(WorkflowEvent::BranchCancelled {
                            run_id: self.id,
                            parallel: state_id.to_string(),
                            branch: index,
                        });
                    }
                }
                Ok((index, Err(failure))) => {
                    if first_error.is_none() {
                        tracing::warn!(
                            state = state_id,
                            branch = index,
                            error_kind = %failure.error.kind,
                            "branch failed, cancelling siblings"
                        );
                        siblings.cancel();
                        first_error = Some(failure.error);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        siblings.cancel();
                        first_error = Some(error_at(
                            scope,
                            state_id,
                            error_kind::TASK_FAILED,
                            format!("branch task panicked: {join_err}"),
                        ));
                    }
                }
            }
        }

        if token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if let Some(error) = first_error {
            return Err(Interrupt::Failed(error));
        }
        Ok(outputs.into_iter().flatten().collect())
    }

    fn write_join(
        &self,
        ctx: &mut ExecutionContext,
        result_path: Option<&str>,
        state_id: &str,
        children: Vec<ExecutionContext>,
    ) {
        match result_path {
            Some(path) => {
                if let Err(e) = ctx.merge(path, children) {
                    tracing::warn!(state = state_id, error = %e, "could not write branch outputs");
                }
            }
            None => {
                let joined = children.into_iter().map(ExecutionContext::into_value).collect();
                ctx.insert(state_id, Value::Array(joined));
            }
        }
    }

    // -- Notify ---------------------------------------------------------------

    /// Render and deliver a notification.
    ///
    /// Delivery failures are logged and published; they only fail the scope
    /// when `notify_failures_fatal` is set.
    async fn run_notify(
        &self,
        state_id: &str,
        notify: &NotifyState,
        ctx: &ExecutionContext,
        token: &CancellationToken,
    ) -> Result<(), Interrupt<TaskError>> {
        let rendered = ctx.render(&notify.message);
        let body = rendered.as_str();
        let sink = &self.sink;

        let delivery: Result<Ack, _> = self
            .with_retry(state_id, notify.retry.as_ref(), token, move || async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Interrupt::Cancelled),
                    sent = sink.send(&notify.sink, &notify.subject, body) => sent.map_err(|e| {
                        Interrupt::Failed(TaskError::new(error_kind::NOTIFY_DELIVERY_FAILED, e.to_string()))
                    }),
                }
            })
            .await;

        match delivery {
            Ok(ack) => {
                tracing::info!(
                    state = state_id,
                    sink = %notify.sink,
                    message_id = ?ack.message_id,
                    "notification delivered"
                );
                Ok(())
            }
            Err(Interrupt::Cancelled) => Err(Interrupt::Cancelled),
            Err(Interrupt::Failed(err)) => {
                tracing::warn!(
                    state = state_id,
                    sink = %notify.sink,
                    error = %err.message,
                    "notification delivery failed"
                );
                self.publish(WorkflowEvent::NotificationFailed {
                    run_id: self.id,
                    state: state_id.to_string(),
                    sink: notify.sink.clone(),
                    error: err.message.clone(),
                });
                if self.limits.notify_failures_fatal {
                    Err(Interrupt::Failed(err))
                } else {
                    Ok(())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_types::error::DeliveryError;

    struct Echo;

    impl TaskExecutor for Echo {
        async fn execute(&self, _executor: &str, input: Value) -> Result<Value, TaskError> {
            Ok(json!({ "echo": input }))
        }
    }

    struct Quiet;

    impl NotificationSink for Quiet {
        async fn send(&self, _sink: &str, _subject: &str, _body: &str) -> Result<Ack, DeliveryError> {
            Ok(Ack::default())
        }
    }

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(Echo, Quiet, &EngineConfig::default())
    }

    #[tokio::test]
    async fn default_result_path_is_namespaced_by_state_id() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "startState": "Lookup",
            "states": {
                "Lookup": { "type": "task", "executor": "echo", "inputPath": "$.region", "next": "Done" },
                "Done": { "type": "succeed" }
            }
        }))
        .unwrap();

        let result = engine().run_definition(def, json!({ "region": "eu-west-1" })).await.unwrap();

        assert!(result.is_success());
        assert_eq!(
            result.context.snapshot(),
            json!({ "region": "eu-west-1", "Lookup": { "echo": "eu-west-1" } })
        );
    }

    #[tokio::test]
    async fn root_result_path_replaces_context() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "startState": "Lookup",
            "states": {
                "Lookup": { "type": "task", "executor": "echo", "resultPath": "$", "next": "Done" },
                "Done": { "type": "succeed" }
            }
        }))
        .unwrap();

        let result = engine().run_definition(def, json!({ "a": 1 })).await.unwrap();
        assert_eq!(result.context.snapshot(), json!({ "echo": { "a": 1 } }));
    }

    #[tokio::test]
    async fn invalid_definition_is_rejected_before_running() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "startState": "Nope",
            "states": { "Done": { "type": "succeed" } }
        }))
        .unwrap();
        assert!(engine().run_definition(def, Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn cancel_unknown_run_returns_false() {
        let engine = engine();
        assert!(!engine.cancel(Uuid::now_v7()));
        assert!(engine.active_runs().is_empty());
    }

    #[tokio::test]
    async fn execution_result_serializes_camel_case() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "startState": "Stop",
            "states": { "Stop": { "type": "fail", "errorKind": "Custom.Stop", "cause": "stopped" } }
        }))
        .unwrap();

        let result = engine().run_definition(def, Value::Null).await.unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], json!("failed"));
        assert_eq!(value["error"]["kind"], json!("Custom.Stop"));
        assert_eq!(value["error"]["message"], json!("stopped"));
        assert_eq!(value["error"]["path"], json!(["Stop"]));
        assert!(value.get("runId").is_some());
        assert!(value.get("finishedAt").is_some());
    }
}
