//! # Tool Dispatcher
//!
//! Executes one response's tool calls.
//!
//! 1. **Prepare**: normalize names, recover argument objects, classify. A
//!    read-only call carrying several objects fans out into several calls.
//! 2. **Resolve up front**: calls with unrecoverable arguments or unknown
//!    tools get an error result without running.
//! 3. **Read-only batch**: runs concurrently, bounded by `max_parallel`.
//!    A read-only call that faults transiently is retried with backoff.
//! 4. **Mutating sequence**: one at a time in submission order, each behind
//!    the confirmation gate unless a policy rule allows it.
//!
//! Results come back in submission order whatever the completion order.
//! Every tool runs in its own task, so a panic or timeout becomes an error
//! result for that call and never touches its siblings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tide_core::messages::ToolCall;
use tide_core::retry::RetryConfig;
use tide_core::tools::{AgentToolResult, error_result};
use tide_llm::tool_parsing::parse_tool_arguments;
use tide_tools::errors::ToolError;
use tide_tools::registry::ToolRegistry;
use tide_tools::traits::{AgentTool, ToolContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::authorization::{AuthorizationPolicy, ToolTier};
use crate::confirm::{ConfirmHandler, ConfirmResponse, ConfirmationRequest, rejection_message};
use crate::errors::RuntimeError;
use crate::types::{CallStatus, DispatchedCall, PreparedCall};

/// Guidance given to calls skipped after an earlier rejection in fail-fast mode.
const FAIL_FAST_GUIDANCE: &str = "Skipped because an earlier tool call in this response was rejected.";

/// Dispatcher limits and modes.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running read-only calls.
    pub max_parallel: usize,
    /// Reject the remaining mutating calls once one is rejected.
    pub fail_fast: bool,
    /// Per-call execution limit.
    pub tool_timeout: Duration,
    /// Limit on waiting for a confirmation answer. Expiry counts as a rejection.
    pub confirmation_timeout: Option<Duration>,
    /// Attempts and backoff for read-only calls that fault. Mutating calls
    /// run once.
    pub read_only_retry: RetryConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            fail_fast: false,
            tool_timeout: Duration::from_secs(120),
            confirmation_timeout: None,
            read_only_retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 5_000,
                jitter_factor: 0.1,
                ..RetryConfig::default()
            },
        }
    }
}

/// Where the calls run.
#[derive(Clone, Debug)]
pub struct DispatchScope {
    /// Session the calls belong to.
    pub session_id: String,
    /// Working directory handed to tools.
    pub working_directory: String,
    /// Cancelling this stops every outstanding call.
    pub cancellation: CancellationToken,
}

/// Dispatch stopped early.
///
/// `completed` holds the calls that finished before the stop, in submission
/// order. Calls missing from it have no result.
#[derive(Debug)]
pub struct DispatchInterrupted {
    /// Why dispatch stopped.
    pub error: RuntimeError,
    /// Results produced before the stop.
    pub completed: Vec<DispatchedCall>,
}

/// Runs tool calls against a registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    config: DispatchConfig,
}

/// Trim a model-supplied tool name; an empty name becomes `unknown`.
pub fn normalize_tool_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Id of the `index`-th (zero-based) call fanned out of `base`.
fn fan_out_id(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}#{}", index + 1)
    }
}

enum Gate {
    Run,
    Reject(Option<String>),
    Abort,
    Cancelled,
}

/// How one execution of a tool ended.
enum Attempt {
    Finished(AgentToolResult),
    Faulted(ToolError),
    Cancelled,
}

/// Faults another attempt may clear. Bad arguments, a nested agent's
/// failure and cancellation stay as they are.
fn is_transient(error: &ToolError) -> bool {
    matches!(error, ToolError::Io(_) | ToolError::Internal { .. })
}

impl ToolDispatcher {
    /// Dispatcher over `registry`.
    pub fn new(registry: ToolRegistry, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Registry the dispatcher looks tools up in.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Prepare and execute in one step.
    pub async fn dispatch(
        &self,
        tool_calls: &[ToolCall],
        policy: &mut AuthorizationPolicy,
        confirm: &dyn ConfirmHandler,
        scope: &DispatchScope,
    ) -> Result<Vec<DispatchedCall>, DispatchInterrupted> {
        let prepared = self.prepare(tool_calls, policy);
        self.execute(prepared, policy, confirm, scope).await
    }

    /// Normalize, parse and classify the calls of one response.
    ///
    /// The returned calls are what the history should record: fanned-out
    /// calls appear individually with ids `{id}`, `{id}#2`, ...
    pub fn prepare(&self, tool_calls: &[ToolCall], policy: &AuthorizationPolicy) -> Vec<PreparedCall> {
        let mut prepared = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let name = normalize_tool_name(&call.name);
            let tier = ToolTier::of(&name);
            let decision = policy.classify(&name);

            match parse_tool_arguments(&call.arguments, Some(&name), |n| policy.is_read_only(n)) {
                Ok(objects) if objects.len() == 1 => {
                    let arguments = objects.into_iter().next().map(Value::Object).unwrap_or_default();
                    prepared.push(PreparedCall {
                        tool_call: ToolCall::new(call.id.clone(), name, call.arguments.clone()),
                        arguments: Ok(arguments),
                        tier,
                        decision,
                    });
                }
                Ok(objects) => {
                    info!(
                        tool_name = name,
                        tool_call_id = call.id,
                        count = objects.len(),
                        "fanning out concatenated read-only call"
                    );
                    for (index, object) in objects.into_iter().enumerate() {
                        let value = Value::Object(object);
                        prepared.push(PreparedCall {
                            tool_call: ToolCall::new(fan_out_id(&call.id, index), name.clone(), value.to_string()),
                            arguments: Ok(value),
                            tier,
                            decision,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        tool_name = name,
                        tool_call_id = call.id,
                        category = e.category(),
                        error = %e,
                        "tool arguments could not be recovered"
                    );
                    prepared.push(PreparedCall {
                        tool_call: ToolCall::new(call.id.clone(), name, call.arguments.clone()),
                        arguments: Err(e.to_string()),
                        tier,
                        decision,
                    });
                }
            }
        }
        prepared
    }

    /// Execute prepared calls; results are in the order of `calls`.
    #[instrument(skip_all, fields(session_id = %scope.session_id, calls = calls.len()))]
    pub async fn execute(
        &self,
        calls: Vec<PreparedCall>,
        policy: &mut AuthorizationPolicy,
        confirm: &dyn ConfirmHandler,
        scope: &DispatchScope,
    ) -> Result<Vec<DispatchedCall>, DispatchInterrupted> {
        let mut slots: Vec<Option<DispatchedCall>> = Vec::with_capacity(calls.len());
        let mut parallel = Vec::new();
        let mut sequential = Vec::new();

        for (index, call) in calls.into_iter().enumerate() {
            slots.push(None);
            match self.resolve(&call) {
                Err(immediate) => slots[index] = Some(immediate),
                Ok(tool) if call.decision.allow_concurrent_multi_object => parallel.push((index, call, tool)),
                Ok(tool) => sequential.push((index, call, tool)),
            }
        }

        if !parallel.is_empty() {
            let limit = self.config.max_parallel.max(1);
            debug!(count = parallel.len(), limit, "executing read-only batch");
            let mut runs = Vec::with_capacity(parallel.len());
            for (index, call, tool) in parallel {
                let run = self.run_call(call, tool, scope);
                runs.push(async move { (index, run.await) });
            }
            let finished: Vec<(usize, Option<DispatchedCall>)> =
                stream::iter(runs).buffer_unordered(limit).collect().await;

            for (index, outcome) in finished {
                slots[index] = outcome;
            }
            if scope.cancellation.is_cancelled() {
                return Err(interrupted(RuntimeError::Cancelled, slots));
            }
        }

        let mut halted = false;
        for (index, call, tool) in sequential {
            if scope.cancellation.is_cancelled() {
                return Err(interrupted(RuntimeError::Cancelled, slots));
            }
            if halted {
                slots[index] = Some(rejected(&call, Some(FAIL_FAST_GUIDANCE)));
                continue;
            }

            match self.gate(&call, policy, confirm, &scope.cancellation).await {
                Gate::Run => {}
                Gate::Reject(guidance) => {
                    info!(tool_name = call.name(), tool_call_id = call.id(), "tool call rejected");
                    slots[index] = Some(rejected(&call, guidance.as_deref()));
                    if self.config.fail_fast {
                        halted = true;
                    }
                    continue;
                }
                Gate::Abort => {
                    info!(tool_name = call.name(), tool_call_id = call.id(), "user aborted turn");
                    return Err(interrupted(RuntimeError::UserAbort, slots));
                }
                Gate::Cancelled => return Err(interrupted(RuntimeError::Cancelled, slots)),
            }

            match self.run_call(call, tool, scope).await {
                Some(done) => slots[index] = Some(done),
                None => return Err(interrupted(RuntimeError::Cancelled, slots)),
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Tool for a call, or the error result it gets without running.
    fn resolve(&self, call: &PreparedCall) -> Result<Arc<dyn AgentTool>, DispatchedCall> {
        if let Err(message) = &call.arguments {
            return Err(DispatchedCall::new(
                call,
                CallStatus::Failed,
                error_result(message.clone()),
                0,
            ));
        }
        self.registry.get(call.name()).ok_or_else(|| {
            error!(tool_name = call.name(), "tool not found");
            DispatchedCall::new(
                call,
                CallStatus::Failed,
                error_result(format!("Tool not found: {}", call.name())),
                0,
            )
        })
    }

    /// Confirmation gate for a mutating call.
    async fn gate(
        &self,
        call: &PreparedCall,
        policy: &mut AuthorizationPolicy,
        confirm: &dyn ConfirmHandler,
        cancel: &CancellationToken,
    ) -> Gate {
        // grants made earlier in this response already apply
        if let Some(rule) = policy.allowing_rule(call.name()) {
            debug!(tool_name = call.name(), rule = rule.name(), "confirmation skipped");
            return Gate::Run;
        }

        let request = ConfirmationRequest {
            tool_call_id: call.id().to_string(),
            tool_name: call.name().to_string(),
            arguments: call.arguments.clone().unwrap_or_default(),
        };
        let answer = async {
            match self.config.confirmation_timeout {
                Some(limit) => tokio::time::timeout(limit, confirm.confirm(&request))
                    .await
                    .unwrap_or_else(|_| {
                        warn!(tool_name = call.name(), "confirmation timed out");
                        ConfirmResponse::Reject {
                            guidance: Some(format!(
                                "No confirmation was received within {}ms.",
                                limit.as_millis()
                            )),
                        }
                    }),
                None => confirm.confirm(&request).await,
            }
        };

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Gate::Cancelled,
            response = answer => response,
        };

        match response {
            ConfirmResponse::Approve => Gate::Run,
            ConfirmResponse::ApproveAlways => {
                policy.grant_always(call.name());
                Gate::Run
            }
            ConfirmResponse::Reject { guidance } => Gate::Reject(guidance),
            ConfirmResponse::Abort => Gate::Abort,
        }
    }

    /// Run one call, retrying transient faults of read-only calls. `None`
    /// means it was cancelled before producing a result.
    #[instrument(skip_all, fields(tool_name = call.name(), tool_call_id = call.id()))]
    async fn run_call(
        &self,
        call: PreparedCall,
        tool: Arc<dyn AgentTool>,
        scope: &DispatchScope,
    ) -> Option<DispatchedCall> {
        let start = Instant::now();
        let cancel = scope.cancellation.child_token();
        let ctx = ToolContext {
            tool_call_id: call.id().to_string(),
            session_id: scope.session_id.clone(),
            working_directory: scope.working_directory.clone(),
            cancellation: cancel.clone(),
        };
        let retry = &self.config.read_only_retry;
        let max_attempts = if call.decision.allow_concurrent_multi_object {
            retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        let result = loop {
            let error = match self.attempt(&call, &tool, &ctx).await {
                Attempt::Cancelled => return None,
                Attempt::Finished(result) => break result,
                Attempt::Faulted(error) => error,
            };
            attempt += 1;
            if attempt >= max_attempts || !is_transient(&error) {
                warn!(category = error.category(), error = %error, attempts = attempt, "tool failed");
                break error_result(error.to_string());
            }

            let delay_ms = retry.backoff_ms(attempt - 1, rand::random::<f64>());
            warn!(
                category = error.category(),
                error = %error,
                attempt,
                max_attempts,
                delay_ms,
                "tool failed, retrying"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("tool cancelled during retry backoff");
                    return None;
                }
                () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
        };

        if attempt > 0 && !result.is_error() {
            info!(attempts = attempt + 1, "tool succeeded after retry");
        }
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(duration_ms, is_error = result.is_error(), "tool finished");
        Some(DispatchedCall::from_result(&call, result, duration_ms))
    }

    /// One execution in its own task, bounded by the tool timeout. Timeouts
    /// and panics come back as error results.
    async fn attempt(&self, call: &PreparedCall, tool: &Arc<dyn AgentTool>, ctx: &ToolContext) -> Attempt {
        let params = call.arguments.clone().unwrap_or_default();
        let limit = self.config.tool_timeout;
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);

        let tool = Arc::clone(tool);
        let ctx = ctx.clone();
        let cancel = ctx.cancellation.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = task_cancel.cancelled() => None,
                outcome = tokio::time::timeout(limit, tool.execute(params, &ctx)) => Some(outcome),
            }
        });

        match handle.await {
            Ok(None) => {
                debug!("tool cancelled");
                Attempt::Cancelled
            }
            Ok(Some(Ok(Ok(result)))) => Attempt::Finished(result),
            Ok(Some(Ok(Err(ToolError::Cancelled)))) if cancel.is_cancelled() => {
                debug!("tool observed cancellation");
                Attempt::Cancelled
            }
            Ok(Some(Ok(Err(error)))) => Attempt::Faulted(error),
            Ok(Some(Err(_))) => {
                warn!(timeout_ms = limit_ms, "tool timed out");
                Attempt::Finished(error_result(format!("Tool '{}' timed out after {limit_ms}ms", call.name())))
            }
            Err(join_error) => {
                error!(error = %join_error, "tool task failed");
                Attempt::Finished(error_result(format!(
                    "Tool '{}' failed unexpectedly: {join_error}",
                    call.name()
                )))
            }
        }
    }
}

fn rejected(call: &PreparedCall, guidance: Option<&str>) -> DispatchedCall {
    let result = error_result(rejection_message(call.name(), guidance)).with_details(json!({ "rejected": true }));
    DispatchedCall::new(call, CallStatus::Rejected, result, 0)
}

fn interrupted(error: RuntimeError, slots: Vec<Option<DispatchedCall>>) -> DispatchInterrupted {
    DispatchInterrupted {
        error,
        completed: slots.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tide_core::tools::{Tool, ToolCategory, ToolParameterSchema, text_result};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Sleeps for `delay_ms` (from arguments) and echoes `path`.
    struct SleepyTool {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl AgentTool for SleepyTool {
        fn name(&self) -> &str {
            self.name
        }
        fn category(&self) -> ToolCategory {
            ToolCategory::Filesystem
        }
        fn definition(&self) -> Tool {
            Tool {
                name: self.name.into(),
                description: "test".into(),
                parameters: ToolParameterSchema::object(vec![], &[]),
            }
        }
        async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
            let path = params["path"].as_str().unwrap_or("?").to_string();
            self.log.lock().push(format!("start {path}"));
            let delay = params["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.log.lock().push(format!("end {path}"));
            match params["fail"].as_str() {
                Some("error") => Err(ToolError::Validation {
                    message: format!("cannot handle {path}"),
                }),
                Some("panic") => panic!("tool blew up"),
                Some("flaky") => {
                    let started = format!("start {path}");
                    let attempts = self.log.lock().iter().filter(|e| **e == started).count();
                    if attempts as u64 <= params["fail_times"].as_u64().unwrap_or(0) {
                        Err(ToolError::Io(std::io::Error::other("connection reset")))
                    } else {
                        Ok(text_result(format!("{} {path}", self.name), false))
                    }
                }
                _ => Ok(text_result(format!("{} {path}", self.name), false)),
            }
        }
    }

    struct ScriptedConfirm {
        answers: Mutex<VecDeque<ConfirmResponse>>,
        log: Log,
    }

    impl ScriptedConfirm {
        fn new(answers: Vec<ConfirmResponse>, log: Log) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                log,
            }
        }
    }

    #[async_trait]
    impl ConfirmHandler for ScriptedConfirm {
        async fn confirm(&self, request: &ConfirmationRequest) -> ConfirmResponse {
            self.log.lock().push(format!("confirm {}", request.tool_call_id));
            self.answers.lock().pop_front().unwrap_or(ConfirmResponse::Approve)
        }
    }

    struct NeverAnswers;

    #[async_trait]
    impl ConfirmHandler for NeverAnswers {
        async fn confirm(&self, _request: &ConfirmationRequest) -> ConfirmResponse {
            std::future::pending().await
        }
    }

    fn setup(config: DispatchConfig) -> (ToolDispatcher, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        for name in ["read_file", "grep", "write_file", "bash"] {
            registry.register(Arc::new(SleepyTool { name, log: log.clone() }));
        }
        (ToolDispatcher::new(registry, config), log)
    }

    fn scope() -> DispatchScope {
        DispatchScope {
            session_id: "sess".into(),
            working_directory: "/tmp".into(),
            cancellation: CancellationToken::new(),
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall::new(id, name, args.to_string())
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter().position(|e| e == entry).unwrap_or_else(|| panic!("{entry} missing from {log:?}"))
    }

    #[tokio::test(start_paused = true)]
    async fn read_batch_runs_concurrently_then_write_after_confirmation() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(vec![ConfirmResponse::Approve], log.clone());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("r1", "read_file", json!({"path": "a", "delay_ms": 50})),
            call("r2", "read_file", json!({"path": "b", "delay_ms": 10})),
            call("w1", "write_file", json!({"path": "c"})),
        ];

        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "w1"]);
        assert_eq!(results[0].result.content, "read_file a");
        assert_eq!(results[2].result.content, "write_file c");
        assert!(results.iter().all(|r| r.status == CallStatus::Succeeded));

        let log = log.lock().clone();
        // both reads started before either finished
        assert!(position(&log, "start a") < position(&log, "end b"));
        assert!(position(&log, "start b") < position(&log, "end b"));
        // b finished first, a still comes first in the output
        assert!(position(&log, "end b") < position(&log, "end a"));
        // the write waits for the batch and for its confirmation
        assert!(position(&log, "end a") < position(&log, "confirm w1"));
        assert!(position(&log, "confirm w1") < position(&log, "start c"));
    }

    #[tokio::test(start_paused = true)]
    async fn order_matches_input_for_every_delay_pattern() {
        let (dispatcher, _log) = setup(DispatchConfig {
            max_parallel: 2,
            ..DispatchConfig::default()
        });
        for delays in [[30u64, 20, 10, 0], [0, 10, 20, 30], [15, 0, 30, 5]] {
            let calls: Vec<ToolCall> = delays
                .iter()
                .enumerate()
                .map(|(i, d)| call(&format!("c{i}"), "grep", json!({"path": i.to_string(), "delay_ms": d})))
                .collect();
            let mut policy = AuthorizationPolicy::default();
            let results = dispatcher
                .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
                .await
                .unwrap();
            let ids: Vec<String> = results.into_iter().map(|r| r.tool_call_id).collect();
            assert_eq!(ids, vec!["c0", "c1", "c2", "c3"]);
        }
    }

    #[tokio::test]
    async fn failures_and_panics_become_error_results() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("a", "read_file", json!({"path": "a", "fail": "error"})),
            call("b", "read_file", json!({"path": "b", "fail": "panic"})),
            call("c", "read_file", json!({"path": "c"})),
        ];
        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, CallStatus::Failed);
        assert!(results[0].result.content.contains("cannot handle a"));
        assert_eq!(results[1].status, CallStatus::Failed);
        assert!(results[1].result.content.contains("failed unexpectedly"));
        assert_eq!(results[2].status, CallStatus::Succeeded);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn dispatch_future_can_cross_threads() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("a", "read_file", json!({"path": "a"})),
            call("b", "grep", json!({"path": "b"})),
        ];
        let scope = scope();
        let pending = dispatcher.dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope);
        assert_send(&pending);
        assert_eq!(pending.await.unwrap().len(), 2);
    }

    fn retrying(max_attempts: u32) -> DispatchConfig {
        DispatchConfig {
            read_only_retry: RetryConfig {
                max_attempts,
                base_delay_ms: 500,
                max_delay_ms: 5_000,
                jitter_factor: 0.0,
                ..RetryConfig::default()
            },
            ..DispatchConfig::default()
        }
    }

    fn starts(log: &Log, path: &str) -> usize {
        let started = format!("start {path}");
        log.lock().iter().filter(|e| **e == started).count()
    }

    #[tokio::test(start_paused = true)]
    async fn transient_read_only_fault_is_retried_with_backoff() {
        let (dispatcher, log) = setup(retrying(3));
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![call("r", "read_file", json!({"path": "a", "fail": "flaky", "fail_times": 2}))];

        let began = tokio::time::Instant::now();
        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();

        assert_eq!(results[0].status, CallStatus::Succeeded);
        assert_eq!(results[0].result.content, "read_file a");
        assert_eq!(starts(&log, "a"), 3);
        // 500ms then 1000ms of backoff
        let waited = began.elapsed();
        assert!(waited >= Duration::from_millis(1_500), "{waited:?}");
        assert!(waited < Duration::from_millis(1_600), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_at_the_attempt_limit() {
        let (dispatcher, log) = setup(retrying(3));
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![call("r", "grep", json!({"path": "a", "fail": "flaky", "fail_times": 10}))];

        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();

        assert_eq!(results[0].status, CallStatus::Failed);
        assert!(results[0].result.content.contains("connection reset"));
        assert_eq!(starts(&log, "a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn mutating_and_invalid_calls_are_not_retried() {
        let (dispatcher, log) = setup(retrying(3));
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("v", "read_file", json!({"path": "v", "fail": "error"})),
            call("w", "write_file", json!({"path": "w", "fail": "flaky", "fail_times": 1})),
        ];

        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();

        assert_eq!(results[0].status, CallStatus::Failed);
        assert_eq!(starts(&log, "v"), 1);
        assert_eq!(results[1].status, CallStatus::Failed);
        assert!(results[1].result.content.contains("connection reset"));
        assert_eq!(starts(&log, "w"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_yields_no_result() {
        let (dispatcher, _log) = setup(retrying(3));
        let mut policy = AuthorizationPolicy::default();
        let scope = scope();
        let calls = vec![call("r", "read_file", json!({"path": "a", "fail": "flaky", "fail_times": 5}))];

        let token = scope.cancellation.clone();
        let _canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
        let err = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope)
            .await
            .unwrap_err();

        assert_matches!(err.error, RuntimeError::Cancelled);
        assert!(err.completed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let (dispatcher, _log) = setup(DispatchConfig {
            tool_timeout: Duration::from_millis(100),
            ..DispatchConfig::default()
        });
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![call("a", "grep", json!({"path": "a", "delay_ms": 5_000}))];
        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();
        assert_eq!(results[0].result.content, "Tool 'grep' timed out after 100ms");
    }

    #[tokio::test]
    async fn unknown_tool_and_blank_name() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![call("a", "  delete_everything ", json!({})), call("b", "   ", json!({}))];
        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();
        assert_eq!(results[0].result.content, "Tool not found: delete_everything");
        assert_eq!(results[1].tool_name, "unknown");
        assert_eq!(results[1].result.content, "Tool not found: unknown");
    }

    #[test]
    fn concatenated_read_only_call_fans_out() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let policy = AuthorizationPolicy::default();
        let calls = vec![ToolCall::new("c1", "read_file", r#"{"path":"a.py"}{"path":"b.py"}"#)];
        let prepared = dispatcher.prepare(&calls, &policy);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].id(), "c1");
        assert_eq!(prepared[1].id(), "c1#2");
        assert_eq!(prepared[0].arguments.as_ref().unwrap(), &json!({"path": "a.py"}));
        assert_eq!(prepared[1].tool_call.arguments, r#"{"path":"b.py"}"#);
    }

    #[tokio::test]
    async fn concatenated_mutating_call_is_an_error_result() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(vec![], log.clone());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![ToolCall::new("w", "write_file", r#"{"path":"a.py"}{"path":"b.py"}"#)];
        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CallStatus::Failed);
        assert!(results[0].result.content.contains("2 concatenated JSON objects"));
        // never reached the confirmation gate
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn garbage_arguments_are_an_error_result() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![ToolCall::new("g", "grep", "not json at all")];
        let results = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope())
            .await
            .unwrap();
        assert!(results[0].result.content.starts_with("Invalid tool arguments"));
        assert!(results[0].arguments.is_none());
    }

    #[tokio::test]
    async fn rejection_continues_without_fail_fast() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(
            vec![
                ConfirmResponse::Reject {
                    guidance: Some("not that file".into()),
                },
                ConfirmResponse::Approve,
            ],
            log.clone(),
        );
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("w1", "write_file", json!({"path": "x"})),
            call("w2", "write_file", json!({"path": "y"})),
        ];
        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();
        assert_eq!(results[0].status, CallStatus::Rejected);
        assert!(results[0].result.content.contains("not that file"));
        assert_eq!(results[1].status, CallStatus::Succeeded);
    }

    #[tokio::test]
    async fn fail_fast_rejects_the_remainder() {
        let (dispatcher, log) = setup(DispatchConfig {
            fail_fast: true,
            ..DispatchConfig::default()
        });
        let confirm = ScriptedConfirm::new(vec![ConfirmResponse::Reject { guidance: None }], log.clone());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("w1", "write_file", json!({"path": "x"})),
            call("b1", "bash", json!({"path": "y"})),
        ];
        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == CallStatus::Rejected));
        assert!(results[1].result.content.contains(FAIL_FAST_GUIDANCE));
        assert_eq!(log.lock().as_slice(), ["confirm w1"]);
    }

    #[tokio::test]
    async fn approve_always_skips_later_prompts() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(vec![ConfirmResponse::ApproveAlways], log.clone());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("w1", "write_file", json!({"path": "x"})),
            call("w2", "write_file", json!({"path": "y"})),
        ];
        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();
        assert!(results.iter().all(|r| r.status == CallStatus::Succeeded));
        let confirms = log.lock().iter().filter(|e| e.starts_with("confirm")).count();
        assert_eq!(confirms, 1);
        assert!(!policy.classify("write_file").requires_confirmation);
    }

    #[tokio::test]
    async fn abort_returns_completed_results() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(vec![ConfirmResponse::Abort], log.clone());
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![
            call("r1", "read_file", json!({"path": "a"})),
            call("w1", "write_file", json!({"path": "x"})),
            call("w2", "write_file", json!({"path": "y"})),
        ];
        let interrupted = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap_err();
        assert_matches!(interrupted.error, RuntimeError::UserAbort);
        let ids: Vec<&str> = interrupted.completed.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["r1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_counts_as_rejection() {
        let (dispatcher, _log) = setup(DispatchConfig {
            confirmation_timeout: Some(Duration::from_millis(500)),
            ..DispatchConfig::default()
        });
        let mut policy = AuthorizationPolicy::default();
        let calls = vec![call("w1", "write_file", json!({"path": "x"}))];
        let results = dispatcher.dispatch(&calls, &mut policy, &NeverAnswers, &scope()).await.unwrap();
        assert_eq!(results[0].status, CallStatus::Rejected);
        assert!(results[0].result.content.contains("within 500ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_batch_drops_unfinished_calls() {
        let (dispatcher, _log) = setup(DispatchConfig::default());
        let mut policy = AuthorizationPolicy::default();
        let scope = scope();
        let token = scope.cancellation.clone();
        let _canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let calls = vec![
            call("fast", "grep", json!({"path": "a", "delay_ms": 5})),
            call("slow", "grep", json!({"path": "b", "delay_ms": 10_000})),
            call("w", "write_file", json!({"path": "c"})),
        ];
        let interrupted = dispatcher
            .dispatch(&calls, &mut policy, &crate::confirm::AutoApprove, &scope)
            .await
            .unwrap_err();
        assert_matches!(interrupted.error, RuntimeError::Cancelled);
        let ids: Vec<&str> = interrupted.completed.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["fast"]);
    }

    #[tokio::test]
    async fn yolo_never_prompts() {
        let (dispatcher, log) = setup(DispatchConfig::default());
        let confirm = ScriptedConfirm::new(vec![ConfirmResponse::Abort], log.clone());
        let mut policy = AuthorizationPolicy::new(Vec::new(), true);
        let calls = vec![call("b", "bash", json!({"path": "ls"}))];
        let results = dispatcher.dispatch(&calls, &mut policy, &confirm, &scope()).await.unwrap();
        assert_eq!(results[0].status, CallStatus::Succeeded);
        assert!(!log.lock().iter().any(|e| e.starts_with("confirm")));
    }
}
