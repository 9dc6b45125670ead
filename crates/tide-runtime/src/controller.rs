//! # Turn Controller
//!
//! Composes the stream processor, dispatcher, recorder and completion
//! detector into the turn loop:
//!
//! 1. `ASSISTANT`: request a response (the transport retries beneath this)
//! 2. decide CONTINUE / COMPLETE / TRUNCATED
//! 3. `TOOL_EXECUTION`: dispatch the calls and record their results
//! 4. `RESPONSE`: loop back to 1 or stop
//!
//! The controller is the only writer of the session during a turn. Any
//! error, including cancellation, abort and the global timeout, runs the
//! history cleanup before it is returned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tide_core::retry::RetryConfig;
use tide_llm::provider::{Provider, ProviderRequest};
use tide_settings::TideSettings;
use tide_tools::registry::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::authorization::AuthorizationPolicy;
use crate::cleanup::run_cleanup;
use crate::completion::{CompletionDecision, CompletionDetector};
use crate::confirm::ConfirmHandler;
use crate::dispatcher::{DispatchConfig, DispatchScope, ToolDispatcher};
use crate::errors::RuntimeError;
use crate::prompts::{CORE_PROMPT, build_system_prompt};
use crate::recorder::{record_request, record_response, record_tool_result, update_usage};
use crate::session::SessionState;
use crate::state::TurnState;
use crate::stream_processor::{TextSink, process_stream};
use crate::types::{DispatchedCall, StreamResult, TurnOutcome};

/// Per-turn limits and request parameters.
#[derive(Clone, Debug)]
pub struct TurnConfig {
    /// Model requests allowed per turn.
    pub max_iterations: u32,
    /// Global limit on one turn.
    pub turn_timeout: Option<Duration>,
    /// System prompt sent with every request.
    pub system_prompt: Option<String>,
    /// Maximum tokens per response.
    pub max_tokens: Option<u32>,
    /// Working directory handed to tools.
    pub working_directory: String,
    /// Marker recognized by the completion detector.
    pub completion_marker: String,
    /// Dispatcher limits.
    pub dispatch: DispatchConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            turn_timeout: None,
            system_prompt: None,
            max_tokens: None,
            working_directory: ".".to_string(),
            completion_marker: "TIDE DONE:".to_string(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl TurnConfig {
    /// Configuration from loaded settings.
    pub fn from_settings(settings: &TideSettings, working_directory: impl Into<String>) -> Self {
        let agent = &settings.agent;
        let working_directory = working_directory.into();
        Self {
            max_iterations: agent.max_iterations,
            turn_timeout: agent.turn_timeout_ms.map(Duration::from_millis),
            system_prompt: Some(build_system_prompt(
                CORE_PROMPT,
                &working_directory,
                &agent.completion_marker,
            )),
            max_tokens: settings.provider.max_tokens,
            working_directory,
            completion_marker: agent.completion_marker.clone(),
            dispatch: DispatchConfig {
                max_parallel: agent.max_parallel_tools,
                fail_fast: agent.fail_fast,
                tool_timeout: Duration::from_millis(agent.tool_timeout_ms),
                confirmation_timeout: agent.confirmation_timeout_ms.map(Duration::from_millis),
                read_only_retry: RetryConfig {
                    max_attempts: agent.tool_max_attempts,
                    base_delay_ms: agent.tool_retry_delay_ms,
                    ..DispatchConfig::default().read_only_retry
                },
            },
        }
    }
}

/// Drives turns for one session at a time.
pub struct TurnController {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    policy: AuthorizationPolicy,
    detector: CompletionDetector,
    confirm: Arc<dyn ConfirmHandler>,
    config: TurnConfig,
    cancel: CancellationToken,
    in_flight: HashSet<String>,
    text_sink: Option<TextSink>,
    last_iterations: u32,
}

impl TurnController {
    /// Controller over `registry`, asking `confirm` about gated calls.
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        policy: AuthorizationPolicy,
        confirm: Arc<dyn ConfirmHandler>,
        config: TurnConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher: ToolDispatcher::new(registry, config.dispatch.clone()),
            policy,
            detector: CompletionDetector::new(config.completion_marker.clone()),
            confirm,
            config,
            cancel: CancellationToken::new(),
            in_flight: HashSet::new(),
            text_sink: None,
            last_iterations: 0,
        }
    }

    /// Derive turn cancellation from `token`.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Forward streamed text deltas to `sink`.
    #[must_use]
    pub fn with_text_sink(mut self, sink: TextSink) -> Self {
        self.text_sink = Some(sink);
        self
    }

    /// Token that cancels the running turn (and every later one until reset).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace a spent cancellation token with a fresh one.
    pub fn reset_cancellation(&mut self) -> CancellationToken {
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    /// Authorization state, including session grants.
    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Active configuration.
    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Model requests made by the last turn.
    pub fn last_iterations(&self) -> u32 {
        self.last_iterations
    }

    /// Tool calls recorded in history but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one user turn to completion, truncation, the iteration cap, or an
    /// error.
    #[instrument(skip_all, fields(session_id = %session.session_id(), model = self.provider.model()))]
    pub async fn process_turn(
        &mut self,
        session: &mut SessionState,
        user_message: &str,
    ) -> Result<TurnOutcome, RuntimeError> {
        let cancel = self.cancel.child_token();
        self.last_iterations = 0;
        session.turn_mut().reset();
        record_request(session, user_message);
        // an earlier turn, possibly in another process, may have stopped mid-response
        let _ = run_cleanup(session);
        info!(messages = session.messages().len(), "turn started");

        let result = match self.config.turn_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run_loop(session, &cancel)).await {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(RuntimeError::Timeout {
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }
            },
            None => self.run_loop(session, &cancel).await,
        };

        match &result {
            Ok(outcome) => info!(%outcome, iterations = self.last_iterations, "turn finished"),
            Err(err) => {
                warn!(category = err.category(), error = %err, "turn ended with error");
                self.clean_up(session);
            }
        }
        result
    }

    async fn run_loop(
        &mut self,
        session: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, RuntimeError> {
        let scope = DispatchScope {
            session_id: session.session_id().to_string(),
            working_directory: self.config.working_directory.clone(),
            cancellation: cancel.clone(),
        };

        loop {
            if self.last_iterations >= self.config.max_iterations {
                warn!(max_iterations = self.config.max_iterations, "iteration cap reached");
                return Ok(TurnOutcome::CapReached);
            }
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }
            self.last_iterations += 1;
            let iteration = self.last_iterations;

            session.turn_mut().transition_to(TurnState::Assistant)?;
            let streamed = self.request_response(session, cancel).await?;
            let _ = update_usage(session, &streamed.usage.clone().unwrap_or_default(), self.provider.model());

            let decision = self.detector.decide(
                &streamed.text,
                !streamed.tool_calls.is_empty(),
                streamed.truncated,
            );
            debug!(iteration, ?decision, tool_calls = streamed.tool_calls.len(), "response received");

            match decision {
                CompletionDecision::Truncated => {
                    if !streamed.tool_calls.is_empty() {
                        warn!(dropped = streamed.tool_calls.len(), "dropping tool calls of truncated response");
                    }
                    let stop_reason = streamed.stop_reason.unwrap_or_else(|| "truncated".to_string());
                    record_response(session, streamed.text, Vec::new(), streamed.usage, Some(stop_reason));
                    session.turn_mut().transition_to(TurnState::Response)?;
                    return Ok(TurnOutcome::Truncated);
                }
                CompletionDecision::Complete => {
                    let marker = self.detector.has_marker(&streamed.text);
                    record_response(session, streamed.text, Vec::new(), streamed.usage, streamed.stop_reason);
                    let turn = session.turn_mut();
                    turn.transition_to(TurnState::Response)?;
                    turn.set_completion_detected(true);
                    debug!(marker, "completion detected");
                    return Ok(TurnOutcome::Complete);
                }
                CompletionDecision::Continue => {
                    let prepared = self.dispatcher.prepare(&streamed.tool_calls, &self.policy);
                    let recorded = prepared.iter().map(|call| call.tool_call.clone()).collect();
                    record_response(session, streamed.text, recorded, streamed.usage, streamed.stop_reason);
                    self.in_flight
                        .extend(prepared.iter().map(|call| call.tool_call.id.clone()));

                    session.turn_mut().transition_to(TurnState::ToolExecution)?;
                    let dispatched = self
                        .dispatcher
                        .execute(prepared, &mut self.policy, self.confirm.as_ref(), &scope)
                        .await;
                    match dispatched {
                        Ok(results) => self.record_results(session, &results),
                        Err(interrupted) => {
                            self.record_results(session, &interrupted.completed);
                            return Err(interrupted.error);
                        }
                    }
                    session.turn_mut().transition_to(TurnState::Response)?;
                }
            }
        }
    }

    async fn request_response(
        &self,
        session: &SessionState,
        cancel: &CancellationToken,
    ) -> Result<StreamResult, RuntimeError> {
        let request = ProviderRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: session.messages().to_vec(),
            tools: self.dispatcher.registry().definitions(),
            max_tokens: self.config.max_tokens,
            temperature: None,
        };
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "requesting model response"
        );

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = self.provider.stream(&request) => result?,
        };
        process_stream(stream, cancel, self.text_sink.as_ref()).await
    }

    fn record_results(&mut self, session: &mut SessionState, results: &[DispatchedCall]) {
        for call in results {
            record_tool_result(session, call);
            let _ = self.in_flight.remove(&call.tool_call_id);
        }
    }

    fn clean_up(&mut self, session: &mut SessionState) {
        let report = run_cleanup(session);
        for id in &report.removed_tool_calls {
            let _ = self.in_flight.remove(id);
        }
        if !self.in_flight.is_empty() {
            debug!(stale = self.in_flight.len(), "clearing in-flight registry");
            self.in_flight.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings() {
        let mut settings = TideSettings::default();
        settings.agent.max_iterations = 7;
        settings.agent.fail_fast = true;
        settings.agent.confirmation_timeout_ms = Some(2_000);
        settings.agent.turn_timeout_ms = Some(60_000);
        settings.agent.max_parallel_tools = 3;
        settings.agent.tool_max_attempts = 5;
        settings.agent.tool_retry_delay_ms = 50;

        let config = TurnConfig::from_settings(&settings, "/work");
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.turn_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.working_directory, "/work");
        assert!(config.dispatch.fail_fast);
        assert_eq!(config.dispatch.max_parallel, 3);
        assert_eq!(config.dispatch.confirmation_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.dispatch.read_only_retry.max_attempts, 5);
        assert_eq!(config.dispatch.read_only_retry.base_delay_ms, 50);
        assert_eq!(config.dispatch.read_only_retry.max_delay_ms, 5_000);
        assert!(config
            .system_prompt
            .as_deref()
            .is_some_and(|p| p.contains("Current working directory: /work")));
    }
}
