//! Message recorder and usage tracker.
//!
//! Append-only: every function adds one entry to the session and leaves
//! earlier entries untouched.

use tide_core::messages::{Message, ToolCall};
use tide_core::usage::{TokenUsage, UsageMetrics};
use tide_llm::pricing::calculate_cost;
use tracing::debug;

use crate::session::SessionState;
use crate::types::DispatchedCall;

/// Append the user's message.
pub fn record_request(session: &mut SessionState, content: impl Into<String>) {
    session.push(Message::user(content));
}

/// Append the assistant's response with the tool calls it requested.
pub fn record_response(
    session: &mut SessionState,
    text: impl Into<String>,
    tool_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
    stop_reason: Option<String>,
) {
    session.push(Message::Assistant {
        text: text.into(),
        tool_calls,
        usage,
        stop_reason,
    });
}

/// Append the result answering one tool call.
pub fn record_tool_result(session: &mut SessionState, call: &DispatchedCall) {
    session.push(Message::tool_result(
        call.tool_call_id.clone(),
        call.tool_name.clone(),
        call.result.content.clone(),
        call.result.is_error(),
    ));
}

/// Replace the last-call figures with `delta` and add it to the session
/// totals. Missing fields count as zero; the cost comes from the model's
/// pricing tier.
pub fn update_usage(session: &mut SessionState, delta: &TokenUsage, model: &str) -> UsageMetrics {
    let call = UsageMetrics::from_delta(delta, calculate_cost(model, delta));
    session.usage_mut().apply(call);
    debug!(
        model,
        prompt_tokens = call.prompt_tokens,
        completion_tokens = call.completion_tokens,
        cost = call.cost,
        "usage updated"
    );
    call
}
