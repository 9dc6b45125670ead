//! Runtime types shared by the dispatcher and the controller.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tide_core::messages::ToolCall;
use tide_core::tools::AgentToolResult;
use tide_core::usage::TokenUsage;

use crate::authorization::{AuthorizationDecision, ToolTier};

/// How a turn ended when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The model answered without calling tools.
    Complete,
    /// The model's response was cut off.
    Truncated,
    /// The iteration cap was hit while the model still wanted tools.
    CapReached,
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Truncated => write!(f, "truncated"),
            Self::CapReached => write!(f, "cap_reached"),
        }
    }
}

/// Accumulated result of one provider stream.
#[derive(Clone, Debug, Default)]
pub struct StreamResult {
    /// Concatenated text deltas.
    pub text: String,
    /// Tool calls completed by the stream, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Provider stop reason from the final event.
    pub stop_reason: Option<String>,
    /// Usage reported by the provider.
    pub usage: Option<TokenUsage>,
    /// Ended without `Done`, or stopped on the token limit.
    pub truncated: bool,
}

/// A tool call after name normalization, argument recovery and
/// classification, ready for dispatch.
#[derive(Clone, Debug)]
pub struct PreparedCall {
    /// The call as it is recorded in history. A fanned-out call carries its
    /// own id and its single argument object.
    pub tool_call: ToolCall,
    /// Parsed arguments, or the message explaining why they could not be
    /// recovered.
    pub arguments: Result<Value, String>,
    /// Base-table tier.
    pub tier: ToolTier,
    /// Decision at preparation time.
    pub decision: AuthorizationDecision,
}

impl PreparedCall {
    /// Invocation id.
    pub fn id(&self) -> &str {
        &self.tool_call.id
    }

    /// Normalized tool name.
    pub fn name(&self) -> &str {
        &self.tool_call.name
    }
}

/// Terminal status of a dispatched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Ran and reported success.
    Succeeded,
    /// Ran (or could not run) and reported an error.
    Failed,
    /// Not run because the user declined it.
    Rejected,
}

/// A prepared call paired with its result.
#[derive(Clone, Debug)]
pub struct DispatchedCall {
    /// Invocation id.
    pub tool_call_id: String,
    /// Normalized tool name.
    pub tool_name: String,
    /// Parsed arguments, when recovery succeeded.
    pub arguments: Option<Value>,
    /// Base-table tier.
    pub tier: ToolTier,
    /// Terminal status.
    pub status: CallStatus,
    /// What goes back to the model.
    pub result: AgentToolResult,
    /// Wall-clock execution time; zero for calls that never ran.
    pub duration_ms: u64,
}

impl DispatchedCall {
    pub(crate) fn new(call: &PreparedCall, status: CallStatus, result: AgentToolResult, duration_ms: u64) -> Self {
        Self {
            tool_call_id: call.tool_call.id.clone(),
            tool_name: call.tool_call.name.clone(),
            arguments: call.arguments.as_ref().ok().cloned(),
            tier: call.tier,
            status,
            result,
            duration_ms,
        }
    }

    /// Status derived from the result's error flag.
    pub(crate) fn from_result(call: &PreparedCall, result: AgentToolResult, duration_ms: u64) -> Self {
        let status = if result.is_error() {
            CallStatus::Failed
        } else {
            CallStatus::Succeeded
        };
        Self::new(call, status, result, duration_ms)
    }
}
