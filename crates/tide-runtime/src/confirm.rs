//! Confirmation seam for mutating tool calls.

use async_trait::async_trait;
use serde_json::Value;

/// What the user is asked to approve.
#[derive(Clone, Debug)]
pub struct ConfirmationRequest {
    /// Invocation id.
    pub tool_call_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

/// The user's answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmResponse {
    /// Run this call.
    Approve,
    /// Run this call and skip confirmation for this tool for the rest of the
    /// session.
    ApproveAlways,
    /// Do not run this call; optional guidance goes back to the model.
    Reject {
        /// Instructions from the user.
        guidance: Option<String>,
    },
    /// Stop the whole turn.
    Abort,
}

/// Asks the user about a mutating call. May be interactive and slow; the
/// dispatcher applies its own timeout.
#[async_trait]
pub trait ConfirmHandler: Send + Sync {
    /// Decide on one call.
    async fn confirm(&self, request: &ConfirmationRequest) -> ConfirmResponse;
}

/// Approves everything. Used by nested agents that only hold read-only tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoApprove;

#[async_trait]
impl ConfirmHandler for AutoApprove {
    async fn confirm(&self, _request: &ConfirmationRequest) -> ConfirmResponse {
        ConfirmResponse::Approve
    }
}

/// Standard content of a rejected call's result.
pub fn rejection_message(tool_name: &str, guidance: Option<&str>) -> String {
    let guidance = guidance
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or("User cancelled without additional instructions.");
    format!(
        "Tool '{tool_name}' execution cancelled before running.\n{guidance}\nDo not assume the operation succeeded; request updated guidance or offer alternatives."
    )
}
