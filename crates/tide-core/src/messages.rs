//! History entries and the tool calls inside them.
//!
//! A history is a flat list of [`Message`]s. Each call an assistant message
//! carries is answered by one later [`Message::ToolResult`] with its id.

use serde::{Deserialize, Serialize};

use crate::usage::TokenUsage;

// ─────────────────────────────────────────────────────────────────────────────
// Tool calls
// ─────────────────────────────────────────────────────────────────────────────

/// Call requested by the model.
///
/// `arguments` is kept exactly as streamed. Models sometimes concatenate
/// several JSON objects into it, or send something that is not JSON at all;
/// the runtime sorts that out at dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id.
    pub id: String,
    /// Requested tool.
    pub name: String,
    /// Argument text, unparsed.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    /// Call `name` with raw `arguments`.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the history. Serialized with a `role` tag and camelCase
/// field names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    /// Prompt typed by the user.
    User {
        /// The prompt.
        content: String,
        /// When it was recorded, RFC 3339.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// One model response.
    Assistant {
        /// Streamed text, possibly empty.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        text: String,
        /// Calls in the order the model emitted them.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        /// Tokens for the request that produced the response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
        /// Why the model stopped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
    /// Answer to one tool call.
    ToolResult {
        /// The call answered.
        tool_call_id: String,
        /// Tool that ran, or was refused.
        tool_name: String,
        /// Output shown to the model.
        content: String,
        /// `Some(true)` for failures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        /// When it was recorded, RFC 3339.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

fn now() -> Option<String> {
    Some(chrono::Utc::now().to_rfc3339())
}

impl Message {
    /// User prompt, timestamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            timestamp: now(),
        }
    }

    /// Assistant response without usage or stop reason.
    #[must_use]
    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls,
            usage: None,
            stop_reason: None,
        }
    }

    /// Tool result, timestamped now.
    #[must_use]
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: is_error.then_some(true),
            timestamp: now(),
        }
    }

    /// `User` variant.
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// `Assistant` variant.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// `ToolResult` variant.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Calls carried by an assistant message; empty for other roles.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Id of the call a tool result answers.
    #[must_use]
    pub fn answered_tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}
