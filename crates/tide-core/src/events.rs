//! Streaming protocol shared by providers and the runtime.

use serde::{Deserialize, Serialize};

use crate::messages::ToolCall;
use crate::usage::TokenUsage;

/// Piece of a single-pass model response.
///
/// Streams are expected to finish with [`StreamEvent::Done`]; one that ends
/// earlier was cut off and the runtime treats it as truncated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// First event of a response.
    Start,

    /// Assistant text, appended in arrival order.
    TextDelta {
        /// The new text.
        delta: String,
    },

    /// The model opened a tool call.
    ToolCallStart {
        /// Provider-assigned call id.
        tool_call_id: String,
        /// Requested tool.
        name: String,
    },

    /// More argument JSON for an open call.
    ToolCallDelta {
        /// Call the fragment belongs to.
        tool_call_id: String,
        /// Raw fragment, not valid JSON on its own.
        arguments_delta: String,
    },

    /// A call whose arguments are complete.
    ToolCallEnd {
        /// The assembled call, arguments still unparsed.
        tool_call: ToolCall,
    },

    /// End of the response.
    Done {
        /// Provider stop reason, e.g. `stop`, `tool_calls` or `length`.
        stop_reason: String,
        /// Token counts when the provider sent them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}
