//! # Chat Completions Types
//!
//! Request configuration and the wire shapes of streamed chunks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model ID sent with every request.
    pub model: String,
    /// Bearer token. Local endpoints often need none.
    pub api_key: Option<String>,
    /// Default `max_tokens` when the request does not set one.
    pub max_tokens: Option<u32>,
}

impl OpenAiConfig {
    /// Chat completions endpoint URL.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// One `data:` payload of a streamed chat completion.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatChunk {
    /// Choice deltas. Empty on the trailing usage chunk.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, sent once when `stream_options.include_usage` is set.
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
    /// In-band error object some gateways emit mid-stream.
    #[serde(default)]
    pub error: Option<Value>,
}

/// A single choice inside a chunk.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the last chunk of the choice (`stop`, `tool_calls`, `length`).
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental assistant content.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragments, keyed by `index`.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

/// Fragment of one streamed tool call.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the message.
    #[serde(default)]
    pub index: u32,
    /// Call ID, present on the first fragment.
    #[serde(default)]
    pub id: Option<String>,
    /// Function name and argument fragment.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Function part of a tool call fragment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FunctionDelta {
    /// Function name, present on the first fragment.
    #[serde(default)]
    pub name: Option<String>,
    /// Raw argument text fragment.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage block of the final chunk.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    /// Prompt token breakdown.
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

/// Cached prompt token count.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PromptTokensDetails {
    /// Prompt tokens served from cache.
    #[serde(default)]
    pub cached_tokens: Option<u64>,
}

/// Tool definition in chat completions format.
#[derive(Clone, Debug, Serialize)]
pub struct ChatTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function definition.
    pub function: ChatFunction,
}

/// Function definition of a [`ChatTool`].
#[derive(Clone, Debug, Serialize)]
pub struct ChatFunction {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema of the arguments.
    pub parameters: Value,
}
