//! # Message Converter
//!
//! Converts conversation history into chat completions `messages`.
//!
//! - User messages → `user` role
//! - Assistant text and tool calls → `assistant` role with `tool_calls`
//! - Tool results → `tool` role keyed by `tool_call_id`
//!
//! Tool call arguments are passed through as the raw text the model
//! produced, so a replayed history matches what was streamed.

use serde_json::{Value, json};
use tide_core::messages::Message;
use tide_core::tools::Tool;

use super::types::{ChatFunction, ChatTool};

/// Convert history (plus an optional system prompt) to chat messages.
#[must_use]
pub fn convert_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        out.push(json!({ "role": "system", "content": system }));
    }

    for msg in messages {
        match msg {
            Message::User { content, .. } => {
                out.push(json!({ "role": "user", "content": content }));
            }
            Message::Assistant {
                text, tool_calls, ..
            } => {
                let mut entry = json!({
                    "role": "assistant",
                    "content": if text.is_empty() { Value::Null } else { Value::String(text.clone()) },
                });
                if !tool_calls.is_empty() {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|tc| {
                            let arguments = if tc.arguments.trim().is_empty() {
                                "{}"
                            } else {
                                tc.arguments.as_str()
                            };
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": { "name": tc.name, "arguments": arguments },
                            })
                        })
                        .collect();
                    entry["tool_calls"] = Value::Array(calls);
                }
                out.push(entry);
            }
            Message::ToolResult {
                tool_call_id,
                content,
                ..
            } => {
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                }));
            }
        }
    }

    out
}

/// Convert tool definitions to chat completions format.
#[must_use]
pub fn convert_tools(tools: &[Tool]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|t| ChatTool {
            tool_type: "function",
            function: ChatFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: serde_json::to_value(&t.parameters).unwrap_or_default(),
            },
        })
        .collect()
}
