//! # Stream Handler
//!
//! Chunk state machine for streamed chat completions.
//!
//! Converts chunks into unified [`StreamEvent`]s:
//! - `delta.content` → `TextDelta`
//! - first fragment of `delta.tool_calls[i]` → `ToolCallStart`
//! - `function.arguments` fragments → `ToolCallDelta`
//! - end of stream → `ToolCallEnd` per call (index order), then `Done`
//!
//! `Done` is only emitted when the stream actually finished: a
//! `finish_reason` or the `[DONE]` marker was seen. A stream cut off
//! before either yields no `Done`, which consumers treat as truncation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tide_core::events::StreamEvent;
use tide_core::messages::ToolCall;
use tide_core::usage::TokenUsage;
use uuid::Uuid;

use super::types::{ChatChunk, ChunkUsage};

/// State for tracking accumulated stream content.
#[derive(Clone, Debug, Default)]
pub struct StreamState {
    /// Accumulated text content.
    pub accumulated_text: String,
    /// Tool calls by stream index.
    pub tool_calls: BTreeMap<u32, ToolCallState>,
    /// Finish reason of the first choice, once seen.
    pub finish_reason: Option<String>,
    /// Usage from the trailing chunk.
    pub usage: Option<TokenUsage>,
    /// Whether the `[DONE]` marker arrived.
    pub saw_done_marker: bool,
    finished: bool,
}

/// State for an individual tool call being accumulated.
#[derive(Clone, Debug)]
pub struct ToolCallState {
    /// Call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw argument text, fragments concatenated in arrival order.
    pub args: String,
}

/// Id for a call the backend sent without one. Unique across responses so a
/// later response never reuses an id already answered in the history.
fn fallback_call_id(index: u32) -> String {
    format!("call_{index}_{}", Uuid::now_v7().simple())
}

/// Process one chunk and return the events it produces.
#[must_use]
pub fn process_chunk(chunk: &ChatChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(usage) = &chunk.usage {
        state.usage = Some(convert_usage(usage));
    }

    let Some(choice) = chunk.choices.first() else {
        return events;
    };

    if let Some(text) = choice.delta.content.as_deref().filter(|t| !t.is_empty()) {
        state.accumulated_text.push_str(text);
        events.push(StreamEvent::TextDelta {
            delta: text.to_owned(),
        });
    }

    for fragment in &choice.delta.tool_calls {
        let function = fragment.function.as_ref();
        let tc = match state.tool_calls.entry(fragment.index) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => {
                let id = fragment
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| fallback_call_id(fragment.index));
                let name = function.and_then(|f| f.name.clone()).unwrap_or_default();
                events.push(StreamEvent::ToolCallStart {
                    tool_call_id: id.clone(),
                    name: name.clone(),
                });
                v.insert(ToolCallState {
                    id,
                    name,
                    args: String::new(),
                })
            }
        };

        if tc.name.is_empty() {
            if let Some(name) = function.and_then(|f| f.name.as_deref()) {
                name.clone_into(&mut tc.name);
            }
        }
        if let Some(delta) = function
            .and_then(|f| f.arguments.as_deref())
            .filter(|d| !d.is_empty())
        {
            tc.args.push_str(delta);
            events.push(StreamEvent::ToolCallDelta {
                tool_call_id: tc.id.clone(),
                arguments_delta: delta.to_owned(),
            });
        }
    }

    if let Some(reason) = &choice.finish_reason {
        if state.finish_reason.is_none() {
            state.finish_reason = Some(reason.clone());
        }
    }

    events
}

/// Emit the terminal events once the byte stream has ended.
///
/// Returns nothing if the stream never signalled completion, or if the
/// terminal events were already produced.
#[must_use]
pub fn finish_stream(state: &mut StreamState) -> Vec<StreamEvent> {
    if state.finished || (state.finish_reason.is_none() && !state.saw_done_marker) {
        return Vec::new();
    }
    state.finished = true;

    let mut events: Vec<StreamEvent> = state
        .tool_calls
        .values()
        .map(|tc| StreamEvent::ToolCallEnd {
            tool_call: ToolCall::new(tc.id.clone(), tc.name.clone(), tc.args.clone()),
        })
        .collect();

    let stop_reason = state.finish_reason.clone().unwrap_or_else(|| "stop".into());
    events.push(StreamEvent::Done {
        stop_reason,
        usage: state.usage.clone(),
    });
    events
}

fn convert_usage(usage: &ChunkUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        cache_read_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens),
    }
}
