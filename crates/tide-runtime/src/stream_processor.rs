//! Stream processor: consumes a [`StreamEventStream`] into a [`StreamResult`].
//!
//! The stream is read exactly once. Retries happen in the transport before
//! the stream exists, never here.

use std::sync::Arc;

use futures::StreamExt;
use tide_core::events::StreamEvent;
use tide_llm::provider::{ProviderError, StreamEventStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::RuntimeError;
use crate::types::StreamResult;

/// Receives text deltas as they arrive.
pub type TextSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Stop reason providers use when the token limit cut the response.
const LENGTH_STOP_REASON: &str = "length";

/// Drain `stream`, accumulating text and completed tool calls.
///
/// A stream that ends before `Done`, or whose `Done` carries the `length`
/// stop reason, is marked truncated. Cancellation wins over a ready event.
pub async fn process_stream(
    mut stream: StreamEventStream,
    cancel: &CancellationToken,
    sink: Option<&TextSink>,
) -> Result<StreamResult, RuntimeError> {
    let mut result = StreamResult::default();

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            event = stream.next() => event,
        };

        match event {
            None => {
                warn!(
                    text_len = result.text.len(),
                    tool_calls = result.tool_calls.len(),
                    "stream ended without Done event"
                );
                result.truncated = true;
                return Ok(result);
            }
            Some(Err(ProviderError::Cancelled)) => return Err(RuntimeError::Cancelled),
            Some(Err(e)) => return Err(RuntimeError::Provider(e)),
            Some(Ok(event)) => match event {
                StreamEvent::Start => {}
                StreamEvent::TextDelta { delta } => {
                    if let Some(sink) = sink {
                        sink(&delta);
                    }
                    result.text.push_str(&delta);
                }
                StreamEvent::ToolCallStart { tool_call_id, name } => {
                    debug!(tool_call_id, tool_name = name, "tool call generating");
                }
                StreamEvent::ToolCallDelta { .. } => {}
                StreamEvent::ToolCallEnd { tool_call } => {
                    result.tool_calls.push(tool_call);
                }
                StreamEvent::Done { stop_reason, usage } => {
                    result.truncated = stop_reason == LENGTH_STOP_REASON;
                    result.stop_reason = Some(stop_reason);
                    result.usage = usage;
                    return Ok(result);
                }
            },
        }
    }
}
