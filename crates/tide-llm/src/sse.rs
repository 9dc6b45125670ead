//! # SSE Parser
//!
//! Server-Sent Events line parser for streaming provider responses.
//!
//! - Line buffering from chunked responses
//! - `data: ` prefix extraction
//! - `[DONE]` marker surfaced as [`SseFrame::Done`]
//!
//! A transport read error ends the frame stream early. Callers detect that by
//! the missing terminal event and report the response as truncated.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::warn;

/// One parsed SSE frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseFrame {
    /// JSON payload of a `data:` line.
    Data(String),
    /// The `[DONE]` end-of-stream marker.
    Done,
}

/// Parse SSE frames from a byte stream.
pub fn parse_sse_lines<S, E>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue; // skip invalid UTF-8 lines
                    };

                    if let Some(frame) = extract_sse_frame(line) {
                        return Some((frame, (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        return None;
                    }
                    None => {
                        let rest = std::str::from_utf8(&buffer).ok().and_then(extract_sse_frame);
                        buffer.clear();
                        return rest.map(|frame| (frame, (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Extract a frame from an SSE line.
///
/// Returns `None` for comments, empty lines, and non-`data` fields.
fn extract_sse_frame(line: &str) -> Option<SseFrame> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();

    match data {
        "" => None,
        "[DONE]" => Some(SseFrame::Done),
        _ => Some(SseFrame::Data(data.to_string())),
    }
}
