//! History cleanup after an interrupted turn.
//!
//! An interrupted turn can leave assistant tool calls without a matching
//! result, empty assistant responses, or a user message that never got an
//! answer. Providers reject such a history on the next request, so these
//! are removed before it is sent again.
//!
//! A tool call is answered only by a result that follows it and precedes the
//! next assistant message. Backends may reuse ids across responses, so a
//! result from an earlier turn never answers a later call.

use std::collections::HashSet;

use tide_core::messages::Message;
use tracing::{debug, warn};

use crate::session::SessionState;

/// Upper bound on cleanup passes before [`run_cleanup`] gives up.
pub const MAX_CLEANUP_PASSES: usize = 10;

/// What cleanup removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Ids of tool calls removed from assistant messages.
    pub removed_tool_calls: Vec<String>,
    /// Assistant messages dropped because removing their calls left nothing.
    pub removed_messages: usize,
    /// Assistant messages dropped for having neither text nor calls.
    pub removed_empty_responses: usize,
    /// User messages dropped because another user message followed them.
    pub removed_requests: usize,
    /// Passes [`run_cleanup`] made, including the final one that changed
    /// nothing.
    pub passes: usize,
}

impl CleanupReport {
    /// Whether anything was removed.
    pub fn changed(&self) -> bool {
        !self.removed_tool_calls.is_empty()
            || self.removed_messages > 0
            || self.removed_empty_responses > 0
            || self.removed_requests > 0
    }
}

/// For each assistant message, the ids answered between it and the next
/// assistant message. Other positions hold an empty set.
fn answered_windows(messages: &[Message]) -> Vec<HashSet<String>> {
    let mut windows = vec![HashSet::new(); messages.len()];
    let mut pending = HashSet::new();
    for (index, message) in messages.iter().enumerate().rev() {
        if let Some(id) = message.answered_tool_call_id() {
            let _ = pending.insert(id.to_string());
        } else if message.is_assistant() {
            windows[index] = std::mem::take(&mut pending);
        }
    }
    windows
}

/// Remove every tool call with no result in its own response window.
///
/// Assistant messages that lose their last tool call and carry no text are
/// dropped entirely.
pub fn remove_dangling_tool_calls(session: &mut SessionState) -> CleanupReport {
    let windows = answered_windows(session.messages());

    let mut report = CleanupReport::default();
    let messages = session.messages_mut();
    let before = messages.len();
    let mut index = 0;

    messages.retain_mut(|message| {
        let answered = &windows[index];
        index += 1;
        let Message::Assistant { text, tool_calls, .. } = message else {
            return true;
        };
        let original = tool_calls.len();
        tool_calls.retain(|call| {
            let keep = answered.contains(&call.id);
            if !keep {
                report.removed_tool_calls.push(call.id.clone());
            }
            keep
        });
        let touched = tool_calls.len() != original;
        !(touched && tool_calls.is_empty() && text.is_empty())
    });

    report.removed_messages = before - messages.len();
    if report.changed() {
        warn!(
            removed_tool_calls = report.removed_tool_calls.len(),
            removed_messages = report.removed_messages,
            "removed dangling tool calls from history"
        );
    } else {
        debug!("no dangling tool calls found");
    }
    report
}

/// Drop assistant messages with no text and no tool calls.
pub fn remove_empty_responses(session: &mut SessionState) -> usize {
    let messages = session.messages_mut();
    let before = messages.len();
    messages.retain(|message| {
        !matches!(message, Message::Assistant { text, tool_calls, .. } if text.is_empty() && tool_calls.is_empty())
    });
    let removed = before - messages.len();
    if removed > 0 {
        warn!(removed, "removed empty assistant responses");
    }
    removed
}

/// Collapse each run of adjacent user messages to its last one.
pub fn remove_consecutive_requests(session: &mut SessionState) -> usize {
    let messages = session.messages_mut();
    let before = messages.len();
    let keep: Vec<bool> = (0..messages.len())
        .map(|i| !(messages[i].is_user() && messages.get(i + 1).is_some_and(Message::is_user)))
        .collect();
    let mut index = 0;
    messages.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    let removed = before - messages.len();
    if removed > 0 {
        warn!(removed, "removed unanswered user messages");
    }
    removed
}

/// Run every cleanup pass until one changes nothing.
///
/// Removing one thing can expose another (dropping an emptied response
/// makes two user messages adjacent), so the passes repeat, at most
/// [`MAX_CLEANUP_PASSES`] times.
pub fn run_cleanup(session: &mut SessionState) -> CleanupReport {
    let mut report = CleanupReport::default();
    while report.passes < MAX_CLEANUP_PASSES {
        report.passes += 1;
        let dangling = remove_dangling_tool_calls(session);
        let empty = remove_empty_responses(session);
        let requests = remove_consecutive_requests(session);
        let changed = dangling.changed() || empty > 0 || requests > 0;

        report.removed_tool_calls.extend(dangling.removed_tool_calls);
        report.removed_messages += dangling.removed_messages;
        report.removed_empty_responses += empty;
        report.removed_requests += requests;
        if !changed {
            debug!(passes = report.passes, "history cleanup settled");
            return report;
        }
    }
    warn!(passes = report.passes, "history cleanup did not settle");
    report
}

/// Ids of tool calls that currently lack a result in their response window.
pub fn dangling_tool_call_ids(session: &SessionState) -> Vec<String> {
    let messages = session.messages();
    let windows = answered_windows(messages);
    messages
        .iter()
        .zip(&windows)
        .flat_map(|(message, answered)| {
            message
                .tool_calls()
                .iter()
                .filter(|call| !answered.contains(&call.id))
                .map(|call| call.id.clone())
        })
        .collect()
}
