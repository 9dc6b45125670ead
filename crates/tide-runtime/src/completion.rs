//! Completion detection.
//!
//! Stateless: the decision depends only on the response in hand. Tool calls
//! mean more work, no tool calls mean done. A textual marker is only a hint.

use serde::{Deserialize, Serialize};

/// What the controller does after a model response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionDecision {
    /// Execute the tool calls and ask the model again.
    Continue,
    /// The turn is finished.
    Complete,
    /// The response was cut off; needs resume/retry handling.
    Truncated,
}

/// Decides the fate of each model response.
#[derive(Clone, Debug, Default)]
pub struct CompletionDetector {
    marker: Option<String>,
}

impl CompletionDetector {
    /// Detector recognizing `marker` at the start of a line. An empty marker
    /// disables marker detection.
    pub fn new(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        let marker = marker.trim();
        Self {
            marker: (!marker.is_empty()).then(|| marker.to_string()),
        }
    }

    /// Classify a response.
    ///
    /// A truncated stream wins over everything. Otherwise any tool call means
    /// [`CompletionDecision::Continue`], whatever the text says, and no tool
    /// calls means [`CompletionDecision::Complete`].
    pub fn decide(&self, response_text: &str, tool_calls_present: bool, truncated: bool) -> CompletionDecision {
        if truncated {
            return CompletionDecision::Truncated;
        }
        if tool_calls_present {
            return CompletionDecision::Continue;
        }
        if self.has_marker(response_text) {
            tracing::debug!("completion marker present");
        }
        CompletionDecision::Complete
    }

    /// Whether some line of `text` starts with the marker.
    pub fn has_marker(&self, text: &str) -> bool {
        self.marker.as_deref().is_some_and(|marker| {
            text.lines().any(|line| line.trim_start().starts_with(marker))
        })
    }

    /// `text` with marker prefixes removed from every line that carries one.
    pub fn strip_marker(&self, text: &str) -> String {
        let Some(marker) = self.marker.as_deref() else {
            return text.to_string();
        };
        text.lines()
            .map(|line| {
                line.trim_start()
                    .strip_prefix(marker)
                    .map_or(line, str::trim_start)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
