//! Token usage and cost accounting types.
//!
//! Providers report a [`TokenUsage`] delta per call, where any field may be
//! missing. The runtime folds deltas into [`UsageMetrics`]: the last call's
//! figures are replaced each call, session totals only grow.

use serde::{Deserialize, Serialize};

/// Usage reported by a provider for a single call.
///
/// Every field is optional because providers omit fields freely; missing
/// values count as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt (input) tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Completion (output) tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Prompt tokens served from cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
}

impl TokenUsage {
    /// Build a fully populated delta.
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            cache_read_tokens: None,
        }
    }
}

/// Field-wise usage figures for one call or for a whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetrics {
    /// Prompt (input) tokens.
    pub prompt_tokens: u64,
    /// Completion (output) tokens.
    pub completion_tokens: u64,
    /// Prompt tokens served from cache.
    pub cache_read_tokens: u64,
    /// Cost in USD.
    pub cost: f64,
}

impl UsageMetrics {
    /// Convert a provider delta, treating missing fields as zero.
    ///
    /// Negative or non-finite costs are clamped to zero so totals never shrink.
    #[must_use]
    pub fn from_delta(delta: &TokenUsage, cost: f64) -> Self {
        Self {
            prompt_tokens: delta.prompt_tokens.unwrap_or(0),
            completion_tokens: delta.completion_tokens.unwrap_or(0),
            cache_read_tokens: delta.cache_read_tokens.unwrap_or(0),
            cost: if cost.is_finite() { cost.max(0.0) } else { 0.0 },
        }
    }

    /// Add another set of figures field by field.
    pub fn accumulate(&mut self, other: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.cache_read_tokens = self
            .cache_read_tokens
            .saturating_add(other.cache_read_tokens);
        self.cost += other.cost;
    }

    /// Prompt plus completion tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Usage state carried by a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUsage {
    /// Figures from the most recent provider call.
    pub last_call_usage: UsageMetrics,
    /// Running totals for the session.
    pub session_total_usage: UsageMetrics,
}

impl SessionUsage {
    /// Replace the last-call figures and fold them into the totals.
    pub fn apply(&mut self, call: UsageMetrics) {
        self.last_call_usage = call;
        self.session_total_usage.accumulate(&call);
    }
}
