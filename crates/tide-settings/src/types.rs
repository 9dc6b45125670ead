//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial JSON
//! files deserialize, with missing fields taking their default value.

use serde::{Deserialize, Serialize};
use tide_core::retry::RetryConfig;

/// Root settings type for the Tide agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TideSettings {
    /// Turn loop and dispatcher settings.
    pub agent: AgentSettings,
    /// Retry configuration for provider requests.
    pub retry: RetryConfig,
    /// Model provider connection.
    pub provider: ProviderSettings,
    /// Tool-specific settings.
    pub tools: ToolSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Turn loop and dispatcher settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Iteration cap per user turn.
    pub max_iterations: u32,
    /// Concurrency bound for the read-only batch.
    pub max_parallel_tools: usize,
    /// Abort the remaining mutating calls after one is rejected.
    pub fail_fast: bool,
    /// Per tool call timeout in milliseconds.
    pub tool_timeout_ms: u64,
    /// Attempts a read-only call gets when it faults transiently, the first
    /// included. Mutating calls always run once.
    pub tool_max_attempts: u32,
    /// Backoff before the first tool retry in milliseconds; doubles after.
    pub tool_retry_delay_ms: u64,
    /// Timeout for a confirmation decision; `None` waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_ms: Option<u64>,
    /// Global limit on one turn in milliseconds; `None` means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_timeout_ms: Option<u64>,
    /// Text marker that ends a turn early when it begins a line.
    pub completion_marker: String,
    /// Skip all confirmations.
    pub yolo: bool,
}

/// CPU count, or 4 when the platform cannot tell.
fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_parallel_tools: default_parallelism(),
            fail_fast: false,
            tool_timeout_ms: 120_000,
            tool_max_attempts: 3,
            tool_retry_delay_ms: 500,
            confirmation_timeout_ms: None,
            turn_timeout_ms: None,
            completion_marker: "TIDE DONE:".to_string(),
            yolo: false,
        }
    }
}

/// Model provider connection settings (OpenAI-compatible chat completions).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Whole-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum completion tokens per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_ms: 300_000,
            max_tokens: None,
        }
    }
}

/// Tool-specific settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolSettings {
    /// Tools allowed to run without confirmation.
    pub allowed_tools: Vec<String>,
    /// Research delegation tool settings.
    pub research: ResearchSettings,
}

/// Research delegation tool settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchSettings {
    /// Maximum files the nested agent may read.
    pub max_files: usize,
    /// Iteration cap for the nested agent.
    pub max_iterations: u32,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_files: 3,
            max_iterations: 8,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
