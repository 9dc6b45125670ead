//! # tide-llm
//!
//! LLM provider trait and shared transport utilities.
//!
//! - `Provider` trait producing a single-pass [`StreamEventStream`] per call
//! - HTTP retry transport: bounded retries on 429/5xx with `Retry-After` support
//! - Tool-call argument recovery from concatenated or malformed JSON
//! - Shared SSE line parser
//! - Model pricing for cost accounting
//! - OpenAI-compatible chat completions provider
//!
//! [`StreamEventStream`]: provider::StreamEventStream

#![deny(unsafe_code)]

pub mod openai;
pub mod pricing;
pub mod provider;
pub mod sse;
pub mod tool_parsing;
pub mod transport;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{Provider, ProviderError, ProviderRequest, ProviderResult, StreamEventStream};
pub use tool_parsing::{JsonObject, ToolArgsError, parse_tool_arguments, split_concatenated_json};
pub use transport::{RETRYABLE_STATUS_CODES, RetryTransport};
