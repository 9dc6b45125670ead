//! OpenAI-compatible chat completions provider.

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::OpenAiProvider;
pub use types::OpenAiConfig;
