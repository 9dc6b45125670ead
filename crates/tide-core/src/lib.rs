//! # tide-core
//!
//! Types every other Tide crate shares.
//!
//! - **Ids**: `SessionId`
//! - **Messages**: `Message` enum with `User`, `Assistant`, `ToolResult` variants
//! - **Usage**: provider usage deltas and the accumulated `UsageMetrics`
//! - **Tool results**: `AgentToolResult` with content, details, and error flag
//! - **Stream events**: `StreamEvent` enum for the LLM streaming protocol
//! - **Retry math**: backoff calculation and `Retry-After` parsing

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod retry;
pub mod tools;
pub mod usage;
