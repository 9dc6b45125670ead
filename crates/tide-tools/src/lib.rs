//! # tide-tools
//!
//! Tool trait and built-in tool implementations for the tide agent.
//!
//! Defines the [`AgentTool`] trait every tool implements, and provides:
//! - **Filesystem**: `read_file`, `write_file`, `update_file`, `list_dir`, `glob`
//! - **Search**: `grep`
//! - **System**: `bash` (timeout, output truncation, dangerous pattern detection)
//! - **Delegation**: `research_codebase`, backed by a nested read-only agent
//!
//! Tools never touch the filesystem or spawn processes directly; they go
//! through the [`FileSystemOps`] and [`ProcessRunner`] seams so tests can
//! substitute in-memory implementations.
//!
//! [`AgentTool`]: traits::AgentTool
//! [`FileSystemOps`]: traits::FileSystemOps
//! [`ProcessRunner`]: traits::ProcessRunner

#![deny(unsafe_code)]

pub mod errors;
pub mod fs;
pub mod providers;
pub mod registry;
pub mod research;
pub mod search;
pub mod system;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use traits::{AgentTool, FileSystemOps, ProcessRunner, ResearchDelegate, ToolContext};
