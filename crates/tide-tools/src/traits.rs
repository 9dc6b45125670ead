//! The tool contract and the seams tools reach the outside world through.
//!
//! Tools never touch the filesystem, processes or a nested agent directly;
//! they go through [`FileSystemOps`], [`ProcessRunner`] and
//! [`ResearchDelegate`], which the binary wires to real implementations and
//! tests replace with in-memory ones.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tide_core::tools::{AgentToolResult, Tool, ToolCategory};
use tokio_util::sync::CancellationToken;

use crate::errors::ToolError;

/// Per-call information handed to [`AgentTool::execute`].
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Id of the call being executed.
    pub tool_call_id: String,
    /// Owning session.
    pub session_id: String,
    /// Base for relative paths.
    pub working_directory: String,
    /// Fires when the turn is interrupted.
    pub cancellation: CancellationToken,
}

/// A capability the model can invoke.
///
/// Concurrency and confirmation are decided by the runtime from the tool's
/// name, not by the tool.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Name the model uses for this tool.
    fn name(&self) -> &str;

    /// Grouping for logs and metadata.
    fn category(&self) -> ToolCategory;

    /// Declaration advertised in every model request.
    fn definition(&self) -> Tool;

    /// Run with the model's decoded arguments.
    ///
    /// Problems the model can act on come back as error-flagged results;
    /// `Err` is for faults the tool cannot phrase itself.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Seams
// ─────────────────────────────────────────────────────────────────────────────

/// File access used by the filesystem and search tools.
#[async_trait]
pub trait FileSystemOps: Send + Sync {
    /// Whole file contents.
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Replace or create `path` with `content`.
    async fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()>;
    /// Kind and size of `path`.
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;
    /// `mkdir -p`.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Entries directly under `path`, in no particular order.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>>;
    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// What [`FileSystemOps::stat`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    /// Directory rather than file.
    pub is_dir: bool,
    /// Bytes.
    pub len: u64,
}

/// One child of a listed directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// Base name.
    pub name: String,
    /// Directory rather than file.
    pub is_dir: bool,
    /// Symbolic link, not followed.
    pub is_symlink: bool,
}

/// Shell execution used by `bash`.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with `bash -c`. Timeout and cancellation are reported
    /// through [`ProcessOutput`], not as errors.
    async fn run_command(&self, command: &str, opts: &ProcessOptions) -> Result<ProcessOutput, ToolError>;
}

/// How to run one command.
#[derive(Clone, Debug)]
pub struct ProcessOptions {
    /// Directory the command starts in.
    pub working_directory: String,
    /// Wall-clock limit.
    pub timeout_ms: u64,
    /// Stops the command early.
    pub cancellation: CancellationToken,
    /// Extra environment on top of the inherited one.
    pub env: HashMap<String, String>,
}

/// What a command produced.
#[derive(Clone, Debug, Default)]
pub struct ProcessOutput {
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
    /// Exit status, `-1` when there is none.
    pub exit_code: i32,
    /// Elapsed time.
    pub duration_ms: u64,
    /// Killed by the timeout.
    pub timed_out: bool,
    /// Killed by cancellation.
    pub interrupted: bool,
}

/// Nested read-only agent behind `research_codebase`.
#[async_trait]
pub trait ResearchDelegate: Send + Sync {
    /// Investigate `request` and return the agent's findings.
    async fn research(&self, request: ResearchRequest, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// A question for [`ResearchDelegate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    /// What to find out.
    pub query: String,
    /// Where to look.
    pub directories: Vec<String>,
    /// Files the agent may read in full.
    pub max_files: usize,
}

/// `path` made absolute against the call's working directory.
#[must_use]
pub fn resolve_in(ctx: &ToolContext, path: &str) -> PathBuf {
    crate::utils::path::resolve_path(path, &ctx.working_directory)
}
