//! `read_file` tool: reads file contents with line numbers.
//!
//! Outputs lines as `     1→content` with right-aligned line numbers.
//! Supports offset/limit for partial reads, truncates long lines, and
//! refuses binary files and files over the size limit.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};

use crate::errors::ToolError;
use crate::traits::{AgentTool, FileSystemOps, ToolContext, resolve_in};
use crate::utils::fs_errors::format_fs_error;
use crate::utils::validation::{get_optional_u64, validate_required_string};

const MAX_FILE_SIZE: u64 = 100 * 1024;
const MAX_LINE_LENGTH: usize = 2000;
const ARROW: &str = "\u{2192}";

/// The `read_file` tool.
pub struct ReadFileTool {
    fs: Arc<dyn FileSystemOps>,
}

impl ReadFileTool {
    /// Create a new `read_file` tool with the given filesystem.
    pub fn new(fs: Arc<dyn FileSystemOps>) -> Self {
        Self { fs }
    }
}

fn format_lines(lines: &[&str], start: usize, end: usize) -> String {
    let width = end.to_string().len().max(6);
    let mut output = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line_num = start + i + 1;
        if line.len() > MAX_LINE_LENGTH {
            let cut = floor_char_boundary(line, MAX_LINE_LENGTH);
            let _ = writeln!(output, "{line_num:>width$}{ARROW}{}... [line truncated]", &line[..cut]);
        } else {
            let _ = writeln!(output, "{line_num:>width$}{ARROW}{line}");
        }
    }
    output
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut i = max.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[async_trait]
impl AgentTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Filesystem
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "read_file".into(),
            description: "Read the contents of a file. Returns the content with line numbers.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("filepath", json!({"type": "string", "description": "Path to the file (absolute or relative)"})),
                    ("offset", json!({"type": "number", "description": "Line number to start reading from (0-indexed)"})),
                    ("limit", json!({"type": "number", "description": "Maximum number of lines to read"})),
                ],
                &["filepath"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let file_path = match validate_required_string(&params, "filepath", "path to the file") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let resolved = resolve_in(ctx, &file_path);
        let display = resolved.to_string_lossy().into_owned();

        match self.fs.stat(&resolved).await {
            Ok(stat) if stat.is_dir => {
                return Ok(error_result(format!("Is a directory: {display}")));
            }
            Ok(stat) if stat.len > MAX_FILE_SIZE => {
                return Ok(error_result(format!(
                    "File too large: {display} ({} bytes, limit {MAX_FILE_SIZE})",
                    stat.len
                )));
            }
            Ok(_) => {}
            Err(e) => return Ok(format_fs_error(&e, &display, "reading")),
        }

        let bytes = match self.fs.read_file(&resolved).await {
            Ok(b) => b,
            Err(e) => return Ok(format_fs_error(&e, &display, "reading")),
        };

        let check_len = bytes.len().min(8192);
        if bytes[..check_len].contains(&0) {
            return Ok(error_result(format!("Cannot read binary file: {display}")));
        }

        let content = String::from_utf8_lossy(&bytes);
        let all_lines: Vec<&str> = content.lines().collect();
        let total_lines = all_lines.len();
        let offset = usize::try_from(get_optional_u64(&params, "offset").unwrap_or(0)).unwrap_or(usize::MAX);
        let start = offset.min(total_lines);
        let end = get_optional_u64(&params, "limit")
            .and_then(|l| usize::try_from(l).ok())
            .map_or(total_lines, |l| start.saturating_add(l).min(total_lines));
        let selected = &all_lines[start..end];

        Ok(text_result(format_lines(selected, start, end), false).with_details(json!({
            "filePath": display,
            "totalLines": total_lines,
            "linesReturned": selected.len(),
            "startLine": start + 1,
            "endLine": end,
        })))
    }
}
