//! `update_file` tool: replaces one exact block of text in an existing file.
//!
//! The target must occur exactly once. Zero or multiple matches, and a
//! replacement that changes nothing, are reported back to the model with a
//! preview so it can retry with a better target.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};
use tracing::debug;

use crate::errors::ToolError;
use crate::traits::{AgentTool, FileSystemOps, ToolContext, resolve_in};
use crate::utils::fs_errors::format_fs_error;
use crate::utils::validation::{validate_present_string, validate_required_string};

const PREVIEW_LINES: usize = 20;

/// The `update_file` tool.
pub struct UpdateFileTool {
    fs: Arc<dyn FileSystemOps>,
}

impl UpdateFileTool {
    /// Create a new `update_file` tool with the given filesystem.
    pub fn new(fs: Arc<dyn FileSystemOps>) -> Self {
        Self { fs }
    }
}

fn preview(content: &str) -> String {
    let lines: Vec<&str> = content.lines().take(PREVIEW_LINES).collect();
    format!("preview ({} lines):\n---\n{}\n---", lines.len(), lines.join("\n"))
}

#[async_trait]
impl AgentTool for UpdateFileTool {
    fn name(&self) -> &str {
        "update_file"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Filesystem
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "update_file".into(),
            description: "Update an existing file by replacing an exact block of text with a patch.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("filepath", json!({"type": "string", "description": "Path of the file to update"})),
                    ("target", json!({"type": "string", "description": "The exact text to replace; must occur once"})),
                    ("patch", json!({"type": "string", "description": "The replacement text"})),
                ],
                &["filepath", "target", "patch"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let file_path = match validate_required_string(&params, "filepath", "path of the file") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let target = match validate_required_string(&params, "target", "text to replace") {
            Ok(t) => t,
            Err(e) => return Ok(e),
        };
        let patch = match validate_present_string(&params, "patch", "replacement text") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };

        let resolved = resolve_in(ctx, &file_path);
        let shown = resolved.to_string_lossy().into_owned();

        if !self.fs.exists(&resolved) {
            return Ok(error_result(format!(
                "File '{shown}' not found. Cannot update. Verify the filepath or use `write_file` if it's a new file."
            )));
        }

        let original = match self.fs.read_file(&resolved).await {
            Ok(b) => String::from_utf8_lossy(&b).into_owned(),
            Err(e) => return Ok(format_fs_error(&e, &shown, "reading")),
        };

        let occurrences = original.matches(target.as_str()).count();
        if occurrences == 0 {
            return Ok(error_result(format!(
                "Target text not found in '{shown}'.\n\nFile {}",
                preview(&original)
            )));
        }
        if occurrences > 1 {
            return Ok(error_result(format!(
                "Target text appears {occurrences} times in '{shown}'. Include more surrounding context so it matches exactly once."
            )));
        }

        let updated = original.replacen(target.as_str(), &patch, 1);
        if updated == original {
            return Ok(error_result(format!(
                "Update target found, but replacement resulted in no changes to '{shown}'. Was the `target` identical to the `patch`?"
            )));
        }

        if let Err(e) = self.fs.write_file(&resolved, updated.as_bytes()).await {
            return Ok(format_fs_error(&e, &shown, "writing"));
        }

        debug!(path = %shown, "file updated");
        Ok(text_result(format!("File '{shown}' updated successfully."), false))
    }
}
