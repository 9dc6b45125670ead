//! `list_dir` tool: lists a directory, directories first.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};

use crate::errors::ToolError;
use crate::traits::{AgentTool, FileSystemOps, ToolContext, resolve_in};
use crate::utils::fs_errors::format_fs_error;
use crate::utils::path::is_hidden_name;
use crate::utils::validation::{get_optional_bool, get_optional_string, get_optional_u64};

const DEFAULT_MAX_ENTRIES: usize = 200;
const MAX_NAME_WIDTH: usize = 47;

/// The `list_dir` tool.
pub struct ListDirTool {
    fs: Arc<dyn FileSystemOps>,
}

impl ListDirTool {
    /// Create a new `list_dir` tool with the given filesystem.
    pub fn new(fs: Arc<dyn FileSystemOps>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl AgentTool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Filesystem
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "list_dir".into(),
            description: "List the contents of a directory.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("directory", json!({"type": "string", "description": "Directory to list (default: working directory)"})),
                    ("max_entries", json!({"type": "number", "description": "Maximum entries to return (default 200)"})),
                    ("show_hidden", json!({"type": "boolean", "description": "Include dotfiles (default false)"})),
                ],
                &[],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let directory = get_optional_string(&params, "directory").unwrap_or_else(|| ".".into());
        let max_entries = get_optional_u64(&params, "max_entries")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        let show_hidden = get_optional_bool(&params, "show_hidden").unwrap_or(false);

        let resolved = resolve_in(ctx, &directory);
        let display = resolved.to_string_lossy().into_owned();

        match self.fs.stat(&resolved).await {
            Ok(stat) if !stat.is_dir => return Ok(error_result(format!("Not a directory: {display}"))),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(error_result(format!("Directory not found: {display}")));
            }
            Err(e) => return Ok(format_fs_error(&e, &display, "accessing")),
        }

        let mut entries = match self.fs.read_dir(&resolved).await {
            Ok(e) => e,
            Err(e) => return Ok(format_fs_error(&e, &display, "listing")),
        };
        entries.retain(|e| show_hidden || !is_hidden_name(&e.name));
        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        let total = entries.len();
        entries.truncate(max_entries);

        if entries.is_empty() {
            return Ok(text_result(format!("Directory '{display}' is empty"), false));
        }

        let dir_count = entries.iter().filter(|e| e.is_dir).count();
        let file_count = entries.len() - dir_count;
        let col_width = entries
            .iter()
            .map(|e| e.name.chars().count())
            .max()
            .unwrap_or(0)
            .saturating_add(2)
            .min(MAX_NAME_WIDTH + 3);

        let mut out = format!("Contents of '{display}':\n\n");
        for entry in &entries {
            let mut name: String = if entry.name.chars().count() > MAX_NAME_WIDTH {
                let head: String = entry.name.chars().take(MAX_NAME_WIDTH - 3).collect();
                format!("{head}...")
            } else {
                entry.name.clone()
            };
            if entry.is_symlink {
                name.push('@');
            } else if entry.is_dir {
                name.push('/');
            }
            let kind = if entry.is_dir { "[DIR]" } else { "[FILE]" };
            let _ = writeln!(out, "  {name:<col_width$} {kind}");
        }
        let _ = write!(
            out,
            "\nTotal: {} entries ({dir_count} directories, {file_count} files)",
            entries.len()
        );
        if total > max_entries {
            let _ = write!(out, "\nNote: Output limited to {max_entries} entries");
        }

        Ok(text_result(out, false).with_details(json!({
            "directory": display,
            "totalEntries": total,
            "returned": entries.len(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFs, assert_error, make_ctx};

    fn fs() -> MockFs {
        MockFs::new()
            .with_file("/tmp/proj/b.rs", "")
            .with_file("/tmp/proj/A.md", "")
            .with_file("/tmp/proj/.env", "")
            .with_file("/tmp/proj/src/lib.rs", "")
    }

    #[tokio::test]
    async fn directories_first_then_case_insensitive() {
        let tool = ListDirTool::new(Arc::new(fs()));
        let r = tool.execute(json!({"directory": "proj"}), &make_ctx()).await.unwrap();
        let src = r.content.find("src/").unwrap();
        let a = r.content.find("A.md").unwrap();
        let b = r.content.find("b.rs").unwrap();
        assert!(src < a && a < b, "{}", r.content);
        assert!(!r.content.contains(".env"));
        assert!(r.content.contains("(1 directories, 2 files)"));
    }

    #[tokio::test]
    async fn show_hidden_includes_dotfiles() {
        let tool = ListDirTool::new(Arc::new(fs()));
        let r = tool
            .execute(json!({"directory": "/tmp/proj", "show_hidden": true}), &make_ctx())
            .await
            .unwrap();
        assert!(r.content.contains(".env"));
    }

    #[tokio::test]
    async fn max_entries_limits_output() {
        let tool = ListDirTool::new(Arc::new(fs()));
        let r = tool
            .execute(json!({"directory": "/tmp/proj", "max_entries": 1}), &make_ctx())
            .await
            .unwrap();
        assert!(r.content.contains("Output limited to 1 entries"));
        assert_eq!(r.details.unwrap()["totalEntries"], 3);
    }

    #[tokio::test]
    async fn missing_directory() {
        let tool = ListDirTool::new(Arc::new(MockFs::new()));
        let r = tool.execute(json!({"directory": "/nope"}), &make_ctx()).await.unwrap();
        assert_error(&r, "Directory not found");
    }

    #[tokio::test]
    async fn file_is_not_a_directory() {
        let tool = ListDirTool::new(Arc::new(fs()));
        let r = tool.execute(json!({"directory": "/tmp/proj/b.rs"}), &make_ctx()).await.unwrap();
        assert_error(&r, "Not a directory");
    }
}
