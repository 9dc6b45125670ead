//! `write_file` tool: creates a new file.
//!
//! Refuses to overwrite an existing file; edits go through `update_file`.
//! Missing parent directories are created.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};
use tracing::debug;

use crate::errors::ToolError;
use crate::traits::{AgentTool, FileSystemOps, ToolContext, resolve_in};
use crate::utils::fs_errors::format_fs_error;
use crate::utils::validation::{validate_present_string, validate_required_string};

/// The `write_file` tool.
pub struct WriteFileTool {
    fs: Arc<dyn FileSystemOps>,
}

impl WriteFileTool {
    /// Create a new `write_file` tool with the given filesystem.
    pub fn new(fs: Arc<dyn FileSystemOps>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl AgentTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Filesystem
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "write_file".into(),
            description: "Write content to a new file. Fails if the file already exists.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("filepath", json!({"type": "string", "description": "Path of the file to create"})),
                    ("content", json!({"type": "string", "description": "Content to write"})),
                ],
                &["filepath", "content"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let file_path = match validate_required_string(&params, "filepath", "path of the file") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let content = match validate_present_string(&params, "content", "file content") {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };

        let resolved = resolve_in(ctx, &file_path);
        let shown = resolved.to_string_lossy().into_owned();

        if self.fs.exists(&resolved) {
            return Ok(error_result(format!(
                "File '{shown}' already exists. Use the `update_file` tool to modify it, or choose a different filepath."
            )));
        }

        if let Some(parent) = resolved.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !self.fs.exists(parent) {
                if let Err(e) = self.fs.create_dir_all(parent).await {
                    return Ok(format_fs_error(&e, &parent.to_string_lossy(), "creating"));
                }
            }
        }

        if let Err(e) = self.fs.write_file(&resolved, content.as_bytes()).await {
            return Ok(format_fs_error(&e, &shown, "writing"));
        }

        debug!(path = %shown, bytes = content.len(), "file written");
        Ok(text_result(format!("Successfully wrote to new file: {shown}"), false)
            .with_details(json!({"filePath": shown, "bytesWritten": content.len()})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFs, assert_error, make_ctx};

    #[tokio::test]
    async fn creates_new_file() {
        let fs = Arc::new(MockFs::new().with_dir("/tmp"));
        let tool = WriteFileTool::new(fs.clone());
        let r = tool
            .execute(json!({"filepath": "new.txt", "content": "hi"}), &make_ctx())
            .await
            .unwrap();
        assert!(!r.is_error());
        assert_eq!(fs.contents("/tmp/new.txt").as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn successful_write_logs_the_resolved_path() {
        let (logs, _guard) = tide_core::logging::capture_logs();
        let tool = WriteFileTool::new(Arc::new(MockFs::new().with_dir("/tmp")));
        let r = tool
            .execute(json!({"filepath": "log.txt", "content": "abc"}), &make_ctx())
            .await
            .unwrap();
        assert!(!r.is_error());
        assert!(logs.has_message("file written"));
        assert!(logs.has_field("path", "/tmp/log.txt"));
        assert!(logs.has_field("bytes", "3"));
    }

    #[tokio::test]
    async fn refuses_existing_file() {
        let fs = Arc::new(MockFs::new().with_file("/tmp/a.txt", "old"));
        let tool = WriteFileTool::new(fs.clone());
        let r = tool
            .execute(json!({"filepath": "/tmp/a.txt", "content": "new"}), &make_ctx())
            .await
            .unwrap();
        assert_error(&r, "already exists");
        assert_eq!(fs.contents("/tmp/a.txt").as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn empty_content_is_allowed() {
        let fs = Arc::new(MockFs::new());
        let tool = WriteFileTool::new(fs.clone());
        let r = tool
            .execute(json!({"filepath": "/tmp/deep/empty.txt", "content": ""}), &make_ctx())
            .await
            .unwrap();
        assert!(!r.is_error());
        assert_eq!(fs.contents("/tmp/deep/empty.txt").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn missing_content_is_error() {
        let tool = WriteFileTool::new(Arc::new(MockFs::new()));
        let r = tool.execute(json!({"filepath": "/tmp/x"}), &make_ctx()).await.unwrap();
        assert_error(&r, "content");
    }

    #[tokio::test]
    async fn creates_parent_directories_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(crate::providers::RealFileSystem));
        let ctx = crate::testing::make_ctx_in(&dir.path().to_string_lossy());
        let r = tool
            .execute(json!({"filepath": "a/b/c.txt", "content": "deep"}), &ctx)
            .await
            .unwrap();
        assert!(!r.is_error(), "{}", r.content);
        let written = std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap();
        assert_eq!(written, "deep");
    }
}
