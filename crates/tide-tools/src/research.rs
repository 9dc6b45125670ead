//! `research_codebase` tool: delegates a question to a nested read-only agent.
//!
//! The nested agent is reached through [`ResearchDelegate`]. Whatever goes
//! wrong inside it comes back as a single error result; nothing from the
//! nested run escapes as an `Err`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, text_result};
use tracing::{debug, warn};

use crate::errors::ToolError;
use crate::traits::{AgentTool, ResearchDelegate, ResearchRequest, ToolContext};
use crate::utils::validation::{get_optional_string_list, get_optional_u64, validate_required_string};

/// The `research_codebase` tool.
pub struct ResearchCodebaseTool {
    delegate: Arc<dyn ResearchDelegate>,
    max_files: usize,
}

impl ResearchCodebaseTool {
    /// Create the tool. `max_files` is the hard cap on files analyzed.
    pub fn new(delegate: Arc<dyn ResearchDelegate>, max_files: usize) -> Self {
        Self {
            delegate,
            max_files: max_files.max(1),
        }
    }
}

#[async_trait]
impl AgentTool for ResearchCodebaseTool {
    fn name(&self) -> &str {
        "research_codebase"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Delegation
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "research_codebase".into(),
            description: format!(
                "Delegate a codebase research question to a read-only sub-agent. Analyzes at most {} files.",
                self.max_files
            ),
            parameters: ToolParameterSchema::object(
                vec![
                    ("query", json!({"type": "string", "description": "What to find in the codebase"})),
                    ("directories", json!({"type": "array", "items": {"type": "string"}, "description": "Directories to search (default [\".\"])"})),
                    ("max_files", json!({"type": "number", "description": "Maximum files to analyze"})),
                ],
                &["query"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let query = match validate_required_string(&params, "query", "research question") {
            Ok(q) => q,
            Err(e) => return Ok(e),
        };
        let directories = get_optional_string_list(&params, "directories")
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| vec![".".into()]);
        let requested = get_optional_u64(&params, "max_files")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(self.max_files);
        let max_files = requested.clamp(1, self.max_files);

        let request = ResearchRequest {
            query,
            directories,
            max_files,
        };
        debug!(query = %request.query, max_files, "delegating research");

        match self.delegate.research(request, ctx).await {
            Ok(findings) => Ok(text_result(findings, false)),
            Err(e) => {
                warn!(error = %e, category = e.category(), "research delegation failed");
                Ok(text_result(
                    format!(
                        "Research failed: {e}\nTry simplifying the query or reducing the scope."
                    ),
                    true,
                )
                .with_details(json!({"error": true, "errorType": e.category()})))
            }
        }
    }
}
