//! Nested research agent behind the `research_codebase` tool.
//!
//! Each request runs a fresh session through its own [`TurnController`]
//! holding only read-only tools. Any failure inside becomes one
//! [`ToolError::Delegation`].

use std::sync::Arc;

use async_trait::async_trait;
use tide_llm::provider::Provider;
use tide_tools::errors::ToolError;
use tide_tools::registry::ToolRegistry;
use tide_tools::traits::{ResearchDelegate, ResearchRequest, ToolContext};
use tracing::{debug, instrument, warn};

use crate::authorization::AuthorizationPolicy;
use crate::confirm::AutoApprove;
use crate::controller::{TurnConfig, TurnController};
use crate::prompts::{RESEARCH_PROMPT, build_system_prompt};
use crate::session::SessionState;
use crate::types::TurnOutcome;

/// Runs research questions on a read-only sub-agent.
pub struct NestedResearchAgent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    max_iterations: u32,
    base: TurnConfig,
}

impl NestedResearchAgent {
    /// Sub-agent over `registry`, which should hold read-only tools only.
    pub fn new(provider: Arc<dyn Provider>, registry: ToolRegistry, base: TurnConfig, max_iterations: u32) -> Self {
        Self {
            provider,
            registry,
            max_iterations: max_iterations.max(1),
            base,
        }
    }

    fn config_for(&self, working_directory: &str) -> TurnConfig {
        TurnConfig {
            max_iterations: self.max_iterations,
            system_prompt: Some(build_system_prompt(RESEARCH_PROMPT, working_directory, "")),
            working_directory: working_directory.to_string(),
            completion_marker: String::new(),
            ..self.base.clone()
        }
    }
}

/// First user message of a research session.
pub fn research_prompt(request: &ResearchRequest) -> String {
    format!(
        "Research question: {}\nSearch within: {}\nRead at most {} files in full.",
        request.query,
        request.directories.join(", "),
        request.max_files
    )
}

#[async_trait]
impl ResearchDelegate for NestedResearchAgent {
    #[instrument(skip_all, fields(tool_call_id = %ctx.tool_call_id, max_files = request.max_files))]
    async fn research(&self, request: ResearchRequest, ctx: &ToolContext) -> Result<String, ToolError> {
        let mut controller = TurnController::new(
            self.provider.clone(),
            self.registry.clone(),
            AuthorizationPolicy::default(),
            Arc::new(AutoApprove),
            self.config_for(&ctx.working_directory),
        )
        .with_cancel_token(ctx.cancellation.clone());
        let mut session = SessionState::new();

        let outcome = controller
            .process_turn(&mut session, &research_prompt(&request))
            .await
            .map_err(|e| {
                warn!(category = e.category(), error = %e, "research agent failed");
                ToolError::Delegation { message: e.to_string() }
            })?;

        let findings = session.last_assistant_text().unwrap_or_default().trim().to_string();
        debug!(%outcome, iterations = controller.last_iterations(), "research finished");

        match outcome {
            TurnOutcome::Complete if !findings.is_empty() => Ok(findings),
            TurnOutcome::Complete => Err(ToolError::Delegation {
                message: "research agent returned no findings".into(),
            }),
            TurnOutcome::Truncated => Ok(format!("{findings}\n\n[research output was truncated]")),
            TurnOutcome::CapReached if findings.is_empty() => Err(ToolError::Delegation {
                message: format!(
                    "research agent reached its limit of {} iterations without findings",
                    self.max_iterations
                ),
            }),
            TurnOutcome::CapReached => Ok(format!(
                "{findings}\n\n[research stopped at the iteration limit]"
            )),
        }
    }
}
