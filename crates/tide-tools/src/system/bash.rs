//! `bash` tool: shell command execution with timeout and danger detection.
//!
//! Spawns `bash -c <command>` through the [`ProcessRunner`] seam. Commands
//! matching destructive patterns (recursive delete of `/`, fork bombs, raw
//! device writes) are blocked before spawning. Output is truncated past a
//! character budget.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};
use tracing::warn;

use crate::errors::ToolError;
use crate::traits::{AgentTool, ProcessOptions, ProcessRunner, ToolContext, resolve_in};
use crate::utils::validation::{get_optional_string, get_optional_u64, validate_required_string};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_OUTPUT_CHARS: usize = 50_000;

/// The `bash` tool.
pub struct BashTool {
    runner: Arc<dyn ProcessRunner>,
    danger_patterns: Vec<Regex>,
}

impl BashTool {
    /// Create a new `bash` tool with the given process runner.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            danger_patterns: compile_danger_patterns(),
        }
    }

    fn is_dangerous(&self, command: &str) -> bool {
        self.danger_patterns.iter().any(|p| p.is_match(command))
    }
}

fn compile_danger_patterns() -> Vec<Regex> {
    [
        r"rm\s+(-[^\s]*\s+)*-[^\s]*[rR][^\s]*\s+/($|\s|;|\|)",
        r"rm\s+(-[^\s]*\s+)*-[^\s]*[rR][^\s]*\s+/\*",
        r"rm\s+(-[^\s]*\s+)*-[^\s]*[rR][^\s]*\s+~/?($|\s)",
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        r"dd\s+.*of=/dev/(sd|hd|nvme)",
        r"mkfs(\.\w+)?\s+/dev/",
        r">\s*/dev/(sd|hd|nvme)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

fn truncate_chars(s: &mut String, max: usize) -> bool {
    if s.len() <= max {
        return false;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str("\n... [output truncated]");
    true
}

#[async_trait]
impl AgentTool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Shell
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "bash".into(),
            description: "Execute a bash command and return its exit code and output.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("command", json!({"type": "string", "description": "The command to run"})),
                    ("cwd", json!({"type": "string", "description": "Working directory (default: session working directory)"})),
                    ("env", json!({"type": "object", "description": "Extra environment variables", "additionalProperties": {"type": "string"}})),
                    ("timeout", json!({"type": "number", "description": "Timeout in seconds (default 30, max 300)"})),
                ],
                &["command"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let command = match validate_required_string(&params, "command", "the shell command") {
            Ok(c) => c,
            Err(e) => return Ok(e),
        };

        if self.is_dangerous(&command) {
            warn!(command, "blocked dangerous command");
            return Ok(error_result(format!(
                "Command blocked: potentially destructive pattern detected in `{command}`"
            )));
        }

        let working_directory = get_optional_string(&params, "cwd").map_or_else(
            || ctx.working_directory.clone(),
            |cwd| resolve_in(ctx, &cwd).to_string_lossy().into_owned(),
        );
        let timeout_secs = get_optional_u64(&params, "timeout")
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);
        let env: HashMap<String, String> = params
            .get("env")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_owned())))
                    .collect()
            })
            .unwrap_or_default();

        let opts = ProcessOptions {
            working_directory,
            timeout_ms: timeout_secs * 1000,
            cancellation: ctx.cancellation.clone(),
            env,
        };

        let output = self.runner.run_command(&command, &opts).await?;

        if output.interrupted {
            return Ok(error_result(format!("Command interrupted: {command}")));
        }
        if output.timed_out {
            return Ok(error_result(format!("Command timed out after {timeout_secs}s: {command}")));
        }

        let mut stdout = output.stdout;
        let mut stderr = output.stderr;
        let truncated = truncate_chars(&mut stdout, MAX_OUTPUT_CHARS) | truncate_chars(&mut stderr, MAX_OUTPUT_CHARS);

        let mut body = format!("Exit code: {}\n", output.exit_code);
        if !stdout.trim().is_empty() {
            let _ = write!(body, "\nSTDOUT:\n{}\n", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            let _ = write!(body, "\nSTDERR:\n{}\n", stderr.trim_end());
        }
        if stdout.trim().is_empty() && stderr.trim().is_empty() {
            body.push_str("\n(no output)\n");
        }

        Ok(text_result(body, output.exit_code != 0).with_details(json!({
            "exitCode": output.exit_code,
            "durationMs": output.duration_ms,
            "truncated": truncated,
        })))
    }
}
