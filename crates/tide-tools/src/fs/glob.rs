//! `glob` tool: glob-based file search.
//!
//! Walks the tree under `directory` and matches paths relative to it.
//! A pattern without a `/` in recursive mode matches file names at any
//! depth, so `*.rs` behaves like `**/*.rs`. Brace alternation
//! (`*.{rs,toml}`) is supported.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};

use crate::errors::ToolError;
use crate::traits::{AgentTool, ToolContext, resolve_in};
use crate::utils::path::{is_hidden_name, is_skipped_dir};
use crate::utils::validation::{get_optional_bool, get_optional_string, get_optional_u64, validate_required_string};

const DEFAULT_MAX_RESULTS: usize = 5000;

/// The `glob` tool.
#[derive(Default)]
pub struct GlobTool;

impl GlobTool {
    /// Create a new `glob` tool.
    pub fn new() -> Self {
        Self
    }
}

struct GlobQuery {
    root: PathBuf,
    matcher: GlobMatcher,
    match_name_only: bool,
    recursive: bool,
    include_hidden: bool,
    max_results: usize,
}

fn run_glob(query: &GlobQuery) -> Vec<String> {
    let mut walker = walkdir::WalkDir::new(&query.root).follow_links(false);
    if !query.recursive {
        walker = walker.max_depth(1);
    }
    let include_hidden = query.include_hidden;
    let iter = walker.into_iter().filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        if e.file_type().is_dir() && is_skipped_dir(&name) {
            return false;
        }
        include_hidden || !is_hidden_name(&name)
    });

    let mut matches = Vec::new();
    for entry in iter.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&query.root) else {
            continue;
        };
        let candidate: &Path = if query.match_name_only {
            Path::new(entry.file_name())
        } else {
            rel
        };
        if query.matcher.is_match(candidate) {
            matches.push(rel.to_string_lossy().into_owned());
            if matches.len() >= query.max_results {
                break;
            }
        }
    }
    matches.sort();
    matches
}

#[async_trait]
impl AgentTool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "glob".into(),
            description: "Find files by glob pattern, e.g. `**/*.rs` or `src/*.{ts,tsx}`.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("pattern", json!({"type": "string", "description": "Glob pattern to match"})),
                    ("directory", json!({"type": "string", "description": "Directory to search (default: working directory)"})),
                    ("recursive", json!({"type": "boolean", "description": "Search subdirectories (default true)"})),
                    ("include_hidden", json!({"type": "boolean", "description": "Include dotfiles (default false)"})),
                    ("max_results", json!({"type": "number", "description": "Maximum results (default 5000)"})),
                ],
                &["pattern"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let pattern = match validate_required_string(&params, "pattern", "glob pattern") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let directory = get_optional_string(&params, "directory").unwrap_or_else(|| ".".into());
        let root = resolve_in(ctx, &directory);
        if !root.is_dir() {
            return Ok(error_result(format!("Directory '{directory}' does not exist or is not a directory")));
        }

        let matcher = match GlobBuilder::new(&pattern).literal_separator(true).build() {
            Ok(g) => g.compile_matcher(),
            Err(e) => return Ok(error_result(format!("Invalid glob pattern: {e}"))),
        };
        let recursive = get_optional_bool(&params, "recursive").unwrap_or(true);
        let max_results = get_optional_u64(&params, "max_results")
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let query = GlobQuery {
            root,
            matcher,
            match_name_only: recursive && !pattern.contains('/'),
            recursive,
            include_hidden: get_optional_bool(&params, "include_hidden").unwrap_or(false),
            max_results,
        };

        let matches = tokio::task::spawn_blocking(move || run_glob(&query))
            .await
            .map_err(|e| ToolError::Internal {
                message: format!("glob worker failed: {e}"),
            })?;

        if matches.is_empty() {
            return Ok(text_result(format!("No files found matching pattern: {pattern}"), false));
        }

        let mut out = format!("Found {} files matching pattern: {pattern}\n", matches.len());
        if matches.len() >= max_results {
            let _ = writeln!(out, "(Results limited to {max_results} files)");
        }
        for m in &matches {
            let _ = writeln!(out, "{m}");
        }
        Ok(text_result(out, false).with_details(json!({"count": matches.len()})))
    }
}
