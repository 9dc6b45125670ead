//! `grep` tool: regex or literal content search.
//!
//! Walks the tree under `directory`, skipping build/hidden directories,
//! binary files and files over 1 MiB. Results are `file:line: content`,
//! optionally with surrounding context lines.

use std::fmt::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use regex::{Regex, RegexBuilder};
use serde_json::{Value, json};
use tide_core::tools::{AgentToolResult, Tool, ToolCategory, ToolParameterSchema, error_result, text_result};

use crate::errors::ToolError;
use crate::traits::{AgentTool, ToolContext, resolve_in};
use crate::utils::path::{is_hidden_name, is_skipped_dir};
use crate::utils::validation::{get_optional_bool, get_optional_string, get_optional_u64, validate_required_string};

const DEFAULT_MAX_RESULTS: usize = 50;
const DEFAULT_CONTEXT_LINES: usize = 2;
const MAX_CONTEXT_LINES: usize = 10;
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const MAX_LINE_CHARS: usize = 300;

/// A single match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrepMatch {
    /// Path relative to the search root.
    pub file: String,
    /// 1-indexed line number.
    pub line: usize,
    /// The matching line, trimmed.
    pub content: String,
    /// Context lines before and after, as `(line_number, text)`.
    pub context: Vec<(usize, String)>,
}

struct GrepQuery {
    root: PathBuf,
    regex: Regex,
    include: Option<GlobMatcher>,
    exclude: Option<GlobMatcher>,
    max_results: usize,
    context_lines: usize,
}

fn clip(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() > MAX_LINE_CHARS {
        let head: String = trimmed.chars().take(MAX_LINE_CHARS).collect();
        format!("{head}...")
    } else {
        trimmed.to_owned()
    }
}

fn run_grep(query: &GrepQuery) -> (Vec<GrepMatch>, usize) {
    let walker = walkdir::WalkDir::new(&query.root).into_iter().filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !(is_hidden_name(&name) || (e.file_type().is_dir() && is_skipped_dir(&name)))
    });

    let mut matches = Vec::new();
    let mut files_searched = 0;

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = std::path::Path::new(entry.file_name());
        if query.include.as_ref().is_some_and(|g| !g.is_match(name)) {
            continue;
        }
        if query.exclude.as_ref().is_some_and(|g| g.is_match(name)) {
            continue;
        }
        if entry.metadata().map_or(true, |m| m.len() > MAX_FILE_BYTES) {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        if bytes[..bytes.len().min(8192)].contains(&0) {
            continue;
        }
        files_searched += 1;

        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        let rel = entry
            .path()
            .strip_prefix(&query.root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();

        for (idx, line) in lines.iter().enumerate() {
            if !query.regex.is_match(line) {
                continue;
            }
            let from = idx.saturating_sub(query.context_lines);
            let to = (idx + query.context_lines + 1).min(lines.len());
            let context = (from..to)
                .filter(|&i| i != idx)
                .map(|i| (i + 1, clip(lines[i])))
                .collect();
            matches.push(GrepMatch {
                file: rel.clone(),
                line: idx + 1,
                content: clip(line),
                context,
            });
            if matches.len() >= query.max_results {
                return (matches, files_searched);
            }
        }
    }
    (matches, files_searched)
}

fn format_matches(pattern: &str, matches: &[GrepMatch], with_context: bool) -> String {
    let mut out = format!("Found {} matches for pattern: {pattern}\n", matches.len());
    for m in matches {
        if with_context {
            out.push('\n');
            for (n, text) in m.context.iter().filter(|(n, _)| *n < m.line) {
                let _ = writeln!(out, "{}-{n}- {text}", m.file);
            }
        }
        let _ = writeln!(out, "{}:{}: {}", m.file, m.line, m.content);
        if with_context {
            for (n, text) in m.context.iter().filter(|(n, _)| *n > m.line) {
                let _ = writeln!(out, "{}-{n}- {text}", m.file);
            }
        }
    }
    out
}

fn build_glob(pattern: Option<String>) -> Result<Option<GlobMatcher>, String> {
    pattern
        .filter(|p| !p.trim().is_empty())
        .map(|p| Glob::new(&p).map(|g| g.compile_matcher()).map_err(|e| e.to_string()))
        .transpose()
}

/// The `grep` tool.
#[derive(Default)]
pub struct GrepTool;

impl GrepTool {
    /// Create a new `grep` tool.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentTool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "grep".into(),
            description: "Search file contents for a literal string or regular expression.".into(),
            parameters: ToolParameterSchema::object(
                vec![
                    ("pattern", json!({"type": "string", "description": "Text or regex to search for"})),
                    ("directory", json!({"type": "string", "description": "Directory to search (default: working directory)"})),
                    ("case_sensitive", json!({"type": "boolean", "description": "Case-sensitive match (default false)"})),
                    ("use_regex", json!({"type": "boolean", "description": "Treat pattern as a regex (default false)"})),
                    ("include_files", json!({"type": "string", "description": "Only search files matching this glob, e.g. *.rs"})),
                    ("exclude_files", json!({"type": "string", "description": "Skip files matching this glob"})),
                    ("max_results", json!({"type": "number", "description": "Maximum matches (default 50)"})),
                    ("context_lines", json!({"type": "number", "description": "Context lines around each match (default 2)"})),
                ],
                &["pattern"],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<AgentToolResult, ToolError> {
        let pattern = match validate_required_string(&params, "pattern", "search pattern") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let directory = get_optional_string(&params, "directory").unwrap_or_else(|| ".".into());
        let root = resolve_in(ctx, &directory);
        if !root.is_dir() {
            return Ok(error_result(format!("Directory '{directory}' does not exist or is not a directory")));
        }

        let use_regex = get_optional_bool(&params, "use_regex").unwrap_or(false);
        let source = if use_regex { pattern.clone() } else { regex::escape(&pattern) };
        let regex = match RegexBuilder::new(&source)
            .case_insensitive(!get_optional_bool(&params, "case_sensitive").unwrap_or(false))
            .build()
        {
            Ok(r) => r,
            Err(e) => return Ok(error_result(format!("Invalid regex pattern: {e}"))),
        };

        let (include, exclude) = match (
            build_glob(get_optional_string(&params, "include_files")),
            build_glob(get_optional_string(&params, "exclude_files")),
        ) {
            (Ok(i), Ok(e)) => (i, e),
            (Err(e), _) | (_, Err(e)) => return Ok(error_result(format!("Invalid file glob: {e}"))),
        };

        let context_lines = get_optional_u64(&params, "context_lines")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_CONTEXT_LINES)
            .min(MAX_CONTEXT_LINES);
        let query = GrepQuery {
            root,
            regex,
            include,
            exclude,
            max_results: get_optional_u64(&params, "max_results")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_RESULTS),
            context_lines,
        };

        let (matches, files_searched) = tokio::task::spawn_blocking(move || run_grep(&query))
            .await
            .map_err(|e| ToolError::Internal {
                message: format!("grep worker failed: {e}"),
            })?;

        if matches.is_empty() {
            return Ok(text_result(format!("No matches found for pattern: {pattern}"), false)
                .with_details(json!({"matches": 0, "filesSearched": files_searched})));
        }

        Ok(text_result(format_matches(&pattern, &matches, context_lines > 0), false)
            .with_details(json!({"matches": matches.len(), "filesSearched": files_searched})))
    }
}
