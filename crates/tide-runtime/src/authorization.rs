//! # Tool Authorization Policy
//!
//! Classifies tool names as read-only or mutating and decides whether a call
//! needs user confirmation.
//!
//! Classification comes from immutable base tables. Confirmation goes through
//! a prioritized rule chain; any rule that allows the tool skips the prompt.
//! Session grants ("always allow") and YOLO mode only ever add permission,
//! and never change whether a tool is read-only.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tools with no external side effects.
pub const READ_ONLY_TOOLS: &[&str] = &["read_file", "grep", "list_dir", "glob", "research_codebase"];

/// Tools that modify files.
pub const WRITE_TOOLS: &[&str] = &["write_file", "update_file"];

/// Tools that run arbitrary commands.
pub const EXECUTE_TOOLS: &[&str] = &["bash"];

/// Whether `tool_name` is in the read-only base table.
///
/// This is the predicate handed to the argument parser and used by the
/// dispatcher for batching.
pub fn is_read_only(tool_name: &str) -> bool {
    READ_ONLY_TOOLS.contains(&tool_name)
}

/// Authorization tier from the base tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTier {
    /// Safe to batch and repeat.
    ReadOnly,
    /// Modifies files.
    Write,
    /// Runs commands.
    Execute,
    /// Not in any table; handled as mutating.
    Unknown,
}

impl ToolTier {
    /// Tier of `tool_name`.
    pub fn of(tool_name: &str) -> Self {
        if is_read_only(tool_name) {
            Self::ReadOnly
        } else if WRITE_TOOLS.contains(&tool_name) {
            Self::Write
        } else if EXECUTE_TOOLS.contains(&tool_name) {
            Self::Execute
        } else {
            Self::Unknown
        }
    }
}

/// How a single tool name may be executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct AuthorizationDecision {
    /// In the read-only table.
    pub is_read_only: bool,
    /// May run concurrently and accept several argument objects per call.
    pub allow_concurrent_multi_object: bool,
    /// Must be confirmed by the user before running.
    pub requires_confirmation: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

/// Inputs every rule evaluates against.
#[derive(Debug)]
pub struct RuleContext<'a> {
    /// Tools allowed by the active settings template.
    pub allowed_tools: &'a HashSet<String>,
    /// Whether YOLO mode is on.
    pub yolo: bool,
    /// Tools the user approved with "always allow" this session.
    pub session_grants: &'a HashSet<String>,
}

/// One entry in the confirmation-skipping chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationRule {
    /// Read-only tools never prompt.
    ReadOnly,
    /// Tools listed in `tools.allowedTools`.
    TemplateAllowed,
    /// Everything, when YOLO mode is on.
    Yolo,
    /// Tools granted "always allow" earlier in the session.
    SessionIgnoreList,
}

impl AuthorizationRule {
    /// The full chain in evaluation order.
    pub const CHAIN: [Self; 4] = [
        Self::ReadOnly,
        Self::TemplateAllowed,
        Self::Yolo,
        Self::SessionIgnoreList,
    ];

    /// Lower priorities are evaluated first.
    pub fn priority(self) -> u16 {
        match self {
            Self::ReadOnly => 200,
            Self::TemplateAllowed => 210,
            Self::Yolo => 300,
            Self::SessionIgnoreList => 310,
        }
    }

    /// Rule name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::TemplateAllowed => "template_allowed",
            Self::Yolo => "yolo",
            Self::SessionIgnoreList => "session_ignore_list",
        }
    }

    /// Whether this rule lets `tool_name` run without confirmation.
    pub fn allows(self, tool_name: &str, ctx: &RuleContext<'_>) -> bool {
        match self {
            Self::ReadOnly => is_read_only(tool_name),
            Self::TemplateAllowed => ctx.allowed_tools.contains(tool_name),
            Self::Yolo => ctx.yolo,
            Self::SessionIgnoreList => ctx.session_grants.contains(tool_name),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Base tables plus the session's widening state.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationPolicy {
    allowed_tools: HashSet<String>,
    yolo: bool,
    session_grants: HashSet<String>,
}

impl AuthorizationPolicy {
    /// Policy with the template-allowed list and YOLO flag from settings.
    pub fn new(allowed_tools: impl IntoIterator<Item = String>, yolo: bool) -> Self {
        Self {
            allowed_tools: allowed_tools.into_iter().collect(),
            yolo,
            session_grants: HashSet::new(),
        }
    }

    /// Classify a tool name.
    pub fn classify(&self, tool_name: &str) -> AuthorizationDecision {
        let read_only = is_read_only(tool_name);
        AuthorizationDecision {
            is_read_only: read_only,
            allow_concurrent_multi_object: read_only,
            requires_confirmation: self.allowing_rule(tool_name).is_none(),
        }
    }

    /// Same predicate as [`is_read_only`]; session state never affects it.
    pub fn is_read_only(&self, tool_name: &str) -> bool {
        is_read_only(tool_name)
    }

    /// First rule in the chain that allows `tool_name`, if any.
    pub fn allowing_rule(&self, tool_name: &str) -> Option<AuthorizationRule> {
        let ctx = RuleContext {
            allowed_tools: &self.allowed_tools,
            yolo: self.yolo,
            session_grants: &self.session_grants,
        };
        AuthorizationRule::CHAIN
            .into_iter()
            .find(|rule| rule.allows(tool_name, &ctx))
    }

    /// Record an "always allow" answer for the rest of the session.
    pub fn grant_always(&mut self, tool_name: &str) {
        if self.session_grants.insert(tool_name.to_string()) {
            debug!(tool_name, "tool added to session ignore list");
        }
    }

    /// Turn YOLO mode on for the rest of the session.
    pub fn enable_yolo(&mut self) {
        self.yolo = true;
    }

    /// Whether YOLO mode is on.
    pub fn yolo(&self) -> bool {
        self.yolo
    }

    /// Tools granted "always allow" so far, sorted.
    pub fn session_grants(&self) -> Vec<&str> {
        let mut grants: Vec<&str> = self.session_grants.iter().map(String::as_str).collect();
        grants.sort_unstable();
        grants
    }
}
