//! What the model sees of a tool, and what a tool hands back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Object-typed JSON Schema describing a tool's arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Always `object` for tools built here.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Schema per argument name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Arguments the model must supply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolParameterSchema {
    /// Build an object schema. An empty `required` list is omitted.
    #[must_use]
    pub fn object(properties: Vec<(&str, Value)>, required: &[&str]) -> Self {
        let required: Vec<String> = required.iter().map(ToString::to_string).collect();
        Self {
            schema_type: "object".to_owned(),
            properties: Some(properties.into_iter().map(|(name, schema)| (name.to_owned(), schema)).collect()),
            required: if required.is_empty() { None } else { Some(required) },
        }
    }
}

/// Declaration advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Name the model calls the tool by.
    pub name: String,
    /// When to use it.
    pub description: String,
    /// Argument schema.
    pub parameters: ToolParameterSchema,
}

/// Coarse grouping of tools, used in logs and result metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Reads or writes files.
    Filesystem,
    /// Runs processes.
    Shell,
    /// Finds files or content.
    Search,
    /// Hands work to a nested agent.
    Delegation,
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Output of one tool execution.
///
/// A failure the model should see and recover from is a result with
/// `is_error` set, never a Rust error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentToolResult {
    /// Text returned to the model.
    pub content: String,
    /// Tool-specific metadata, not shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// `Some(true)` on failure; absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl AgentToolResult {
    /// Whether the tool failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error == Some(true)
    }

    /// Replace the metadata.
    #[must_use]
    pub fn with_details(self, details: Value) -> Self {
        Self {
            details: Some(details),
            ..self
        }
    }
}

/// Plain text result, flagged as a failure when `is_error`.
#[must_use]
pub fn text_result(text: impl Into<String>, is_error: bool) -> AgentToolResult {
    AgentToolResult {
        content: text.into(),
        details: None,
        is_error: is_error.then_some(true),
    }
}

/// Failure result carrying `message`.
#[must_use]
pub fn error_result(message: impl Into<String>) -> AgentToolResult {
    text_result(message, true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn schema_serializes_like_json_schema() {
        let schema = ToolParameterSchema::object(
            vec![("pattern", json!({"type": "string"})), ("limit", json!({"type": "integer"}))],
            &["pattern"],
        );
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "type": "object",
                "properties": {"pattern": {"type": "string"}, "limit": {"type": "integer"}},
                "required": ["pattern"],
            })
        );
        assert_eq!(ToolParameterSchema::object(vec![], &[]).required, None);
    }

    #[test]
    fn error_flag_is_only_written_on_failure() {
        let ok = serde_json::to_value(text_result("fine", false)).unwrap();
        assert_eq!(ok, json!({"content": "fine"}));

        let failed = error_result("no such file").with_details(json!({"errorType": "io"}));
        assert!(failed.is_error());
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["details"]["errorType"], "io");
    }

    #[test]
    fn category_names() {
        assert_eq!(serde_json::to_value(ToolCategory::Delegation).unwrap(), "delegation");
    }
}
