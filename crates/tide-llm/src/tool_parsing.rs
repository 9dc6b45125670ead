//! # Tool Argument Recovery
//!
//! Models sometimes stream several argument objects into one tool call
//! (`{"path":"a"}{"path":"b"}`) or wrap them in stray text. This module
//! recovers every well-formed top-level object from such a fragment.
//!
//! Recovering more than one object is only accepted when the caller-supplied
//! `is_read_only` predicate says the tool is safe to run repeatedly. The
//! parser knows nothing else about tool policy.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A JSON object of tool arguments.
pub type JsonObject = Map<String, Value>;

/// Maximum characters of a candidate shown in logs.
const PREVIEW_CHARS: usize = 100;

/// Argument recovery failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ToolArgsError {
    /// No well-formed JSON object could be recovered.
    #[error("Invalid tool arguments: {message}")]
    Parse {
        /// Description of the failure.
        message: String,
    },

    /// Several objects were recovered for a tool that must run once.
    #[error(
        "Tool '{tool_name}' received {objects_found} concatenated JSON objects; only read-only tools accept multiple argument sets"
    )]
    Concatenated {
        /// Tool the arguments were meant for.
        tool_name: String,
        /// Number of objects recovered.
        objects_found: usize,
    },
}

impl ToolArgsError {
    /// Error category string for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Concatenated { .. } => "concatenated_json",
        }
    }
}

/// Recover tool argument objects from a raw fragment.
///
/// 1. Blank input means "no arguments" and yields one empty object.
/// 2. A fragment that parses as a single object is returned as-is.
/// 3. Otherwise top-level `{...}` candidates are split out and parsed one by
///    one, skipping malformed candidates.
///
/// When more than one object is recovered, `is_read_only(tool_name)` must
/// hold or [`ToolArgsError::Concatenated`] is returned. A missing tool name
/// is treated as not read-only.
pub fn parse_tool_arguments<P>(
    raw: &str,
    tool_name: Option<&str>,
    is_read_only: P,
) -> Result<Vec<JsonObject>, ToolArgsError>
where
    P: Fn(&str) -> bool,
{
    if raw.trim().is_empty() {
        return Ok(vec![JsonObject::new()]);
    }

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) {
        return Ok(vec![obj]);
    }

    let objects = split_concatenated_json(raw)?;
    if objects.len() > 1 {
        let safe = tool_name.is_some_and(&is_read_only);
        if !safe {
            let tool_name = tool_name.unwrap_or("unknown").to_owned();
            warn!(
                tool_name,
                objects_found = objects.len(),
                "refusing concatenated arguments for non-read-only tool"
            );
            return Err(ToolArgsError::Concatenated {
                tool_name,
                objects_found: objects.len(),
            });
        }
        debug!(
            tool_name = tool_name.unwrap_or("unknown"),
            objects_found = objects.len(),
            "recovered concatenated arguments for read-only tool"
        );
    }
    Ok(objects)
}

/// Split a fragment into its top-level JSON objects.
///
/// Brace depth is tracked outside string literals only, honoring backslash
/// escapes. Candidates that fail to parse (or parse to a non-object) are
/// skipped; if none survive, a [`ToolArgsError::Parse`] is returned.
pub fn split_concatenated_json(raw: &str) -> Result<Vec<JsonObject>, ToolArgsError> {
    let mut objects = Vec::new();
    let mut candidates = 0usize;
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in raw.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        candidates += 1;
                        let candidate = &raw[s..=i];
                        match serde_json::from_str::<Value>(candidate) {
                            Ok(Value::Object(obj)) => objects.push(obj),
                            Ok(_) => {}
                            Err(e) => debug!(
                                error = %e,
                                candidate = preview(candidate),
                                "skipping malformed argument candidate"
                            ),
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if objects.is_empty() {
        let message = if candidates == 0 {
            "no JSON object found".to_owned()
        } else {
            format!("none of {candidates} JSON candidates could be parsed")
        };
        return Err(ToolArgsError::Parse { message });
    }
    Ok(objects)
}

fn preview(s: &str) -> String {
    s.chars().take(PREVIEW_CHARS).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::json;

    fn read_only(name: &str) -> bool {
        matches!(name, "read_file" | "grep" | "list_dir" | "glob")
    }

    fn obj(v: Value) -> JsonObject {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    // -- single object --

    #[test]
    fn single_object_fast_path() {
        let out = parse_tool_arguments(r#"{"path":"a.py"}"#, Some("write_file"), read_only).unwrap();
        assert_eq!(out, vec![obj(json!({"path": "a.py"}))]);
    }

    #[test]
    fn blank_means_no_arguments() {
        let out = parse_tool_arguments("  ", Some("bash"), read_only).unwrap();
        assert_eq!(out, vec![JsonObject::new()]);
    }

    #[test]
    fn object_wrapped_in_text() {
        let out = parse_tool_arguments(r#"args: {"pattern":"fn"} ok"#, Some("bash"), read_only).unwrap();
        assert_eq!(out, vec![obj(json!({"pattern": "fn"}))]);
    }

    // -- concatenated --

    #[test]
    fn concatenated_read_only_returns_all() {
        let out = parse_tool_arguments(r#"{"path":"a.py"}{"path":"b.py"}"#, Some("read_file"), read_only)
            .unwrap();
        assert_eq!(
            out,
            vec![obj(json!({"path": "a.py"})), obj(json!({"path": "b.py"}))]
        );
    }

    #[test]
    fn concatenated_mutating_is_rejected() {
        let err = parse_tool_arguments(r#"{"path":"a.py"}{"path":"b.py"}"#, Some("write_file"), read_only)
            .unwrap_err();
        assert_eq!(
            err,
            ToolArgsError::Concatenated {
                tool_name: "write_file".into(),
                objects_found: 2
            }
        );
    }

    #[test]
    fn concatenated_without_tool_name_is_rejected() {
        let err = parse_tool_arguments("{}{}", None, read_only).unwrap_err();
        assert_matches!(err, ToolArgsError::Concatenated { objects_found: 2, .. });
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let raw = r#"{"pattern":"fn main() {"}{"pattern":"}\"{"}"#;
        let out = parse_tool_arguments(raw, Some("grep"), read_only).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["pattern"], "fn main() {");
        assert_eq!(out[1]["pattern"], "}\"{");
    }

    #[test]
    fn nested_objects_count_as_one() {
        let out = parse_tool_arguments(r#"{"a":{"b":{"c":1}}} {"d":2}"#, Some("glob"), read_only).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["a"]["b"]["c"], 1);
    }

    #[test]
    fn malformed_candidate_is_skipped() {
        let out = parse_tool_arguments(r#"{"path":"a.py"}{"path":}{"path":"c.py"}"#, Some("read_file"), read_only)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["path"], "c.py");
    }

    #[test]
    fn skipped_candidate_leaves_single_object_for_mutating_tool() {
        let out = parse_tool_arguments(r#"{"path":"a.py"}{broken}"#, Some("write_file"), read_only).unwrap();
        assert_eq!(out.len(), 1);
    }

    // -- failures --

    #[test]
    fn nothing_recoverable_is_parse_error() {
        let err = parse_tool_arguments("not json", Some("read_file"), read_only).unwrap_err();
        assert_matches!(err, ToolArgsError::Parse { .. });
        assert_eq!(err.category(), "parse");
    }

    #[test]
    fn truncated_object_is_parse_error() {
        let err = split_concatenated_json(r#"{"path": "a.py""#).unwrap_err();
        assert_eq!(
            err,
            ToolArgsError::Parse {
                message: "no JSON object found".into()
            }
        );
    }

    #[test]
    fn all_candidates_malformed() {
        let err = split_concatenated_json("{a}{b}").unwrap_err();
        assert!(err.to_string().contains("none of 2"));
    }

    #[test]
    fn bare_array_is_scanned_for_objects() {
        let out = split_concatenated_json(r#"[{"x":1}]"#).unwrap();
        assert_eq!(out, vec![obj(json!({"x": 1}))]);
    }

    // -- properties --

    fn arb_object() -> impl Strategy<Value = JsonObject> {
        proptest::collection::btree_map("[a-z]{1,6}", "[ -~]{0,12}", 0..4).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn concatenation_recovers_every_object(objs in proptest::collection::vec(arb_object(), 1..6)) {
            let raw: String = objs
                .iter()
                .map(|o| serde_json::to_string(o).unwrap())
                .collect();
            let out = parse_tool_arguments(&raw, Some("read_file"), read_only).unwrap();
            prop_assert_eq!(out, objs);
        }

        #[test]
        fn mutating_tools_accept_exactly_one(objs in proptest::collection::vec(arb_object(), 1..6)) {
            let raw: String = objs
                .iter()
                .map(|o| serde_json::to_string(o).unwrap())
                .collect();
            let result = parse_tool_arguments(&raw, Some("write_file"), read_only);
            if objs.len() == 1 {
                prop_assert_eq!(result.unwrap(), objs);
            } else {
                prop_assert_eq!(
                    result.unwrap_err(),
                    ToolArgsError::Concatenated { tool_name: "write_file".into(), objects_found: objs.len() }
                );
            }
        }
    }
}
