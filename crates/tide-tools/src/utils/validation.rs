//! Parameter extraction helpers.
//!
//! Required-parameter failures come back as ready-made error results so a
//! tool can `return Ok(e)` without inventing its own message format.

use serde_json::Value;
use tide_core::tools::{AgentToolResult, error_result};

/// Extract a required non-empty string parameter.
pub fn validate_required_string(params: &Value, key: &str, what: &str) -> Result<String, AgentToolResult> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_owned()),
        Some(_) => Err(error_result(format!("Parameter '{key}' ({what}) must not be empty"))),
        None => Err(error_result(format!("Missing required parameter '{key}' ({what})"))),
    }
}

/// Extract a required string parameter that may be empty.
pub fn validate_present_string(params: &Value, key: &str, what: &str) -> Result<String, AgentToolResult> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| error_result(format!("Missing required parameter '{key}' ({what})")))
}

/// Optional string parameter.
pub fn get_optional_string(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Optional unsigned integer parameter. Accepts numeric strings too.
pub fn get_optional_u64(params: &Value, key: &str) -> Option<u64> {
    let value = params.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Optional boolean parameter.
pub fn get_optional_bool(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

/// Optional list of strings. A single string is accepted as a one-item list.
pub fn get_optional_string_list(params: &Value, key: &str) -> Option<Vec<String>> {
    match params.get(key)? {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}
