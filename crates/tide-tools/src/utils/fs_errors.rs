//! Consistent error results for filesystem failures.

use std::io;

use tide_core::tools::{AgentToolResult, error_result};

/// Convert an I/O error into an error result naming the path and operation.
pub fn format_fs_error(err: &io::Error, path: &str, operation: &str) -> AgentToolResult {
    let message = match err.kind() {
        io::ErrorKind::NotFound => format!("File not found: {path}"),
        io::ErrorKind::PermissionDenied => format!("Permission denied {operation} {path}"),
        _ => format!("Error {operation} {path}: {err}"),
    };
    error_result(message)
}
