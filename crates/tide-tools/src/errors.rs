//! Faults a tool reports from `execute`.
//!
//! Expected failures (missing file, bad parameter) are error-flagged results,
//! not `ToolError`s. What remains here is what a tool cannot describe itself;
//! the dispatcher still turns each into an error-flagged result.

use thiserror::Error;

/// A tool fault.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments cannot be acted on.
    #[error("invalid arguments: {message}")]
    Validation {
        /// What is wrong.
        message: String,
    },

    /// Operating-system failure outside the filesystem seam's own reporting.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The tool observed its cancellation token.
    #[error("cancelled")]
    Cancelled,

    /// A nested agent behind the tool failed.
    #[error("delegation failed: {message}")]
    Delegation {
        /// Why the nested agent failed.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl ToolError {
    /// Error category string for logs and result details.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Io(_) => "io",
            Self::Cancelled => "cancelled",
            Self::Delegation { .. } => "delegation",
            Self::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegation_message() {
        let err = ToolError::Delegation {
            message: "Operation cancelled".into(),
        };
        assert_eq!(err.to_string(), "delegation failed: Operation cancelled");
        assert_eq!(err.category(), "delegation");
    }

    #[test]
    fn io_converts() {
        let err = ToolError::from(std::io::Error::other("pipe closed"));
        assert_eq!(err.category(), "io");
        assert!(err.to_string().contains("pipe closed"));
    }
}
