//! Runtime error types.

use tide_llm::provider::ProviderError;

use crate::state::TurnState;

/// Errors that end a turn.
///
/// Tool failures never appear here: the dispatcher turns them into
/// error-flagged results that go back to the model.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// LLM provider error after the transport gave up retrying.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The user aborted the turn from a confirmation prompt.
    #[error("Turn aborted by user")]
    UserAbort,

    /// The turn's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// The turn exceeded its global time limit.
    #[error("Turn timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured limit in milliseconds.
        timeout_ms: u64,
    },

    /// The turn state machine was asked for a transition it does not allow.
    #[error("Invalid state transition: {from} → {to}")]
    InvalidStateTransition {
        /// State before the attempted transition.
        from: TurnState,
        /// Requested state.
        to: TurnState,
    },

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the user can simply try the turn again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::UserAbort | Self::Cancelled | Self::Timeout { .. } => true,
            Self::InvalidStateTransition { .. } | Self::Internal(_) => false,
        }
    }

    /// Whether this error came from an interruption rather than a failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::UserAbort | Self::Cancelled | Self::Timeout { .. })
    }

    /// Error category string for logs and status display.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::UserAbort => "user_abort",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message() {
        let err = RuntimeError::InvalidStateTransition {
            from: TurnState::UserInput,
            to: TurnState::ToolExecution,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition: USER_INPUT → TOOL_EXECUTION"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn interruptions_are_recoverable() {
        for err in [
            RuntimeError::UserAbort,
            RuntimeError::Cancelled,
            RuntimeError::Timeout { timeout_ms: 10 },
        ] {
            assert!(err.is_interruption());
            assert!(err.is_recoverable());
        }
        assert!(!RuntimeError::Internal("boom".into()).is_interruption());
    }

    #[test]
    fn provider_recoverability_follows_retryability() {
        let err = RuntimeError::from(ProviderError::Auth {
            message: "bad key".into(),
        });
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "provider");

        let err = RuntimeError::from(ProviderError::Api {
            status: 503,
            message: "down".into(),
            retryable: true,
        });
        assert!(err.is_recoverable());
    }

    #[test]
    fn categories() {
        assert_eq!(RuntimeError::UserAbort.category(), "user_abort");
        assert_eq!(RuntimeError::Timeout { timeout_ms: 1 }.category(), "timeout");
        assert_eq!(RuntimeError::Timeout { timeout_ms: 1500 }.to_string(), "Turn timed out after 1500ms");
    }
}
