//! Turn state machine.
//!
//! ```text
//! USER_INPUT → ASSISTANT → TOOL_EXECUTION → RESPONSE
//!              ASSISTANT → RESPONSE
//!              RESPONSE  → ASSISTANT            (continue)
//! ```
//!
//! `RESPONSE` is terminal for a turn unless the loop continues. An invalid
//! transition is an error, never coerced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::RuntimeError;

/// Phase of the current turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    /// Waiting for (or just received) user input.
    #[default]
    UserInput,
    /// Model request in flight.
    Assistant,
    /// Tool calls being dispatched.
    ToolExecution,
    /// Model response fully processed.
    Response,
}

impl TurnState {
    /// States reachable from `self`.
    ///
    /// A state listed as following itself accepts a self-transition as a no-op.
    pub fn successors(self) -> &'static [TurnState] {
        match self {
            Self::UserInput => &[Self::Assistant],
            Self::Assistant => &[Self::Assistant, Self::ToolExecution, Self::Response],
            Self::ToolExecution => &[Self::ToolExecution, Self::Response],
            Self::Response => &[Self::Assistant],
        }
    }

    /// Whether `self → to` is allowed.
    pub fn can_transition_to(self, to: TurnState) -> bool {
        self.successors().contains(&to)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserInput => write!(f, "USER_INPUT"),
            Self::Assistant => write!(f, "ASSISTANT"),
            Self::ToolExecution => write!(f, "TOOL_EXECUTION"),
            Self::Response => write!(f, "RESPONSE"),
        }
    }
}

/// Current turn state plus the completion flag set in `RESPONSE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnStateMachine {
    state: TurnState,
    completion_detected: bool,
}

impl TurnStateMachine {
    /// A machine in `USER_INPUT`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn current(&self) -> TurnState {
        self.state
    }

    /// Move to `to`, or fail with [`RuntimeError::InvalidStateTransition`].
    pub fn transition_to(&mut self, to: TurnState) -> Result<(), RuntimeError> {
        if !self.state.can_transition_to(to) {
            return Err(RuntimeError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Whether a transition to `to` would be accepted.
    pub fn can_transition_to(&self, to: TurnState) -> bool {
        self.state.can_transition_to(to)
    }

    /// Mark that the detector decided the turn is complete.
    pub fn set_completion_detected(&mut self, detected: bool) {
        self.completion_detected = detected;
    }

    /// Whether completion was detected, regardless of state.
    pub fn completion_detected(&self) -> bool {
        self.completion_detected
    }

    /// Whether the turn ended in `RESPONSE` with completion detected.
    pub fn is_completed(&self) -> bool {
        self.state == TurnState::Response && self.completion_detected
    }

    /// Back to `USER_INPUT` with the completion flag cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
