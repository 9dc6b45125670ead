//! Session state.
//!
//! The ordered message log, usage totals, and the current turn state. Outside
//! this crate the session is read-only; the recorder appends, and the
//! history cleanup is the only path that removes entries.

use serde::{Deserialize, Serialize};
use tide_core::ids::SessionId;
use tide_core::messages::Message;
use tide_core::usage::SessionUsage;

use crate::state::{TurnState, TurnStateMachine};

/// Everything that survives between turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    session_id: SessionId,
    created_at: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    usage: SessionUsage,
    #[serde(default)]
    turn: TurnStateMachine,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh, empty session.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// A fresh session with a known id.
    pub fn with_id(session_id: SessionId) -> Self {
        Self {
            session_id,
            created_at: chrono::Utc::now().to_rfc3339(),
            messages: Vec::new(),
            usage: SessionUsage::default(),
            turn: TurnStateMachine::new(),
        }
    }

    /// Session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// RFC 3339 creation time.
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// Message log, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Usage figures.
    pub fn usage(&self) -> &SessionUsage {
        &self.usage
    }

    /// Current turn state.
    pub fn current_state(&self) -> TurnState {
        self.turn.current()
    }

    /// State machine, for status display.
    pub fn turn(&self) -> &TurnStateMachine {
        &self.turn
    }

    /// Text of the most recent assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn usage_mut(&mut self) -> &mut SessionUsage {
        &mut self.usage
    }

    pub(crate) fn turn_mut(&mut self) -> &mut TurnStateMachine {
        &mut self.turn
    }

    pub(crate) fn messages_mut(&mut self) -> &mut Vec<Message> {
        &mut self.messages
    }
}
