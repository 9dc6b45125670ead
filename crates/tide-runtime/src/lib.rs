//! # tide-runtime
//!
//! The agent tool-orchestration loop.
//!
//! - [`TurnController`]: drives `USER_INPUT → ASSISTANT → TOOL_EXECUTION → RESPONSE`
//!   until the model stops calling tools, the stream is truncated, or the
//!   iteration cap is hit
//! - [`ToolDispatcher`]: concurrent read-only batch, then confirmed mutating
//!   calls one at a time, results in submission order
//! - [`AuthorizationPolicy`]: read-only vs mutating classification and the
//!   confirmation rule chain
//! - [`CompletionDetector`]: CONTINUE / COMPLETE / TRUNCATED
//! - [`recorder`]: append-only history and usage accounting
//! - [`cleanup`]: removal of unanswered calls and requests left by an abort
//!
//! A [`SessionState`] is owned by exactly one controller call at a time.
//! Tool tasks never touch it; their results flow back through the recorder.

#![deny(unsafe_code)]

pub mod authorization;
pub mod cleanup;
pub mod completion;
pub mod confirm;
pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod prompts;
pub mod recorder;
pub mod research;
pub mod session;
pub mod state;
pub mod stream_processor;
pub mod types;

pub use authorization::{AuthorizationDecision, AuthorizationPolicy, ToolTier, is_read_only};
pub use completion::{CompletionDecision, CompletionDetector};
pub use confirm::{AutoApprove, ConfirmHandler, ConfirmResponse, ConfirmationRequest};
pub use controller::{TurnConfig, TurnController};
pub use dispatcher::{DispatchConfig, DispatchInterrupted, DispatchScope, ToolDispatcher};
pub use errors::RuntimeError;
pub use research::NestedResearchAgent;
pub use session::SessionState;
pub use state::{TurnState, TurnStateMachine};
pub use types::{CallStatus, DispatchedCall, PreparedCall, StreamResult, TurnOutcome};
