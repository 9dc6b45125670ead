//! The [`Provider`] seam between the runtime and a model backend.
//!
//! A provider answers one [`ProviderRequest`] with a single-pass stream of
//! [`StreamEvent`]s. Retries happen in the transport before that stream is
//! handed out, so a stream is never replayed.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tide_core::events::StreamEvent;
use tide_core::messages::Message;
use tide_core::tools::Tool;

/// `Result` with [`ProviderError`].
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Event stream handed out by [`Provider::stream`].
pub type StreamEventStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamEvent>> + Send>>;

/// Why a model call failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No HTTP status was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A body or chunk could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials missing or refused (401/403).
    #[error("Auth error: {message}")]
    Auth {
        /// Server or local explanation.
        message: String,
    },

    /// HTTP 429.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Parsed `Retry-After`, when present.
        retry_after_ms: Option<u64>,
        /// Response body.
        message: String,
    },

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// Status code.
        status: u16,
        /// Response body.
        message: String,
        /// Whether the status is one the transport retries.
        retryable: bool,
    },

    /// The turn's cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    /// Backend-specific failure with no better home.
    #[error("{message}")]
    Other {
        /// Description.
        message: String,
    },
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Api { retryable: true, .. })
    }

    /// Wait the server asked for.
    pub fn retry_after_ms(&self) -> Option<u64> {
        if let Self::RateLimited { retry_after_ms, .. } = self {
            *retry_after_ms
        } else {
            None
        }
    }

    /// HTTP status behind the failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Json(_) | Self::Auth { .. } | Self::Cancelled | Self::Other { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Input to one model call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    /// Instructions sent ahead of the history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// History, oldest first.
    pub messages: Vec<Message>,
    /// Declarations the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// Output token limit; the backend default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A model backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend name, e.g. `openai`.
    fn name(&self) -> &str;

    /// Model the requests go to.
    fn model(&self) -> &str;

    /// Start a response. Events arrive until [`StreamEvent::Done`]; a stream
    /// that ends before it was truncated.
    async fn stream(&self, request: &ProviderRequest) -> ProviderResult<StreamEventStream>;
}
