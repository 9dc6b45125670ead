//! # HTTP Retry Transport
//!
//! Wraps outbound provider requests with bounded, backoff-based retry.
//!
//! - Only statuses in [`RETRYABLE_STATUS_CODES`] are retried
//! - 429 honors `Retry-After` up to [`RetryConfig::max_retry_after_ms`],
//!   everything else uses exponential backoff with jitter
//! - After `max_attempts` the last error is returned unchanged
//!
//! The transport hands back a [`reqwest::Response`] whose body has not been
//! read. Providers build their event stream from it afterwards, so a retry
//! can never re-iterate a partially consumed stream.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use tide_core::retry::{RetryConfig, parse_retry_after_header};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{ProviderError, ProviderResult};

/// HTTP statuses that are retried.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Longest error body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client with retry on transient statuses.
#[derive(Clone, Debug)]
pub struct RetryTransport {
    client: reqwest::Client,
    config: RetryConfig,
    cancel: Option<CancellationToken>,
}

impl RetryTransport {
    /// Create a transport over `client`.
    pub fn new(client: reqwest::Client, config: RetryConfig) -> Self {
        Self {
            client,
            config,
            cancel: None,
        }
    }

    /// Abort backoff sleeps when `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The retry configuration in effect.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// `build` is invoked once per attempt so every attempt gets a fresh body.
    pub async fn send<F>(&self, build: F) -> ProviderResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            let response = build(&self.client).send().await?;
            let status = response.status().as_u16();

            if response.status().is_success() {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, status, "provider request succeeded after retry");
                }
                return Ok(response);
            }

            let error = error_from_response(response).await;
            let is_last = attempt + 1 >= max_attempts;

            if !error.is_retryable() {
                debug!(status, error = %error, "provider request failed, not retryable");
                return Err(error);
            }
            if is_last {
                warn!(
                    attempts = attempt + 1,
                    status,
                    error = %error,
                    "provider request retries exhausted"
                );
                return Err(error);
            }

            let delay_ms = self
                .config
                .delay_for(attempt, error.retry_after_ms(), rand::random::<f64>());
            warn!(
                attempt = attempt + 1,
                max_attempts,
                status,
                delay_ms,
                "retryable provider error, backing off"
            );
            self.sleep(delay_ms).await?;
            attempt += 1;
        }
    }

    async fn sleep(&self, delay_ms: u64) -> ProviderResult<()> {
        let delay = Duration::from_millis(delay_ms);
        match &self.cancel {
            Some(token) => tokio::select! {
                () = tokio::time::sleep(delay) => Ok(()),
                () = token.cancelled() => Err(ProviderError::Cancelled),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

/// Map a non-success response to a [`ProviderError`].
///
/// Consumes the body to extract the provider's error message.
pub async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_header);
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body, status);

    match status {
        401 | 403 => ProviderError::Auth { message },
        429 => ProviderError::RateLimited {
            retry_after_ms,
            message,
        },
        _ => ProviderError::Api {
            status,
            message,
            retryable: RETRYABLE_STATUS_CODES.contains(&status),
        },
    }
}

/// Pull `error.message` out of a JSON error body, or fall back to the raw text.
fn extract_error_message(body: &str, status: u16) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        });
    match from_json {
        Some(msg) => msg,
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
