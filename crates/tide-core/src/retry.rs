//! Retry policy for provider requests.
//!
//! Only the arithmetic lives here. The async loop that sleeps and resends is
//! `tide_llm::transport`.

use serde::{Deserialize, Serialize};

/// Retry settings, deserialized from the `retry` settings section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles per further failure.
    pub base_delay_ms: u64,
    /// Upper bound on computed backoff.
    pub max_delay_ms: u64,
    /// Upper bound on a server `Retry-After` wait.
    pub max_retry_after_ms: u64,
    /// Relative spread applied to backoff, `0.0` disables it.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_retry_after_ms: 60_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Wait before retrying after failed attempt `attempt` (zero-based).
    ///
    /// A server hint replaces backoff, clamped to `max_retry_after_ms`.
    /// `random` is a sample from `[0.0, 1.0)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>, random: f64) -> u64 {
        retry_after_ms.map_or_else(
            || self.backoff_ms(attempt, random),
            |hint| hint.min(self.max_retry_after_ms),
        )
    }

    /// Exponential backoff capped at `max_delay_ms`, then spread by
    /// `jitter_factor` in either direction.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn backoff_ms(&self, attempt: u32, random: f64) -> u64 {
        let doubled = self.base_delay_ms.saturating_mul(1_u64 << attempt.min(31));
        let capped = doubled.min(self.max_delay_ms) as f64;
        let spread = (2.0 * random - 1.0) * self.jitter_factor;
        (capped * (1.0 + spread)).round().max(0.0) as u64
    }
}

/// Milliseconds to wait according to a `Retry-After` header.
///
/// Accepts delta-seconds or an HTTP date; a date already passed is `Some(0)`.
#[must_use]
pub fn parse_retry_after_header(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.parse::<u64>() {
        Ok(secs) => Some(secs.saturating_mul(1_000)),
        Err(_) => {
            let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
            let ms = (at.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_milliseconds();
            Some(u64::try_from(ms).unwrap_or(0))
        }
    }
}
