//! `tracing` subscriber setup.
//!
//! Session, iteration and tool-call context travel in spans opened by the
//! runtime; nothing here knows about them.

pub mod test_utils;

pub use test_utils::{CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;

/// `RUST_LOG` when set, otherwise `fallback`.
fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn stderr_builder(level: &str) -> SubscriberBuilder<DefaultFields, Format, EnvFilter, fn() -> std::io::Stderr> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr as fn() -> std::io::Stderr)
        .with_target(true)
}

/// Compact human-readable logs on stderr. A second call is ignored.
pub fn init_subscriber(level: &str) {
    let _ = stderr_builder(level).compact().try_init();
}

/// JSON lines on stderr, each carrying its current span. A second call is ignored.
pub fn init_json_subscriber(level: &str) {
    let _ = stderr_builder(level).json().with_current_span(true).try_init();
}
