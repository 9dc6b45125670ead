//! In-memory tracing capture for tests.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::span::{Attributes, Id};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Module path the event came from.
    pub target: String,
    /// The `message` field, empty when the event had none.
    pub message: String,
    /// Remaining fields in recording order, values rendered as text.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Store {
    events: Vec<CapturedEvent>,
    spans: Vec<&'static str>,
}

/// Handle to everything captured since [`capture_logs`] was called.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    store: Arc<Mutex<Store>>,
}

impl CapturedLogs {
    fn any(&self, pred: impl Fn(&CapturedEvent) -> bool) -> bool {
        self.store.lock().events.iter().any(pred)
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.store.lock().events.clone()
    }

    /// Whether some event message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.any(|e| e.message.contains(needle))
    }

    /// Whether some event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.any(|e| e.level == level && e.message.contains(needle))
    }

    /// Whether some event recorded `field` as exactly `value`.
    pub fn has_field(&self, field: &str, value: &str) -> bool {
        self.any(|e| e.field(field) == Some(value))
    }

    /// Whether a span named `name` was opened.
    pub fn has_span(&self, name: &str) -> bool {
        self.store.lock().spans.iter().any(|s| *s == name)
    }

    /// Number of events at `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.store.lock().events.iter().filter(|e| e.level == level).count()
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    rest: Vec<(String, String)>,
}

impl Fields {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.rest.push((field.name().to_owned(), value));
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct Recorder(CapturedLogs);

impl<S> Layer<S> for Recorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        self.0.store.lock().spans.push(attrs.metadata().name());
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let meta = event.metadata();
        self.0.store.lock().events.push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: fields.message,
            fields: fields.rest,
        });
    }
}

/// Capture every event and span on the current thread until the guard drops.
///
/// Events from other threads are not seen, so async tests need the
/// current-thread `#[tokio::test]` flavor.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(Recorder(logs.clone()))
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}
