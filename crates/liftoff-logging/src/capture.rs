//! Records events in memory so tests can assert on what was logged.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// The `message` field.
    pub message: String,
    /// Every other field, rendered as text.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Value of field `name`, if the event carried one.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Handle to the events recorded since [`capture_logs`] was called.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    /// Snapshot of every recorded event, oldest first.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().clone()
    }

    /// Whether an event at `level` has a message containing `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    /// Values of field `name` across events at `level`, in order.
    pub fn field_values(&self, level: Level, name: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .filter_map(|e| e.field(name).map(str::to_owned))
            .collect()
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Recorder {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        self.0.0.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Install a thread-local subscriber that records every event.
///
/// Events are captured while the guard lives. Only the current thread is
/// covered, so async tests should use the current-thread runtime.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_message_and_fields() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(reason = "unknown_type", size = 12, "rejected command");

        assert!(logs.has_event(Level::WARN, "rejected"));
        assert!(!logs.has_event(Level::INFO, "rejected"));
        let event = &logs.events()[0];
        assert_eq!(event.field("reason"), Some("unknown_type"));
        assert_eq!(event.field("size"), Some("12"));
    }

    #[test]
    fn field_values_filter_by_level() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(reason = "a", "x");
        tracing::info!(reason = "b", "y");
        tracing::warn!(reason = "c", "z");
        assert_eq!(logs.field_values(Level::WARN, "reason"), ["a", "c"]);
    }

    #[test]
    fn nothing_recorded_after_guard_drops() {
        let (logs, guard) = capture_logs();
        drop(guard);
        tracing::error!("unseen");
        assert!(logs.events().is_empty());
    }
}
