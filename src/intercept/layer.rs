// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `tracing` layer that captures application events as log entries.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::store::{LogLevel, TelemetryStore};

/// Forwards `tracing` events into a [`TelemetryStore`].
///
/// The `message` field becomes the entry message, remaining fields become a
/// JSON `data` object, and the event target becomes the source id. Events
/// from this crate are ignored so recording cannot feed back into itself.
#[derive(Debug, Clone)]
pub struct LiveLayer {
    store: Arc<TelemetryStore>,
}

impl LiveLayer {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self { store }
    }
}

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

impl<S: Subscriber> Layer<S> for LiveLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let data = (!visitor.fields.is_empty()).then(|| Value::Object(visitor.fields));
        self.store.record_log(
            map_level(metadata.level()),
            visitor.message.unwrap_or_default(),
            data,
            None,
            Some(metadata.target().to_string()),
        );
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::with_correlation;
    use crate::store::LogFilter;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture() -> (Arc<TelemetryStore>, impl Subscriber + Send + Sync) {
        let store = Arc::new(TelemetryStore::default());
        let subscriber = tracing_subscriber::registry().with(LiveLayer::new(Arc::clone(&store)));
        (store, subscriber)
    }

    #[test]
    fn test_event_becomes_log_entry() {
        let (store, subscriber) = capture();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::billing", invoice = 42, retry = true, "charge declined");
        });

        let logs = store.get_logs(LogFilter::new());
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Warn);
        assert_eq!(logs[0].message, "charge declined");
        assert_eq!(logs[0].source_id.as_deref(), Some("app::billing"));
        let data = logs[0].data.as_ref().unwrap();
        assert_eq!(data["invoice"], 42);
        assert_eq!(data["retry"], true);
    }

    #[test]
    fn test_own_events_are_skipped() {
        let (store, subscriber) = capture();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "livetrace::store", "internal");
            tracing::info!(target: "livetrace_demo", "neighbour");
        });

        let logs = store.get_logs(LogFilter::new());
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "neighbour");
    }

    #[tokio::test]
    async fn test_event_carries_ambient_correlation() {
        let (store, subscriber) = capture();
        let _default = tracing::subscriber::set_default(subscriber);
        with_correlation(Some("req-1".to_string()), async {
            tracing::info!(target: "app", "handled");
        })
        .await;

        let logs = store.get_logs(LogFilter::new());
        assert_eq!(logs[0].correlation_id.as_deref(), Some("req-1"));
        assert!(logs[0].data.is_none());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(map_level(&Level::TRACE), LogLevel::Trace);
        assert_eq!(map_level(&Level::ERROR), LogLevel::Error);
    }
}
