// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The telemetry store service.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use super::buffer::BoundedBuffer;
use super::entries::{
    EmissionEntry, EntryKind, ErrorEntry, LogEntry, LogLevel, NodeKind, RunRecord, SourceKind,
    Stamped,
};
use super::filter::{select, EmissionFilter, ErrorFilter, LogFilter, RunFilter};
use super::normalize::ErrorPayload;
use super::notify::{ChangeNotifier, ListenerHandle};
use crate::correlation::current_correlation_id;

/// Default per-buffer capacity.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Buffer lengths at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub logs: usize,
    pub emissions: usize,
    pub errors: usize,
    pub runs: usize,
}

impl StoreCounts {
    pub fn total(&self) -> usize {
        self.logs + self.emissions + self.errors + self.runs
    }
}

/// Four bounded buffers plus change notification.
///
/// Recording is infallible and synchronous. Each buffer has its own lock, so
/// a writer on one buffer never blocks readers of another.
#[derive(Debug)]
pub struct TelemetryStore {
    logs: Mutex<BoundedBuffer<LogEntry>>,
    emissions: Mutex<BoundedBuffer<EmissionEntry>>,
    errors: Mutex<BoundedBuffer<ErrorEntry>>,
    runs: Mutex<BoundedBuffer<RunRecord>>,
    notifier: ChangeNotifier,
    max_entries: usize,
}

fn lock<T>(buffer: &Mutex<T>) -> MutexGuard<'_, T> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TelemetryStore {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            logs: Mutex::new(BoundedBuffer::new(max_entries)),
            emissions: Mutex::new(BoundedBuffer::new(max_entries)),
            errors: Mutex::new(BoundedBuffer::new(max_entries)),
            runs: Mutex::new(BoundedBuffer::new(max_entries)),
            notifier: ChangeNotifier::new(),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn append<T: Stamped>(
        &self,
        buffer: &Mutex<BoundedBuffer<T>>,
        kind: EntryKind,
        build: impl FnOnce(i64) -> T,
    ) {
        {
            let mut buffer = lock(buffer);
            // Clock read under the lock keeps per-buffer order.
            buffer.push_with(now_ms(), build);
        }
        trace!(kind = ?kind, "telemetry recorded");
        self.notifier.notify(kind);
    }

    /// Append a log line.
    ///
    /// Without an explicit `correlation_id` the ambient one (if any) is used.
    pub fn record_log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
        correlation_id: Option<String>,
        source_id: Option<String>,
    ) {
        let message = message.into();
        let correlation_id = correlation_id.or_else(ambient_correlation_id);
        self.append(&self.logs, EntryKind::Log, |timestamp_ms| LogEntry {
            timestamp_ms,
            level,
            message,
            source_id,
            data,
            correlation_id,
        });
    }

    /// Shorthand for a log line with no data and ambient correlation.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.record_log(level, message, None, None, None);
    }

    pub fn record_emission(
        &self,
        event_id: impl Into<String>,
        payload: Option<Value>,
        emitter_id: Option<String>,
    ) {
        let event_id = event_id.into();
        let correlation_id = ambient_correlation_id();
        self.append(&self.emissions, EntryKind::Emission, |timestamp_ms| {
            EmissionEntry {
                timestamp_ms,
                event_id,
                emitter_id,
                payload,
                correlation_id,
            }
        });
    }

    /// Append an error, normalising `error` into message and stack.
    pub fn record_error(
        &self,
        source_id: impl Into<String>,
        source_kind: SourceKind,
        error: impl Into<ErrorPayload>,
        data: Option<Value>,
    ) {
        let source_id = source_id.into();
        let ErrorPayload { message, stack } = error.into();
        let correlation_id = ambient_correlation_id();
        self.append(&self.errors, EntryKind::Error, |timestamp_ms| ErrorEntry {
            timestamp_ms,
            source_id,
            source_kind,
            message,
            stack,
            data,
            correlation_id,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_run(
        &self,
        node_id: impl Into<String>,
        node_kind: NodeKind,
        duration_ms: f64,
        ok: bool,
        error: Option<String>,
        parent_id: Option<String>,
        root_id: Option<String>,
    ) {
        let node_id = node_id.into();
        let correlation_id = ambient_correlation_id();
        self.append(&self.runs, EntryKind::Run, |timestamp_ms| RunRecord {
            timestamp_ms,
            node_id,
            node_kind,
            duration_ms,
            ok,
            error,
            parent_id,
            root_id,
            correlation_id,
        });
    }

    /// Logs matching `filter`, oldest first. A bare `i64` is an exclusive cursor.
    pub fn get_logs(&self, filter: impl Into<LogFilter>) -> Vec<LogEntry> {
        let filter: LogFilter = filter.into();
        select(&*lock(&self.logs), &filter)
    }

    pub fn get_emissions(&self, filter: impl Into<EmissionFilter>) -> Vec<EmissionEntry> {
        let filter: EmissionFilter = filter.into();
        select(&*lock(&self.emissions), &filter)
    }

    pub fn get_errors(&self, filter: impl Into<ErrorFilter>) -> Vec<ErrorEntry> {
        let filter: ErrorFilter = filter.into();
        select(&*lock(&self.errors), &filter)
    }

    pub fn get_runs(&self, filter: impl Into<RunFilter>) -> Vec<RunRecord> {
        let filter: RunFilter = filter.into();
        select(&*lock(&self.runs), &filter)
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            logs: lock(&self.logs).len(),
            emissions: lock(&self.emissions).len(),
            errors: lock(&self.errors).len(),
            runs: lock(&self.runs).len(),
        }
    }

    /// Register a synchronous change callback. See [`ChangeNotifier::on_record`].
    pub fn on_record<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(EntryKind) + Send + Sync + 'static,
    {
        self.notifier.on_record(callback)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryKind> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

fn ambient_correlation_id() -> Option<String> {
    current_correlation_id().map(String::from)
}
