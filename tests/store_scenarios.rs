// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end behaviour of the telemetry store through its public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use livetrace::correlation::with_correlation;
use livetrace::intercept::RunTracker;
use livetrace::store::{
    EmissionFilter, EntryKind, ErrorFilter, LogFilter, LogLevel, NodeKind, RunFilter, SourceKind,
    TelemetryStore,
};

fn messages(store: &TelemetryStore, filter: LogFilter) -> Vec<String> {
    store.get_logs(filter).into_iter().map(|e| e.message).collect()
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn test_each_buffer_keeps_its_own_trailing_window() {
    let store = TelemetryStore::new(3);
    for i in 0..5 {
        store.log(LogLevel::Info, format!("log{i}"));
        store.record_emission(format!("evt{i}"), None, None);
    }
    store.record_error("only", SourceKind::Internal, "one error", None);

    assert_eq!(messages(&store, LogFilter::new()), vec!["log2", "log3", "log4"]);
    let events: Vec<String> = store
        .get_emissions(EmissionFilter::new())
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    assert_eq!(events, vec!["evt2", "evt3", "evt4"]);

    let counts = store.counts();
    assert_eq!((counts.logs, counts.emissions, counts.errors, counts.runs), (3, 3, 1, 0));
    assert_eq!(counts.total(), 7);
}

#[test]
fn test_timestamps_never_decrease() {
    let store = TelemetryStore::default();
    for i in 0..200 {
        store.log(LogLevel::Trace, format!("t{i}"));
    }
    let stamps: Vec<i64> = store.get_logs(None).iter().map(|e| e.timestamp_ms).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_level_and_substring_with_last() {
    let store = TelemetryStore::default();
    store.log(LogLevel::Info, "boot");
    store.log(LogLevel::Debug, "dbg1 cache");
    store.log(LogLevel::Debug, "dbg2 cache");
    store.log(LogLevel::Error, "cache failure");
    store.log(LogLevel::Debug, "dbg3 network");

    let filter = LogFilter::new()
        .levels([LogLevel::Debug])
        .message_includes("cache")
        .last(2);
    assert_eq!(messages(&store, filter), vec!["dbg1 cache", "dbg2 cache"]);

    let filter = LogFilter::new().levels([LogLevel::Debug, LogLevel::Error]).last(1);
    assert_eq!(messages(&store, filter), vec!["dbg3 network"]);
}

#[test]
fn test_last_zero_and_negative_are_empty() {
    let store = TelemetryStore::default();
    store.log(LogLevel::Info, "a");
    assert!(store.get_logs(LogFilter::new().last(0)).is_empty());
    assert!(store.get_runs(RunFilter::new().last(-3)).is_empty());
}

#[test]
fn test_emission_and_error_predicates() {
    let store = TelemetryStore::default();
    store.record_emission("user.created", None, Some("signup".to_string()));
    store.record_emission("user.deleted", None, Some("admin".to_string()));
    store.record_emission("user.created", None, Some("import".to_string()));
    store.record_error("db", SourceKind::Resource, "connection refused", None);
    store.record_error("auth", SourceKind::Middleware, "token expired", None);

    let created = store.get_emissions(
        EmissionFilter::new()
            .event_ids(["user.created"])
            .emitter_ids(["import", "admin"]),
    );
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].emitter_id.as_deref(), Some("import"));

    let errors = store.get_errors(
        ErrorFilter::new()
            .source_kinds([SourceKind::Resource, SourceKind::Middleware])
            .message_includes("token"),
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source_id, "auth");
}

// ============================================================================
// Runs
// ============================================================================

#[test]
fn test_run_records_ok_and_failed() {
    let store = TelemetryStore::default();
    store.record_run("t1", NodeKind::Task, 5.0, true, None, None, None);
    store.record_run(
        "t2",
        NodeKind::Task,
        7.5,
        false,
        Some("boom".to_string()),
        None,
        None,
    );

    let failed = store.get_runs(RunFilter::new().ok(false));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].node_id, "t2");
    assert_eq!(failed[0].error.as_deref(), Some("boom"));

    let ok = store.get_runs(RunFilter::new().ok(true).node_kinds([NodeKind::Task]));
    assert_eq!(ok.len(), 1);
    assert_eq!(ok[0].duration_ms, 5.0);
}

#[tokio::test]
async fn test_tracked_runs_share_request_correlation() {
    let store = TelemetryStore::default();

    let result: Result<(), String> = with_correlation(Some("req-42".to_string()), async {
        RunTracker::run(&store, "checkout", NodeKind::Task, async {
            RunTracker::run(&store, "charge", NodeKind::Hook, async {
                Err::<(), _>("card declined".to_string())
            })
            .await
        })
        .await
    })
    .await;
    assert_eq!(result, Err("card declined".to_string()));

    let runs = store.get_runs(RunFilter::new().correlation_ids(["req-42"]));
    let ids: Vec<&str> = runs.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(ids, vec!["charge", "checkout"]);
    assert!(runs.iter().all(|r| !r.ok));
    assert_eq!(runs[0].parent_id.as_deref(), Some("checkout"));
    assert_eq!(runs[0].root_id.as_deref(), Some("checkout"));

    let errors = store.get_errors(ErrorFilter::new().source_ids(["charge"]));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source_kind, SourceKind::Hook);
    assert_eq!(errors[0].correlation_id.as_deref(), Some("req-42"));
}

#[tokio::test]
async fn test_reentrant_run_keeps_link_to_its_caller() {
    let store = TelemetryStore::default();

    let result: Result<u32, String> = RunTracker::run(&store, "retry", NodeKind::Task, async {
        RunTracker::run(&store, "retry", NodeKind::Task, async {
            RunTracker::run(&store, "retry", NodeKind::Task, async { Ok(3) }).await
        })
        .await
    })
    .await;
    assert_eq!(result, Ok(3));

    // Innermost finishes first.
    let runs = store.get_runs(None);
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].parent_id.as_deref(), Some("retry"));
    assert_eq!(runs[1].parent_id.as_deref(), Some("retry"));
    assert_eq!(runs[2].parent_id, None);
    assert!(runs.iter().all(|r| r.root_id.as_deref() == Some("retry")));
}

// ============================================================================
// Cursor
// ============================================================================

#[tokio::test]
async fn test_checkpoint_returns_only_newer_entries() {
    let store = TelemetryStore::default();
    store.log(LogLevel::Info, "before-1");
    store.log(LogLevel::Info, "before-2");

    tokio::time::sleep(Duration::from_millis(2)).await;
    let checkpoint = chrono::Utc::now().timestamp_millis();
    tokio::time::sleep(Duration::from_millis(2)).await;

    store.log(LogLevel::Info, "after-1");
    store.log(LogLevel::Info, "after-2");

    assert_eq!(
        messages(&store, LogFilter::from(checkpoint)),
        vec!["after-1", "after-2"]
    );
    // Nothing is newer than the newest entry.
    let newest = store.get_logs(None).last().map(|e| e.timestamp_ms).unwrap();
    assert!(store.get_logs(newest).is_empty());
}

// ============================================================================
// Notification
// ============================================================================

#[tokio::test]
async fn test_listeners_and_subscribers_see_every_record() {
    let store = TelemetryStore::default();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let handle = store.on_record(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let _panicky = store.on_record(|_| panic!("listener bug"));
    let mut rx = store.subscribe();

    store.log(LogLevel::Info, "one");
    store.record_run("r", NodeKind::Hook, 1.0, true, None, None, None);

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(rx.recv().await.unwrap(), EntryKind::Log);
    assert_eq!(rx.recv().await.unwrap(), EntryKind::Run);

    handle.unsubscribe();
    handle.unsubscribe();
    store.log(LogLevel::Info, "two");
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(store.counts().logs, 2);
}
