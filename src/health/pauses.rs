// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Windowed pause log.
//!
//! Pauses are runtime stalls the scheduler sampler observed, plus any pause
//! an embedder reports through [`PauseLog::record_pause`]. Samples live in a
//! capped, time-ordered ring; lifetime totals survive trimming.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default ring capacity.
pub const DEFAULT_PAUSE_CAPACITY: usize = 10_000;

/// One observed pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PauseSample {
    pub timestamp_ms: i64,
    pub duration_ms: f64,
}

/// Aggregate over a time window (or the whole lifetime).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseWindow {
    pub collections: u64,
    pub duration: f64,
}

#[derive(Debug, Default)]
struct PauseInner {
    samples: VecDeque<PauseSample>,
    total_count: u64,
    total_duration_ms: f64,
}

#[derive(Debug)]
pub struct PauseLog {
    inner: Mutex<PauseInner>,
    capacity: usize,
}

impl PauseLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PauseInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Record a pause that ended now.
    pub fn record_pause(&self, duration: Duration) {
        self.record_at(now_ms(), duration.as_secs_f64() * 1000.0);
    }

    /// Record a pause with an explicit timestamp.
    ///
    /// Timestamps must be non-decreasing for [`PauseLog::window`] to stop
    /// early; out-of-order samples are clamped to the newest timestamp.
    pub fn record_at(&self, timestamp_ms: i64, duration_ms: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamp_ms = inner
            .samples
            .back()
            .map_or(timestamp_ms, |last| timestamp_ms.max(last.timestamp_ms));

        inner.samples.push_back(PauseSample {
            timestamp_ms,
            duration_ms,
        });
        inner.total_count += 1;
        inner.total_duration_ms += duration_ms;

        if inner.samples.len() > self.capacity {
            let drop = (self.capacity / 10).max(1);
            inner.samples.drain(..drop);
        }
    }

    /// Pauses within the last `window_ms` milliseconds.
    pub fn window(&self, window_ms: u64) -> PauseWindow {
        self.window_at(now_ms(), window_ms)
    }

    /// Pauses within `window_ms` of `now_ms`.
    ///
    /// Scans from the newest sample backwards and stops at the first one
    /// older than the cutoff.
    pub fn window_at(&self, now_ms: i64, window_ms: u64) -> PauseWindow {
        let cutoff = now_ms.saturating_sub(i64::try_from(window_ms).unwrap_or(i64::MAX));
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut result = PauseWindow::default();
        for sample in inner.samples.iter().rev() {
            if sample.timestamp_ms < cutoff {
                break;
            }
            result.collections += 1;
            result.duration += sample.duration_ms;
        }
        result
    }

    /// Lifetime totals, including trimmed samples.
    pub fn totals(&self) -> PauseWindow {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        PauseWindow {
            collections: inner.total_count,
            duration: inner.total_duration_ms,
        }
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .samples
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PauseLog {
    fn default() -> Self {
        Self::new(DEFAULT_PAUSE_CAPACITY)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_counts_recent_only() {
        let log = PauseLog::new(100);
        log.record_at(1_000, 5.0);
        log.record_at(20_000, 2.0);
        log.record_at(25_000, 3.0);

        let window = log.window_at(30_000, 10_000);
        assert_eq!(window.collections, 2);
        assert!((window.duration - 5.0).abs() < f64::EPSILON);

        let everything = log.window_at(30_000, 60_000);
        assert_eq!(everything.collections, 3);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let log = PauseLog::new(10);
        log.record_at(20_000, 1.0);
        assert_eq!(log.window_at(30_000, 10_000).collections, 1);
        assert_eq!(log.window_at(30_001, 10_000).collections, 0);
    }

    #[test]
    fn test_trims_oldest_tenth() {
        let log = PauseLog::new(100);
        for i in 0..=100 {
            log.record_at(i, 1.0);
        }
        // 101 samples exceed the cap; the oldest 10 are dropped.
        assert_eq!(log.len(), 91);
        assert_eq!(log.totals().collections, 101);
        assert_eq!(log.window_at(100, 1_000).collections, 91);
    }

    #[test]
    fn test_small_capacity_trims_at_least_one() {
        let log = PauseLog::new(3);
        for i in 0..10 {
            log.record_at(i, 1.0);
        }
        assert!(log.len() <= 3);
        assert_eq!(log.totals().collections, 10);
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let log = PauseLog::new(10);
        log.record_at(5_000, 1.0);
        log.record_at(4_000, 1.0);
        assert_eq!(log.window_at(5_000, 0).collections, 2);
    }

    #[test]
    fn test_empty_log() {
        let log = PauseLog::default();
        assert!(log.is_empty());
        assert_eq!(log.window(30_000), PauseWindow::default());
    }
}
