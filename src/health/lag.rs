// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Scheduler lag tracking.
//!
//! A sampler task sleeps for a fixed resolution and records how late it was
//! woken. The delay distribution is kept in a fixed-bucket histogram so
//! recording never allocates.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fixed-bucket histogram of scheduling delays.
#[derive(Debug, Clone)]
pub struct LagHistogram {
    /// Bucket boundaries in microseconds.
    /// Default: [100us, 1ms, 5ms, 10ms, 50ms, 100ms, 1s, +inf]
    buckets: Vec<u64>,

    /// Count per bucket.
    counts: Vec<u64>,

    count: u64,
    sum_micros: u64,
    min_micros: u64,
    max_micros: u64,
}

impl LagHistogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self {
            buckets,
            counts,
            count: 0,
            sum_micros: 0,
            min_micros: u64::MAX,
            max_micros: 0,
        }
    }

    /// Record one delay sample.
    pub fn record(&mut self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
        self.count += 1;
        self.sum_micros = self.sum_micros.saturating_add(micros);
        self.min_micros = self.min_micros.min(micros);
        self.max_micros = self.max_micros.max(micros);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Mean delay in milliseconds, 0 when empty.
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_micros as f64 / self.count as f64 / 1000.0
        }
    }

    pub fn min(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.min_micros)
        }
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros)
    }

    /// Calculate approximate percentile (p50, p90, p99, etc.).
    pub fn percentile(&self, p: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let target = (self.count as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                // Overflow bucket reports the observed maximum.
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.max_micros
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    /// Zero every bucket and aggregate.
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.count = 0;
        self.sum_micros = 0;
        self.min_micros = u64::MAX;
        self.max_micros = 0;
    }
}

impl Default for LagHistogram {
    fn default() -> Self {
        Self::with_buckets(vec![100, 1_000, 5_000, 10_000, 50_000, 100_000, 1_000_000])
    }
}

/// Shared, thread-safe lag histogram fed by the sampler task.
#[derive(Debug, Default)]
pub struct LagMonitor {
    histogram: Mutex<LagHistogram>,
}

impl LagMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, delay: Duration) {
        self.histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(delay);
    }

    /// Mean lag in milliseconds since creation or the last reset.
    pub fn mean_lag_ms(&self) -> f64 {
        self.histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mean_ms()
    }

    /// Copy of the current histogram.
    pub fn histogram(&self) -> LagHistogram {
        self.histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        self.histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let mut hist = LagHistogram::default();

        hist.record(Duration::from_micros(50)); // bucket 0 (<=100us)
        hist.record(Duration::from_micros(500)); // bucket 1 (<=1ms)
        hist.record(Duration::from_millis(3)); // bucket 2 (<=5ms)
        hist.record(Duration::from_secs(5)); // overflow

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[2], 1);
        assert_eq!(hist.counts()[7], 1);
        assert_eq!(hist.count(), 4);
    }

    #[test]
    fn test_histogram_mean() {
        let mut hist = LagHistogram::default();
        hist.record(Duration::from_millis(2));
        hist.record(Duration::from_millis(4));
        assert!((hist.mean_ms() - 3.0).abs() < f64::EPSILON);
        assert_eq!(hist.min(), Duration::from_millis(2));
        assert_eq!(hist.max(), Duration::from_millis(4));
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = LagHistogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_micros(500));
        }
        assert_eq!(hist.percentile(50.0), Duration::from_micros(1_000));
        assert_eq!(hist.percentile(99.0), Duration::from_micros(1_000));

        hist.record(Duration::from_secs(3));
        assert_eq!(hist.percentile(100.0), Duration::from_secs(3));
    }

    #[test]
    fn test_empty_histogram() {
        let hist = LagHistogram::default();
        assert_eq!(hist.mean_ms(), 0.0);
        assert_eq!(hist.min(), Duration::ZERO);
        assert_eq!(hist.percentile(99.0), Duration::ZERO);
    }

    #[test]
    fn test_monitor_reset() {
        let monitor = LagMonitor::new();
        monitor.record(Duration::from_millis(8));
        assert!(monitor.mean_lag_ms() > 7.9);

        monitor.reset();
        assert_eq!(monitor.mean_lag_ms(), 0.0);
        assert_eq!(monitor.histogram().count(), 0);
    }
}
