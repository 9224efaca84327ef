// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process health sampling.
//!
//! [`HealthCollector`] owns the scheduler lag sampler, the pause log and the
//! CPU sampler, and composes them with OS memory counters into a
//! [`HealthSnapshot`]. Every probe degrades to zeros on platforms that lack
//! it; constructing or starting the collector never fails.

mod cpu;
mod lag;
mod pauses;
mod system;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use cpu::{process_cpu_time, CpuSampler};
pub use lag::{LagHistogram, LagMonitor};
pub use pauses::{PauseLog, PauseSample, PauseWindow, DEFAULT_PAUSE_CAPACITY};
pub use system::{load_average, memory_usage, MemoryUsage};

/// Default window for pause aggregation.
pub const DEFAULT_GC_WINDOW_MS: u64 = 30_000;

/// Collector settings.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// How often the lag sampler wakes.
    pub lag_resolution: Duration,
    /// Lag at or above this is also logged as a pause.
    pub stall_threshold: Duration,
    /// Pause ring capacity.
    pub pause_capacity: usize,
    /// Window used by [`HealthCollector::snapshot`].
    pub gc_window_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            lag_resolution: Duration::from_millis(10),
            stall_threshold: Duration::from_millis(50),
            pause_capacity: DEFAULT_PAUSE_CAPACITY,
            gc_window_ms: DEFAULT_GC_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    pub usage: f64,
    pub load_average: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLoopLag {
    /// Mean lag in milliseconds.
    pub lag: f64,
}

/// Point-in-time process health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub event_loop: EventLoopLag,
    pub gc: PauseWindow,
}

/// Process-lifecycle-scoped health sampler.
///
/// Create one at startup, call [`HealthCollector::start`] from inside a
/// tokio runtime and [`HealthCollector::shutdown`] on exit.
#[derive(Debug)]
pub struct HealthCollector {
    config: HealthConfig,
    lag: Arc<LagMonitor>,
    pauses: Arc<PauseLog>,
    cpu: CpuSampler,
    sampler: Mutex<Option<JoinHandle<()>>>,
    lag_unavailable: OnceCell<()>,
}

impl HealthCollector {
    pub fn new(config: HealthConfig) -> Self {
        let pauses = Arc::new(PauseLog::new(config.pause_capacity));
        Self {
            config,
            lag: Arc::new(LagMonitor::new()),
            pauses,
            cpu: CpuSampler::new(),
            sampler: Mutex::new(None),
            lag_unavailable: OnceCell::new(),
        }
    }

    /// Spawn the lag sampler on the current tokio runtime.
    ///
    /// Returns `false` (and leaves lag at zero) when called outside a
    /// runtime. Calling it again while the sampler runs is a no-op.
    pub fn start(&self) -> bool {
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if sampler.is_some() {
            return true;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.lag_unavailable.get_or_init(|| {
                    warn!("no tokio runtime; scheduler lag sampling disabled");
                });
                return false;
            }
        };

        let lag = Arc::clone(&self.lag);
        let pauses = Arc::clone(&self.pauses);
        let resolution = self.config.lag_resolution.max(Duration::from_millis(1));
        let stall_threshold = self.config.stall_threshold;

        *sampler = Some(handle.spawn(async move {
            loop {
                let started = tokio::time::Instant::now();
                tokio::time::sleep(resolution).await;
                let delay = started.elapsed().saturating_sub(resolution);
                lag.record(delay);
                if !stall_threshold.is_zero() && delay >= stall_threshold {
                    pauses.record_pause(delay);
                }
            }
        }));
        debug!(resolution_ms = resolution.as_millis() as u64, "lag sampler started");
        true
    }

    /// Stop the lag sampler. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let task = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("lag sampler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Snapshot using the configured pause window.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_with_window(self.config.gc_window_ms)
    }

    /// Snapshot aggregating pauses over the last `gc_window_ms`.
    pub fn snapshot_with_window(&self, gc_window_ms: u64) -> HealthSnapshot {
        HealthSnapshot {
            memory: memory_usage(),
            cpu: CpuUsage {
                usage: self.cpu.sample(),
                load_average: load_average(),
            },
            event_loop: EventLoopLag {
                lag: self.lag.mean_lag_ms(),
            },
            gc: self.pauses.window(gc_window_ms),
        }
    }

    /// Zero the lag histogram so the next reading covers only new samples.
    pub fn reset_lag(&self) {
        self.lag.reset();
    }

    pub fn lag(&self) -> &LagMonitor {
        &self.lag
    }

    /// Pause log, for embedders that observe their own pauses.
    pub fn pauses(&self) -> &PauseLog {
        &self.pauses
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

impl Default for HealthCollector {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl Drop for HealthCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_outside_runtime_degrades() {
        let collector = HealthCollector::default();
        assert!(!collector.start());
        assert!(!collector.is_running());

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.event_loop.lag, 0.0);
        assert_eq!(snapshot.gc.collections, 0);
    }

    #[tokio::test]
    async fn test_start_and_shutdown_idempotent() {
        let collector = HealthCollector::default();
        assert!(collector.start());
        assert!(collector.start());
        assert!(collector.is_running());

        collector.shutdown();
        collector.shutdown();
        assert!(!collector.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_records_lag() {
        let collector = HealthCollector::new(HealthConfig {
            lag_resolution: Duration::from_millis(10),
            ..Default::default()
        });
        collector.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(collector.lag().histogram().count() > 0);

        collector.reset_lag();
        assert_eq!(collector.lag().histogram().count(), 0);
        collector.shutdown();
    }

    #[test]
    fn test_reported_pauses_show_in_snapshot() {
        let collector = HealthCollector::default();
        collector.pauses().record_pause(Duration::from_millis(12));
        collector.pauses().record_pause(Duration::from_millis(8));

        let snapshot = collector.snapshot_with_window(60_000);
        assert_eq!(snapshot.gc.collections, 2);
        assert!((snapshot.gc.duration - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let json = serde_json::to_value(HealthSnapshot::default()).unwrap();
        assert!(json["memory"]["heapUsed"].is_number());
        assert!(json["cpu"]["loadAverage"].is_number());
        assert!(json["eventLoop"]["lag"].is_number());
        assert!(json["gc"]["collections"].is_number());
        assert!(json["gc"]["duration"].is_number());
    }
}
