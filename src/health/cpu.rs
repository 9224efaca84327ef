// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! CPU utilisation since the previous sample.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing::warn;

static CPU_UNAVAILABLE: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
struct Baseline {
    wall: Instant,
    cpu: Duration,
}

/// Process CPU utilisation sampler.
///
/// Each call reports the busy fraction since the previous call, normalised
/// by the available parallelism to `0.0..=1.0`, and becomes the baseline for
/// the next one. The first call only establishes a baseline and reports 0.
#[derive(Debug)]
pub struct CpuSampler {
    baseline: Mutex<Option<Baseline>>,
    parallelism: f64,
}

impl CpuSampler {
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            baseline: Mutex::new(None),
            parallelism: parallelism as f64,
        }
    }

    /// Utilisation since the previous call.
    pub fn sample(&self) -> f64 {
        match process_cpu_time() {
            Some(cpu) => self.advance(Instant::now(), cpu),
            None => {
                CPU_UNAVAILABLE.get_or_init(|| {
                    warn!("process CPU time unavailable; reporting zero utilisation");
                });
                0.0
            }
        }
    }

    fn advance(&self, wall: Instant, cpu: Duration) -> f64 {
        let mut baseline = self.baseline.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = baseline.replace(Baseline { wall, cpu });

        let Some(previous) = previous else {
            return 0.0;
        };
        let wall_delta = wall.saturating_duration_since(previous.wall).as_secs_f64();
        if wall_delta <= 0.0 {
            return 0.0;
        }
        let cpu_delta = cpu.saturating_sub(previous.cpu).as_secs_f64();
        (cpu_delta / wall_delta / self.parallelism).clamp(0.0, 1.0)
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// User plus system CPU time consumed by this process.
#[cfg(unix)]
pub fn process_cpu_time() -> Option<Duration> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage only writes into the provided, properly sized struct.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: the call succeeded, so the struct is initialised.
    let usage = unsafe { usage.assume_init() };
    Some(timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime))
}

#[cfg(not(unix))]
pub fn process_cpu_time() -> Option<Duration> {
    None
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}
