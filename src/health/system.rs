// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OS-level memory counters and load average.
//!
//! Unsupported platforms report zeros.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::warn;

static MEMORY_UNAVAILABLE: OnceCell<()> = OnceCell::new();

/// Process memory in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Data segment size (heap plus stacks).
    pub heap_used: u64,
    /// Total virtual size.
    pub heap_total: u64,
    /// Resident set size.
    pub rss: u64,
}

/// Current process memory usage.
pub fn memory_usage() -> MemoryUsage {
    match read_statm() {
        Some(usage) => usage,
        None => {
            MEMORY_UNAVAILABLE.get_or_init(|| {
                warn!("process memory counters unavailable; reporting zeros");
            });
            MemoryUsage::default()
        }
    }
}

#[cfg(target_os = "linux")]
fn read_statm() -> Option<MemoryUsage> {
    let content = std::fs::read_to_string("/proc/self/statm").ok()?;
    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = u64::try_from(page_size).ok().filter(|&p| p > 0)?;
    parse_statm(&content, page_size)
}

#[cfg(not(target_os = "linux"))]
fn read_statm() -> Option<MemoryUsage> {
    None
}

/// Parse `/proc/self/statm`: size resident shared text lib data dt (pages).
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_statm(content: &str, page_size: u64) -> Option<MemoryUsage> {
    let fields: Vec<u64> = content
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() < 6 {
        return None;
    }
    Some(MemoryUsage {
        heap_used: fields[5] * page_size,
        heap_total: fields[0] * page_size,
        rss: fields[1] * page_size,
    })
}

/// One-minute load average, 0 where unavailable.
#[cfg(unix)]
pub fn load_average() -> f64 {
    let mut loads = [0f64; 3];
    // SAFETY: the buffer holds the three requested samples.
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if n < 1 {
        0.0
    } else {
        loads[0]
    }
}

#[cfg(not(unix))]
pub fn load_average() -> f64 {
    0.0
}
