// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded append-only buffer.

use std::collections::VecDeque;

use super::entries::Stamped;

/// Keeps the most recent `capacity` entries in insertion order.
///
/// Timestamps handed to the entry builder never decrease, even if the wall
/// clock steps backwards between appends.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
    last_timestamp: i64,
}

impl<T: Stamped> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            last_timestamp: i64::MIN,
        }
    }

    /// Append an entry built with the effective timestamp, then trim the head.
    pub fn push_with(&mut self, now_ms: i64, build: impl FnOnce(i64) -> T) {
        let timestamp = now_ms.max(self.last_timestamp);
        self.last_timestamp = timestamp;
        self.entries.push_back(build(timestamp));

        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }

    /// Entries strictly newer than `after`, oldest first.
    pub fn after(&self, after: Option<i64>) -> impl Iterator<Item = &T> {
        let start = match after {
            Some(ts) => self.entries.partition_point(|e| e.timestamp_ms() <= ts),
            None => 0,
        };
        self.entries.range(start..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
