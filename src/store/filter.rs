// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query filters for the four telemetry buffers.
//!
//! All predicates are AND-combined. Set-valued predicates match when the
//! entry's value is any member of the set; an absent or empty set matches
//! everything. `last` keeps the tail after every other predicate ran:
//! `last <= 0` yields nothing, `None` means unlimited.
//!
//! Every filter converts from a bare `i64`, which is read as
//! `after_timestamp`.

use serde::{Deserialize, Serialize};

use super::buffer::BoundedBuffer;
use super::entries::{
    EmissionEntry, ErrorEntry, LogEntry, LogLevel, NodeKind, RunRecord, SourceKind, Stamped,
};

/// Predicates shared by every buffer plus the entry-specific match.
pub trait EntryFilter<E> {
    fn after_timestamp(&self) -> Option<i64>;
    fn last(&self) -> Option<i64>;
    fn correlation_ids(&self) -> Option<&[String]>;
    fn matches(&self, entry: &E) -> bool;
}

/// Run `filter` over `buffer`, returning owned copies oldest-first.
pub(crate) fn select<E, F>(buffer: &BoundedBuffer<E>, filter: &F) -> Vec<E>
where
    E: Stamped + Clone,
    F: EntryFilter<E>,
{
    let limit = match filter.last() {
        Some(n) if n <= 0 => return Vec::new(),
        Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        None => None,
    };

    let matched: Vec<&E> = buffer
        .after(filter.after_timestamp())
        .filter(|e| in_opt_set(filter.correlation_ids(), e.correlation_id()))
        .filter(|e| filter.matches(e))
        .collect();

    let skip = limit.map_or(0, |n| matched.len().saturating_sub(n));
    matched.into_iter().skip(skip).cloned().collect()
}

fn in_set<T: PartialEq>(set: Option<&[T]>, value: &T) -> bool {
    match set {
        Some(set) if !set.is_empty() => set.contains(value),
        _ => true,
    }
}

fn in_opt_set(set: Option<&[String]>, value: Option<&str>) -> bool {
    match set {
        Some(set) if !set.is_empty() => value.is_some_and(|v| set.iter().any(|s| s == v)),
        _ => true,
    }
}

fn includes(needle: Option<&str>, haystack: &str) -> bool {
    match needle {
        Some(needle) if !needle.is_empty() => haystack.contains(needle),
        _ => true,
    }
}

macro_rules! common_filter_impl {
    ($filter:ty) => {
        impl $filter {
            pub fn new() -> Self {
                Self::default()
            }

            /// Only entries strictly newer than `ts`.
            pub fn after(mut self, ts: i64) -> Self {
                self.after_timestamp = Some(ts);
                self
            }

            /// Keep at most the newest `n` matches.
            pub fn last(mut self, n: i64) -> Self {
                self.last = Some(n);
                self
            }

            pub fn correlation_ids<I, S>(mut self, ids: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.correlation_ids = Some(ids.into_iter().map(Into::into).collect());
                self
            }
        }

        impl From<i64> for $filter {
            fn from(after_timestamp: i64) -> Self {
                Self {
                    after_timestamp: Some(after_timestamp),
                    ..Default::default()
                }
            }
        }

        impl From<Option<i64>> for $filter {
            fn from(after_timestamp: Option<i64>) -> Self {
                Self {
                    after_timestamp,
                    ..Default::default()
                }
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFilter {
    pub after_timestamp: Option<i64>,
    pub last: Option<i64>,
    pub levels: Option<Vec<LogLevel>>,
    pub message_includes: Option<String>,
    pub correlation_ids: Option<Vec<String>>,
}

common_filter_impl!(LogFilter);

impl LogFilter {
    pub fn levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    pub fn message_includes(mut self, needle: impl Into<String>) -> Self {
        self.message_includes = Some(needle.into());
        self
    }
}

impl EntryFilter<LogEntry> for LogFilter {
    fn after_timestamp(&self) -> Option<i64> {
        self.after_timestamp
    }

    fn last(&self) -> Option<i64> {
        self.last
    }

    fn correlation_ids(&self) -> Option<&[String]> {
        self.correlation_ids.as_deref()
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        in_set(self.levels.as_deref(), &entry.level)
            && includes(self.message_includes.as_deref(), &entry.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmissionFilter {
    pub after_timestamp: Option<i64>,
    pub last: Option<i64>,
    pub event_ids: Option<Vec<String>>,
    pub emitter_ids: Option<Vec<String>>,
    pub correlation_ids: Option<Vec<String>>,
}

common_filter_impl!(EmissionFilter);

impl EmissionFilter {
    pub fn event_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn emitter_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emitter_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

impl EntryFilter<EmissionEntry> for EmissionFilter {
    fn after_timestamp(&self) -> Option<i64> {
        self.after_timestamp
    }

    fn last(&self) -> Option<i64> {
        self.last
    }

    fn correlation_ids(&self) -> Option<&[String]> {
        self.correlation_ids.as_deref()
    }

    fn matches(&self, entry: &EmissionEntry) -> bool {
        in_set(self.event_ids.as_deref(), &entry.event_id)
            && in_opt_set(self.emitter_ids.as_deref(), entry.emitter_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorFilter {
    pub after_timestamp: Option<i64>,
    pub last: Option<i64>,
    pub source_kinds: Option<Vec<SourceKind>>,
    pub source_ids: Option<Vec<String>>,
    pub message_includes: Option<String>,
    pub correlation_ids: Option<Vec<String>>,
}

common_filter_impl!(ErrorFilter);

impl ErrorFilter {
    pub fn source_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.source_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn source_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn message_includes(mut self, needle: impl Into<String>) -> Self {
        self.message_includes = Some(needle.into());
        self
    }
}

impl EntryFilter<ErrorEntry> for ErrorFilter {
    fn after_timestamp(&self) -> Option<i64> {
        self.after_timestamp
    }

    fn last(&self) -> Option<i64> {
        self.last
    }

    fn correlation_ids(&self) -> Option<&[String]> {
        self.correlation_ids.as_deref()
    }

    fn matches(&self, entry: &ErrorEntry) -> bool {
        in_set(self.source_kinds.as_deref(), &entry.source_kind)
            && in_set(self.source_ids.as_deref(), &entry.source_id)
            && includes(self.message_includes.as_deref(), &entry.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunFilter {
    pub after_timestamp: Option<i64>,
    pub last: Option<i64>,
    pub node_kinds: Option<Vec<NodeKind>>,
    pub node_ids: Option<Vec<String>>,
    pub ok: Option<bool>,
    pub parent_ids: Option<Vec<String>>,
    pub root_ids: Option<Vec<String>>,
    pub correlation_ids: Option<Vec<String>>,
}

common_filter_impl!(RunFilter);

impl RunFilter {
    pub fn node_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.node_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn node_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn ok(mut self, ok: bool) -> Self {
        self.ok = Some(ok);
        self
    }

    pub fn parent_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn root_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

impl EntryFilter<RunRecord> for RunFilter {
    fn after_timestamp(&self) -> Option<i64> {
        self.after_timestamp
    }

    fn last(&self) -> Option<i64> {
        self.last
    }

    fn correlation_ids(&self) -> Option<&[String]> {
        self.correlation_ids.as_deref()
    }

    fn matches(&self, entry: &RunRecord) -> bool {
        in_set(self.node_kinds.as_deref(), &entry.node_kind)
            && in_set(self.node_ids.as_deref(), &entry.node_id)
            && self.ok.map_or(true, |ok| entry.ok == ok)
            && in_opt_set(self.parent_ids.as_deref(), entry.parent_id.as_deref())
            && in_opt_set(self.root_ids.as_deref(), entry.root_id.as_deref())
    }
}
