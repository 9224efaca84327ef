// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory telemetry store.
//!
//! Four independent bounded buffers (logs, emissions, errors, runs) with a
//! symmetric `record_*` / `get_*` API per buffer:
//!
//! ```rust,ignore
//! use livetrace::store::{LogFilter, LogLevel, TelemetryStore};
//!
//! let store = TelemetryStore::new(10_000);
//! store.log(LogLevel::Debug, "dbg1");
//! let recent = store.get_logs(LogFilter::new().levels([LogLevel::Debug]).last(2));
//! let newer = store.get_logs(checkpoint_ms); // bare cursor form
//! ```
//!
//! Entries are never mutated after insertion; queries return copies.

mod buffer;
mod entries;
mod filter;
mod normalize;
mod notify;
mod service;

pub use buffer::BoundedBuffer;
pub use entries::{
    EmissionEntry, EntryKind, ErrorEntry, LogEntry, LogLevel, NodeKind, RunRecord, SourceKind,
    Stamped,
};
pub use filter::{EmissionFilter, EntryFilter, ErrorFilter, LogFilter, RunFilter};
pub use normalize::ErrorPayload;
pub use notify::{ChangeNotifier, ListenerHandle, CHANNEL_CAPACITY};
pub use service::{StoreCounts, TelemetryStore, DEFAULT_MAX_ENTRIES};
