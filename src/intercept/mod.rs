// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Recording integration points.
//!
//! Executors wrap each task or hook in [`RunTracker::run`]; applications that
//! already log through `tracing` can add [`LiveLayer`] to their subscriber to
//! have those events land in the store as log entries.

mod layer;
mod run;

pub use layer::LiveLayer;
pub use run::{RunSpan, RunTracker};
