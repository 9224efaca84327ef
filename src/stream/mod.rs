// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Push delivery of telemetry deltas and health snapshots.
//!
//! [`StreamingPublisher`] implements the per-connection protocol over any
//! `AsyncWrite`; [`LiveServer`] is the axum transport that drives it.

mod frame;
mod publisher;
mod server;

pub use frame::{
    Frame, TelemetryDelta, WireEmission, WireError, WireLog, EVENT_STREAM_CONTENT_TYPE,
    HEALTH_EVENT, TELEMETRY_EVENT,
};
pub use publisher::{PublisherState, StreamConfig, StreamingPublisher};
pub use server::{LiveServer, ServerConfig, HEALTH_PATH, STREAM_PATH};
