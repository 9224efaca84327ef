// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! livetrace - live telemetry and correlation tracing for task runners.
//!
//! Records logs, event emissions, errors and task/hook runs into bounded
//! in-memory buffers, tags them with the ambient correlation id, and
//! streams deltas plus process health to dashboards over Server-Sent Events.
//!
//! # Architecture
//!
//! - [`correlation`] - ambient correlation ids and unit-of-work chains
//! - [`health`] - memory, CPU, scheduler lag and pause sampling
//! - [`store`] - bounded buffers, filtered queries and change notification
//! - [`stream`] - SSE frames, the per-connection publisher and the HTTP server
//! - [`intercept`] - run tracking and `tracing` capture into the store
//! - [`config`] - layered configuration loading and merging
//! - [`telemetry`] - diagnostic logging setup for livetrace itself
//! - [`error`] - error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use livetrace::intercept::RunTracker;
//! use livetrace::store::{LogFilter, LogLevel, NodeKind, TelemetryStore};
//!
//! let store = TelemetryStore::new(10_000);
//! RunTracker::run(&store, "build", NodeKind::Task, async {
//!     store.log(LogLevel::Info, "compiling");
//!     Ok::<_, std::io::Error>(())
//! })
//! .await?;
//!
//! let infos = store.get_logs(LogFilter::new().levels([LogLevel::Info]));
//! ```

pub mod config;
pub mod correlation;
pub mod error;
pub mod health;
pub mod intercept;
pub mod store;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{load_config, CliOptions, LiveConfig};
pub use correlation::{with_correlation, with_unit_of_work, CorrelationContext, CorrelationId};
pub use error::{ConfigError, Result, StreamError};
pub use health::{HealthCollector, HealthConfig, HealthSnapshot};
pub use intercept::{LiveLayer, RunTracker};
pub use store::{TelemetryStore, DEFAULT_MAX_ENTRIES};
pub use stream::{LiveServer, StreamConfig, StreamingPublisher};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
