// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostic logging for livetrace itself.
//!
//! Library code logs through `tracing` macros with structured fields and
//! never prints. Binaries install a subscriber once at startup:
//!
//! ```rust,ignore
//! use livetrace::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! # Conventions
//!
//! 1. **Use appropriate log levels** (trace for per-record detail, debug for
//!    connection lifecycle, info for startup/shutdown, warn for degradation)
//! 2. **Record fields, not formatted strings** (counts, cursors, addresses)
//! 3. **Log a degraded capability once**, not on every sample

mod init;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
