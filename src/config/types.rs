// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the partial (file-level) and resolved configuration, supporting
//! JSON and YAML formats.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::health::HealthConfig;
use crate::stream::{ServerConfig, StreamConfig};

/// One configuration file's worth of settings.
/// Can be defined in .livetrace.json, .livetrace/config.json or
/// livetrace.config.yaml in the project root. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Capacity of each telemetry buffer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    /// Delay before a burst of records is pushed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,

    /// Per-buffer cap on one delta frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries_per_push: Option<usize>,

    /// Pause aggregation window for health snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_window_ms: Option<u64>,

    /// Scheduler lag sampling period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag_resolution_ms: Option<u64>,

    /// Lag at or above this is logged as a pause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_threshold_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_capacity: Option<usize>,

    /// Listen address of the live server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Request header carrying an inbound correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_header: Option<String>,
}

/// Resolved configuration with all values set.
/// This is the merged result of global, workspace, local, and CLI configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConfig {
    pub max_entries: usize,
    pub debounce_ms: u64,
    pub health_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub max_entries_per_push: usize,
    pub gc_window_ms: u64,
    pub lag_resolution_ms: u64,
    pub stall_threshold_ms: u64,
    pub pause_capacity: usize,
    pub bind: String,
    pub correlation_header: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            debounce_ms: 100,
            health_interval_ms: 2_000,
            heartbeat_interval_ms: 15_000,
            max_entries_per_push: 1_000,
            gc_window_ms: 30_000,
            lag_resolution_ms: 10,
            stall_threshold_ms: 50,
            pause_capacity: 10_000,
            bind: "127.0.0.1:7878".to_string(),
            correlation_header: "x-correlation-id".to_string(),
        }
    }
}

impl LiveConfig {
    /// Reject zero counts and intervals, and a blank header name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&str, u64); 9] = [
            ("maxEntries", self.max_entries as u64),
            ("debounceMs", self.debounce_ms),
            ("healthIntervalMs", self.health_interval_ms),
            ("heartbeatIntervalMs", self.heartbeat_interval_ms),
            ("maxEntriesPerPush", self.max_entries_per_push as u64),
            ("gcWindowMs", self.gc_window_ms),
            ("lagResolutionMs", self.lag_resolution_ms),
            ("stallThresholdMs", self.stall_threshold_ms),
            ("pauseCapacity", self.pause_capacity as u64),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(*field, "must be greater than 0"));
        }
        if self.correlation_header.trim().is_empty() {
            return Err(ConfigError::invalid("correlationHeader", "must not be empty"));
        }
        if self.bind.trim().is_empty() {
            return Err(ConfigError::invalid("bind", "must not be empty"));
        }
        Ok(())
    }

    pub fn health_config(&self) -> HealthConfig {
        HealthConfig {
            lag_resolution: Duration::from_millis(self.lag_resolution_ms),
            stall_threshold: Duration::from_millis(self.stall_threshold_ms),
            pause_capacity: self.pause_capacity,
            gc_window_ms: self.gc_window_ms,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            health_interval: Duration::from_millis(self.health_interval_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            max_entries_per_push: self.max_entries_per_push,
            gc_window_ms: self.gc_window_ms,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone(),
            correlation_header: self.correlation_header.to_ascii_lowercase(),
            stream: self.stream_config(),
        }
    }
}
