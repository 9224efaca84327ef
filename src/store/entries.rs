// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry entry types.
//!
//! Entries are immutable once appended. Opaque `data`/`payload` values are
//! kept as JSON values in memory and stringified only for the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Log,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
            LogLevel::Log => "log",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "log" => Ok(LogLevel::Log),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// What produced an error entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Task,
    Hook,
    Resource,
    Middleware,
    Internal,
}

/// Kind of unit of work a run record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Task,
    Hook,
}

impl From<NodeKind> for SourceKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Task => SourceKind::Task,
            NodeKind::Hook => SourceKind::Hook,
        }
    }
}

/// Which buffer a record call appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Log,
    Emission,
    Error,
    Run,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp_ms: i64,
    pub level: LogLevel,
    pub message: String,
    pub source_id: Option<String>,
    pub data: Option<Value>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionEntry {
    pub timestamp_ms: i64,
    pub event_id: String,
    pub emitter_id: Option<String>,
    pub payload: Option<Value>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub timestamp_ms: i64,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub message: String,
    pub stack: Option<String>,
    pub data: Option<Value>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub timestamp_ms: i64,
    pub node_id: String,
    pub node_kind: NodeKind,
    pub duration_ms: f64,
    pub ok: bool,
    pub error: Option<String>,
    pub parent_id: Option<String>,
    pub root_id: Option<String>,
    pub correlation_id: Option<String>,
}

/// Accessors every buffered entry shares.
pub trait Stamped {
    fn timestamp_ms(&self) -> i64;
    fn correlation_id(&self) -> Option<&str>;
}

macro_rules! impl_stamped {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Stamped for $ty {
                fn timestamp_ms(&self) -> i64 {
                    self.timestamp_ms
                }

                fn correlation_id(&self) -> Option<&str> {
                    self.correlation_id.as_deref()
                }
            }
        )*
    };
}

impl_stamped!(LogEntry, EmissionEntry, ErrorEntry, RunRecord);
