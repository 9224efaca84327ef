// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Event-stream framing.
//!
//! ```text
//! event: <name>\n
//! data: <json>\n
//! \n
//! ```
//!
//! Heartbeats are the comment frame `: heartbeat\n\n`.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::store::{EmissionEntry, ErrorEntry, LogEntry, LogLevel, RunRecord, SourceKind};

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

pub const HEALTH_EVENT: &str = "health";
pub const TELEMETRY_EVENT: &str = "telemetry";

const HEARTBEAT: &str = ": heartbeat\n\n";

/// One unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event { name: String, data: String },
    Heartbeat,
}

impl Frame {
    /// Serialize `payload` into a named event frame.
    ///
    /// `serde_json` escapes control characters, so the data line never
    /// contains a raw newline.
    pub fn event<T: Serialize + ?Sized>(
        name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, StreamError> {
        Ok(Frame::Event {
            name: name.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    pub fn encode(&self) -> String {
        match self {
            Frame::Event { name, data } => format!("event: {}\ndata: {}\n\n", name, data),
            Frame::Heartbeat => HEARTBEAT.to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Frame::Event { name, .. } => Some(name),
            Frame::Heartbeat => None,
        }
    }

    /// Decode the data line of an event frame.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        match self {
            Frame::Event { data, .. } => serde_json::from_str(data).ok(),
            Frame::Heartbeat => None,
        }
    }

    /// Split a body into complete frames; a trailing partial frame is ignored.
    pub fn parse_all(body: &str) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = body;
        while let Some(end) = rest.find("\n\n") {
            let block = &rest[..end];
            rest = &rest[end + 2..];

            if block.starts_with(':') {
                frames.push(Frame::Heartbeat);
                continue;
            }

            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event: ") {
                    name = Some(value.to_string());
                } else if let Some(value) = line.strip_prefix("data: ") {
                    data = Some(value.to_string());
                }
            }
            if let (Some(name), Some(data)) = (name, data) {
                frames.push(Frame::Event { name, data });
            }
        }
        frames
    }
}

/// Log entry with `data` pre-serialized to a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLog {
    pub timestamp_ms: i64,
    pub level: LogLevel,
    pub message: String,
    pub source_id: Option<String>,
    pub data: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEmission {
    pub timestamp_ms: i64,
    pub event_id: String,
    pub emitter_id: Option<String>,
    pub payload: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    pub timestamp_ms: i64,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub message: String,
    pub stack: Option<String>,
    pub data: Option<String>,
    pub correlation_id: Option<String>,
}

impl From<LogEntry> for WireLog {
    fn from(entry: LogEntry) -> Self {
        Self {
            timestamp_ms: entry.timestamp_ms,
            level: entry.level,
            message: entry.message,
            source_id: entry.source_id,
            data: entry.data.map(|v| v.to_string()),
            correlation_id: entry.correlation_id,
        }
    }
}

impl From<EmissionEntry> for WireEmission {
    fn from(entry: EmissionEntry) -> Self {
        Self {
            timestamp_ms: entry.timestamp_ms,
            event_id: entry.event_id,
            emitter_id: entry.emitter_id,
            payload: entry.payload.map(|v| v.to_string()),
            correlation_id: entry.correlation_id,
        }
    }
}

impl From<ErrorEntry> for WireError {
    fn from(entry: ErrorEntry) -> Self {
        Self {
            timestamp_ms: entry.timestamp_ms,
            source_id: entry.source_id,
            source_kind: entry.source_kind,
            message: entry.message,
            stack: entry.stack,
            data: entry.data.map(|v| v.to_string()),
            correlation_id: entry.correlation_id,
        }
    }
}

/// Payload of a `telemetry` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDelta {
    pub logs: Vec<WireLog>,
    pub emissions: Vec<WireEmission>,
    pub errors: Vec<WireError>,
    pub runs: Vec<RunRecord>,
}

impl TelemetryDelta {
    pub fn total(&self) -> usize {
        self.logs.len() + self.emissions.len() + self.errors.len() + self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Newest timestamp across all four arrays.
    pub fn max_timestamp(&self) -> Option<i64> {
        let logs = self.logs.iter().map(|e| e.timestamp_ms);
        let emissions = self.emissions.iter().map(|e| e.timestamp_ms);
        let errors = self.errors.iter().map(|e| e.timestamp_ms);
        let runs = self.runs.iter().map(|e| e.timestamp_ms);
        logs.chain(emissions).chain(errors).chain(runs).max()
    }
}
