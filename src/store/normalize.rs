// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error normalisation for [`TelemetryStore::record_error`](super::TelemetryStore::record_error).
//!
//! Conversions never fail: anything that cannot be rendered as JSON is
//! rendered with its `Debug` form instead.

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Message and optional stack extracted from an arbitrary error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Native error: its display text plus the `source()` chain as the stack.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        Self {
            message: err.to_string(),
            stack: render_chain(err.source()),
        }
    }

    /// Best-effort JSON rendering of an arbitrary value.
    pub fn from_value<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::String(s)) => Self::new(s),
            Ok(json) => Self::from(json),
            Err(_) => Self::new(format!("{:?}", value)),
        }
    }
}

fn render_chain(mut source: Option<&(dyn StdError + 'static)>) -> Option<String> {
    let mut lines = Vec::new();
    while let Some(err) = source {
        lines.push(format!("caused by: {}", err));
        source = err.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

impl From<&str> for ErrorPayload {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorPayload {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&anyhow::Error> for ErrorPayload {
    fn from(err: &anyhow::Error) -> Self {
        let chain: Vec<String> = err
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {}", cause))
            .collect();
        Self {
            message: err.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

impl From<anyhow::Error> for ErrorPayload {
    fn from(err: anyhow::Error) -> Self {
        Self::from(&err)
    }
}

impl From<std::io::Error> for ErrorPayload {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<Value> for ErrorPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::new(s),
            Value::Object(ref map) => match map.get("message").and_then(Value::as_str) {
                Some(message) => Self {
                    message: message.to_string(),
                    stack: map.get("stack").and_then(Value::as_str).map(str::to_string),
                },
                None => Self::new(value.to_string()),
            },
            other => Self::new(other.to_string()),
        }
    }
}
