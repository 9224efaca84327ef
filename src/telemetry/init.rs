// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostic logging initialization and configuration.

use std::io;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::intercept::LiveLayer;
use crate::store::TelemetryStore;

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span events (enter/exit).
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Custom filter directive (overrides default_level and RUST_LOG).
    pub filter_directive: Option<String>,

    /// Also record application events into this store.
    pub capture_into_store: Option<Arc<TelemetryStore>>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
            capture_into_store: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output for local development.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            compact: false,
            ..Self::default()
        }
    }

    /// Minimal output for deployed servers.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Trace-level output for this crate, without colors.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("livetrace=trace".to_string()),
            ..Self::default()
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    /// Forward application events into `store` as log entries.
    pub fn with_capture(mut self, store: Arc<TelemetryStore>) -> Self {
        self.capture_into_store = Some(store);
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Returned by [`init_telemetry`]; keep it alive for the program's lifetime.
#[derive(Debug)]
pub struct TelemetryGuard {
    capturing: bool,
}

impl TelemetryGuard {
    /// Whether application events are being recorded into a store.
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
///
/// ```rust,ignore
/// use livetrace::telemetry::{init_telemetry, TelemetryConfig};
///
/// let _guard = init_telemetry(&TelemetryConfig::default().with_capture(store.clone()))?;
/// ```
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let filter = config.env_filter();

    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let capture = config.capture_into_store.clone().map(LiveLayer::new);
    let capturing = capture.is_some();

    let registry = tracing_subscriber::registry().with(filter).with(capture);
    let installed = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { capturing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.ansi_colors);
        assert!(config.compact);
        assert!(config.capture_into_store.is_none());
    }

    #[test]
    fn test_telemetry_config_presets() {
        assert_eq!(TelemetryConfig::development().default_level, Level::DEBUG);
        assert!(TelemetryConfig::development().include_span_events);
        assert_eq!(TelemetryConfig::production().default_level, Level::WARN);
        assert!(!TelemetryConfig::production().include_target);
        assert_eq!(
            TelemetryConfig::testing().filter_directive.as_deref(),
            Some("livetrace=trace")
        );
    }

    #[test]
    fn test_telemetry_config_builder() {
        let store = Arc::new(TelemetryStore::new(8));
        let config = TelemetryConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("app=trace")
            .with_ansi(false)
            .with_capture(Arc::clone(&store));

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.filter_directive, Some("app=trace".to_string()));
        assert!(!config.ansi_colors);
        assert_eq!(config.capture_into_store.unwrap().max_entries(), 8);
    }

    #[test]
    fn test_bad_directive_falls_back() {
        let config = TelemetryConfig::default()
            .with_level(Level::INFO)
            .with_filter("livetrace=loud");
        let filter = config.env_filter();
        assert_eq!(filter.to_string(), "info");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_good_directive_is_kept() {
        let filter = TelemetryConfig::default()
            .with_filter("livetrace=debug")
            .env_filter();
        assert_eq!(filter.to_string(), "livetrace=debug");
    }
}
