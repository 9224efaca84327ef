// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{LiveConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub bind: Option<String>,
    pub max_entries: Option<usize>,
}

/// Default configuration values.
pub fn default_config() -> LiveConfig {
    LiveConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.livetrace.local.json)
/// 3. Workspace config (.livetrace.json)
/// 4. Global config (~/.livetrace/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> LiveConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, config);
    }

    apply_cli_options(&mut result, cli);
    result
}

fn apply_workspace_config(result: &mut LiveConfig, config: WorkspaceConfig) {
    let WorkspaceConfig {
        max_entries,
        debounce_ms,
        health_interval_ms,
        heartbeat_interval_ms,
        max_entries_per_push,
        gc_window_ms,
        lag_resolution_ms,
        stall_threshold_ms,
        pause_capacity,
        bind,
        correlation_header,
    } = config;

    set(&mut result.max_entries, max_entries);
    set(&mut result.debounce_ms, debounce_ms);
    set(&mut result.health_interval_ms, health_interval_ms);
    set(&mut result.heartbeat_interval_ms, heartbeat_interval_ms);
    set(&mut result.max_entries_per_push, max_entries_per_push);
    set(&mut result.gc_window_ms, gc_window_ms);
    set(&mut result.lag_resolution_ms, lag_resolution_ms);
    set(&mut result.stall_threshold_ms, stall_threshold_ms);
    set(&mut result.pause_capacity, pause_capacity);
    set(&mut result.bind, bind);
    set(&mut result.correlation_header, correlation_header);
}

fn apply_cli_options(result: &mut LiveConfig, cli: CliOptions) {
    set(&mut result.bind, cli.bind);
    set(&mut result.max_entries, cli.max_entries);
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
