// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

use super::types::WorkspaceConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".livetrace.json",
    ".livetrace/config.json",
    "livetrace.config.yaml",
];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".livetrace.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".livetrace";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.livetrace/config.json.
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    match get_global_config_path() {
        Some(path) => load_optional(&path),
        None => Ok(None),
    }
}

/// Load workspace configuration from the workspace root.
///
/// The first of [`CONFIG_FILES`] that exists wins.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .livetrace.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    load_optional(&workspace_root.join(LOCAL_CONFIG_FILE))
}

fn load_optional(path: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

/// Load a configuration file (JSON or YAML by extension).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "loading config file");

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Save workspace configuration to a file.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &WorkspaceConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let path = workspace_root.join(filename.unwrap_or(CONFIG_FILES[0]));

    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Write a new workspace config file, refusing to overwrite one.
pub fn init_config(
    workspace_root: &Path,
    config: Option<WorkspaceConfig>,
) -> Result<PathBuf, ConfigError> {
    let target = workspace_root.join(CONFIG_FILES[0]);
    if target.exists() {
        return Err(ConfigError::invalid(
            "path",
            format!("{} already exists", target.display()),
        ));
    }
    let config = config.unwrap_or_else(get_example_config);
    save_workspace_config(workspace_root, &config, None)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| CONFIG_FILES.iter().any(|name| dir.join(name).exists()))
        .map(Path::to_path_buf)
}

/// Get an example configuration.
pub fn get_example_config() -> WorkspaceConfig {
    WorkspaceConfig {
        max_entries: Some(10_000),
        debounce_ms: Some(100),
        health_interval_ms: Some(2_000),
        heartbeat_interval_ms: Some(15_000),
        bind: Some("127.0.0.1:7878".to_string()),
        correlation_header: Some("x-correlation-id".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_files_order() {
        assert_eq!(CONFIG_FILES.len(), 3);
        assert_eq!(CONFIG_FILES[0], ".livetrace.json");
    }

    #[test]
    fn test_global_config_dir() {
        if let Some(dir) = get_global_config_dir() {
            assert!(dir.ends_with(".livetrace"));
        }
    }

    #[test]
    fn test_load_workspace_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_workspace_config(temp.path());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".livetrace.json"),
            r#"{"maxEntries": 64, "debounceMs": 5}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.max_entries, Some(64));
        assert_eq!(config.debounce_ms, Some(5));
    }

    #[test]
    fn test_load_workspace_config_nested_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".livetrace");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("config.json"), r#"{"bind": "0.0.0.0:80"}"#).unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0:80"));
    }

    #[test]
    fn test_load_workspace_config_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("livetrace.config.yaml"),
            "maxEntriesPerPush: 20\nheartbeatIntervalMs: 1000\n",
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.max_entries_per_push, Some(20));
        assert_eq!(config.heartbeat_interval_ms, Some(1000));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".livetrace.json"), "{ not json").unwrap();
        assert!(matches!(
            load_workspace_config(temp.path()),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_local_config() {
        let temp = TempDir::new().unwrap();
        assert!(load_local_config(temp.path()).unwrap().is_none());

        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), r#"{"gcWindowMs": 1}"#).unwrap();
        let config = load_local_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.gc_window_ms, Some(1));
    }

    #[test]
    fn test_save_workspace_config() {
        let temp = TempDir::new().unwrap();
        let config = WorkspaceConfig {
            pause_capacity: Some(77),
            ..Default::default()
        };

        let saved_path = save_workspace_config(temp.path(), &config, None).unwrap();
        let content = std::fs::read_to_string(&saved_path).unwrap();
        assert!(content.contains("pauseCapacity"));
        assert_eq!(load_config_file(&saved_path).unwrap(), config);
    }

    #[test]
    fn test_find_workspace_root() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(temp.path().join(".livetrace.json"), "{}").unwrap();

        assert_eq!(find_workspace_root(&subdir).unwrap(), temp.path());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = init_config(temp.path(), None).unwrap();
        assert_eq!(path.file_name().unwrap(), ".livetrace.json");
        assert_eq!(load_config_file(&path).unwrap(), get_example_config());

        assert!(init_config(temp.path(), None).is_err());
    }
}
