//! Configuration structures for pathmux.
//!
//! - [`WatchConfig`] - Watcher settings (coverage depth, backend, path resolution)
//! - [`LogConfig`] - Logging settings for the binary
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a config file only needs the keys it changes.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which low-level change-notification primitive backs the watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The platform's recommended native watcher (inotify, `FSEvents`, ...).
    #[default]
    Native,
    /// Periodic stat polling. Useful on network filesystems.
    Poll,
}

/// Configuration for the path watcher.
///
/// # Examples
///
/// ```
/// use pmx_core::{BackendKind, WatchConfig};
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.backend, BackendKind::Native);
/// assert!(config.resolve_relative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether a directory watch covers every descendant.
    ///
    /// When `false`, a directory only covers its direct children and its
    /// low-level watch is non-recursive.
    pub recursive: bool,

    /// The low-level primitive to use.
    pub backend: BackendKind,

    /// Polling period in milliseconds, used only by [`BackendKind::Poll`].
    pub poll_interval_ms: u64,

    /// Whether relative paths are joined onto a base directory before use.
    ///
    /// Native watchers report absolute paths, so registry keys must be
    /// absolute for events to find their subscribers.
    pub resolve_relative: bool,

    /// Base directory for relative paths. `None` means the process working
    /// directory at watcher construction time.
    pub base_dir: Option<Utf8PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            backend: BackendKind::Native,
            poll_interval_ms: 1000,
            resolve_relative: true,
            base_dir: None,
        }
    }
}

impl WatchConfig {
    /// Checks option values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Poll && self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidOption {
                option: "watch.poll_interval_ms".to_owned(),
                reason: "must be greater than zero for the poll backend".to_owned(),
            });
        }

        match &self.base_dir {
            Some(base) if !base.is_absolute() => Err(ConfigError::InvalidPath {
                path: base.clone(),
                reason: "base_dir must be absolute".to_owned(),
            }),
            _ => Ok(()),
        }
    }
}

/// Logging configuration for the `pathmux` binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. `info`).
    pub level: String,

    /// Whether to emit ANSI colors.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            color: true,
        }
    }
}

/// Root configuration for pathmux.
///
/// # Examples
///
/// ```
/// use pmx_core::Config;
///
/// let config = Config::from_json_str(r#"{"watch": {"recursive": false}}"#)?;
/// assert!(!config.watch.recursive);
/// assert_eq!(config.log.level, "info");
/// # Ok::<(), pmx_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watcher configuration.
    pub watch: WatchConfig,

    /// Logging configuration.
    pub log: LogConfig,
}

impl Config {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON configuration file.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_std_path())?;
        Self::from_json_str(&contents)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert!(config.recursive);
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(config.resolve_relative);
        assert!(config.base_dir.is_none());
    }

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.color);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let config = Config::from_json_str(r#"{"watch": {"backend": "poll"}}"#).unwrap();
        assert_eq!(config.watch.backend, BackendKind::Poll);
        assert!(config.watch.recursive);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_backend_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&BackendKind::Native).unwrap(),
            r#""native""#
        );
        assert_eq!(serde_json::to_string(&BackendKind::Poll).unwrap(), r#""poll""#);
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let result = Config::from_json_str(
            r#"{"watch": {"backend": "poll", "poll_interval_ms": 0}}"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
    }

    #[test]
    fn test_validate_ignores_poll_interval_for_native() {
        let config = WatchConfig {
            poll_interval_ms: 0,
            ..WatchConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_base_dir() {
        let config = WatchConfig {
            base_dir: Some(Utf8PathBuf::from("relative/dir")),
            ..WatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pathmux.json");
        fs::write(&path, r#"{"log": {"level": "debug", "color": false}}"#).unwrap();

        let path = Utf8PathBuf::from_path_buf(path).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.log.level, "debug");
        assert!(!config.log.color);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Utf8Path::new("/nonexistent/pathmux.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
