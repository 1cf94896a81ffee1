// crates/flowctl-config/src/lib.rs
// ============================================================================
// Crate: flowctl-config
// Description: Canonical configuration model and loading for the flowctl
//   binary.
// ============================================================================

//! # flowctl-config
//!
//! Loads and validates flowctl's TOML configuration file. Every field has a
//! sensible default so a minimal or empty file still produces a usable
//! configuration.

#![forbid(unsafe_code)]

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

// ============================================================================
// SECTION: ConfigError
// ============================================================================

/// Error loading or validating a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file was not valid TOML, or did not match
    /// [`Config`]'s shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A parsed configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: LogFormat
// ============================================================================

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text, suitable for a terminal.
    #[default]
    Text,
    /// Newline-delimited JSON, suitable for log aggregation.
    Json,
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Top-level flowctl configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite rule store database.
    pub db_path: PathBuf,
    /// Interval, in seconds, between reconciliation passes.
    pub monitor_interval_secs: u64,
    /// Structured log output format.
    pub log_format: LogFormat,
    /// `tracing-subscriber` `EnvFilter` directive string, e.g. `"info"`.
    pub log_filter: String,
    /// TCP listen address for the OpenFlow switch-facing listener.
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("flowctl.db"),
            monitor_interval_secs: 10,
            log_format: LogFormat::default(),
            log_filter: "info".to_owned(),
            listen_addr: "0.0.0.0:6653".to_owned(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if its contents are not valid TOML, or
    /// [`ConfigError::Invalid`] if the parsed value fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field combinations that serde's type system cannot
    /// express on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `monitor_interval_secs` is
    /// zero or `db_path`/`listen_addr` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor_interval_secs == 0 {
            return Err(ConfigError::Invalid("monitor_interval_secs must be greater than 0".to_owned()));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_owned()));
        }
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("listen_addr must not be empty".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        missing_docs,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config { monitor_interval_secs: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_minimal_toml_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flowctl.toml");
        std::fs::write(&path, "monitor_interval_secs = 5\n").expect("writes");
        let config = Config::load(&path).expect("loads");
        assert_eq!(config.monitor_interval_secs, 5);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flowctl.toml");
        std::fs::write(&path, "not = [valid").expect("writes");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let missing = PathBuf::from("/nonexistent/flowctl.toml");
        assert!(matches!(Config::load(missing), Err(ConfigError::Read { .. })));
    }
}
