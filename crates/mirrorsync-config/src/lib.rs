//! Configuration management for mirrorsync
//!
//! Settings for the periodic sync driver are layered from serialized defaults, an
//! optional configuration file (YAML, TOML or JSON) and `MIRRORSYNC_*` environment
//! variables. Command line flags are applied on top by the caller, after which
//! [`Config::validate`] checks the result against the filesystem.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("mirrorsync.yaml")
//!     .add_env_prefix("MIRRORSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! config.validate().expect("Invalid configuration");
//! println!("Syncing every {} seconds", config.interval_secs);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use mirrorsync_types::{ChunkSize, CompareMode, WorkerCount};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Log file written next to the console output unless configured otherwise
pub const DEFAULT_LOG_FILE: &str = "sync.log";

/// Accepted log levels, least to most severe
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Map a user supplied log level onto one of [`LOG_LEVELS`].
///
/// Case-insensitive; `warning` and `critical` are accepted as aliases.
pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" => Some("error"),
        _ => None,
    }
}

/// Main configuration structure for mirrorsync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to mirror
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Directory kept identical to the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<PathBuf>,
    /// Seconds to wait between cycles
    pub interval_secs: u64,
    /// Number of parallel copies
    pub workers: WorkerCount,
    /// Log file written in addition to the console; `None` logs to the console only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Log level
    pub log_level: String,
    /// Trust matching size and mtime instead of always comparing digests
    pub quick_check: bool,
    /// Read size used for digests
    pub chunk_size: ChunkSize,
    /// Stop the loop when a cycle fails fatally instead of retrying next interval
    pub stop_on_fatal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            replica: None,
            interval_secs: 60,
            workers: WorkerCount::default(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            log_level: "info".to_string(),
            quick_check: false,
            chunk_size: ChunkSize::default(),
            stop_on_fatal: true,
        }
    }
}

impl Config {
    /// Time to wait between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Change detection mode selected by `quick_check`
    pub fn compare_mode(&self) -> CompareMode {
        if self.quick_check {
            CompareMode::QuickCheck
        } else {
            CompareMode::Digest
        }
    }

    /// Check values that do not depend on the filesystem
    pub fn validate_values(&self) -> ConfigResult<()> {
        if self.interval_secs == 0 {
            return Err(ConfigError::validation("Interval must be greater than 0"));
        }

        if normalize_log_level(&self.log_level).is_none() {
            return Err(ConfigError::invalid_value(
                "log_level",
                format!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }

    /// Full validation, including the source, replica and log file locations
    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_values()?;

        let source = self
            .source
            .as_deref()
            .ok_or_else(|| ConfigError::missing_required("source"))?;
        let replica = self
            .replica
            .as_deref()
            .ok_or_else(|| ConfigError::missing_required("replica"))?;

        if !source.is_dir() {
            return Err(ConfigError::validation(format!(
                "Source directory '{}' does not exist or is not a directory",
                source.display()
            )));
        }

        if replica.exists() && !replica.is_dir() {
            return Err(ConfigError::validation(format!(
                "Replica path '{}' exists and is not a directory",
                replica.display()
            )));
        }

        let source = comparable(source);
        let replica = comparable(replica);
        if replica.starts_with(&source) || source.starts_with(&replica) {
            return Err(ConfigError::validation(
                "Source and replica must not contain one another",
            ));
        }

        if let Some(log_file) = &self.log_file {
            let parent = log_file.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                if !parent.is_dir() {
                    return Err(ConfigError::validation(format!(
                        "Log directory '{}' does not exist",
                        parent.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Absolute form of `path` with its longest existing prefix canonicalized.
///
/// Roots that do not exist yet still compare correctly against ones that do.
fn comparable(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |resolved, name| resolved.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}
