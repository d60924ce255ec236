//! Session configuration
//!
//! Loaded from defaults, then a TOML file, then `BUILD_SESSION_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Dialect;
use crate::environment::DirectoryToolchain;

/// Default drain window between "process exited" and finalize
pub const DEFAULT_COMPLETION_DELAY_MS: u64 = 200;

/// Default time a build may run without reporting completion
pub const DEFAULT_WATCHDOG_TIMEOUT_SECS: u64 = 900;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// What `start` does while another build is in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Discard the in-flight build (restoring its environment patch) and
    /// start the new one
    #[default]
    Replace,
    /// Refuse the new build with a busy signal
    Reject,
}

impl std::str::FromStr for ReentryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown reentry policy: {other}")),
        }
    }
}

/// Build session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between `on_build_complete` and finalize, so trailing stderr
    /// still lands in the buffers. A mitigation, not a guarantee.
    pub completion_delay_ms: u64,
    /// Finalize a build as failed if it never reports completion.
    /// `0` disables the watchdog.
    pub watchdog_timeout_secs: u64,
    pub reentry: ReentryPolicy,
    pub dialect: Dialect,
    /// Search-path variable patched for the toolchain
    pub path_variable: String,
    /// Terminate every console chunk with `\n`
    pub normalize_newlines: bool,
    pub toolchain: DirectoryToolchain,
    /// Replaced by `~` in reported target paths
    pub home_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: DEFAULT_COMPLETION_DELAY_MS,
            watchdog_timeout_secs: DEFAULT_WATCHDOG_TIMEOUT_SECS,
            reentry: ReentryPolicy::Replace,
            dialect: Dialect::Gcc,
            path_variable: "PATH".to_string(),
            normalize_newlines: cfg!(windows),
            toolchain: DirectoryToolchain::default(),
            home_dir: default_home_dir(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Override fields from `BUILD_SESSION_*` variables
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        if let Ok(ms) = std::env::var("BUILD_SESSION_COMPLETION_DELAY_MS") {
            self.completion_delay_ms = parse_value("BUILD_SESSION_COMPLETION_DELAY_MS", &ms)?;
        }
        if let Ok(secs) = std::env::var("BUILD_SESSION_WATCHDOG_TIMEOUT_SECS") {
            self.watchdog_timeout_secs =
                parse_value("BUILD_SESSION_WATCHDOG_TIMEOUT_SECS", &secs)?;
        }
        if let Ok(policy) = std::env::var("BUILD_SESSION_REENTRY") {
            self.reentry = parse_value("BUILD_SESSION_REENTRY", &policy)?;
        }
        if let Ok(dialect) = std::env::var("BUILD_SESSION_DIALECT") {
            self.dialect = parse_value("BUILD_SESSION_DIALECT", &dialect)?;
        }
        if let Ok(var) = std::env::var("BUILD_SESSION_PATH_VARIABLE") {
            self.path_variable = var;
        }
        if let Ok(val) = std::env::var("BUILD_SESSION_NORMALIZE_NEWLINES") {
            self.normalize_newlines = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(name) = std::env::var("BUILD_SESSION_TOOLCHAIN_NAME") {
            self.toolchain.name = name;
        }
        if let Some(dirs) = std::env::var_os("BUILD_SESSION_TOOLCHAIN_DIRS") {
            self.toolchain.dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        Ok(())
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    pub fn watchdog_timeout(&self) -> Option<Duration> {
        (self.watchdog_timeout_secs > 0).then(|| Duration::from_secs(self.watchdog_timeout_secs))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn default_home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
