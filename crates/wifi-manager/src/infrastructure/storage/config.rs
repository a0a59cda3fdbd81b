//! TOML-based configuration for the Wifi Manager service.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\WifiManager\config.toml`
//! - Linux:    `~/.config/wifimanager/config.toml`
//! - macOS:    `~/Library/Application Support/WifiManager/config.toml`
//!
//! or from an explicit path given with `--config`.
//!
//! ```toml
//! [manager]
//! log_level = "info"
//!
//! [timing]
//! tick_interval_secs = 60
//! foreign_grace_ticks = 5
//! unblock_every_ticks = 75
//!
//! [codes]
//! min_duration = 5
//! max_duration = 60
//! default_duration = 60
//!
//! [workers]
//! registration_workers = 2
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, so a missing file, a
//! missing section, or a missing key all fall back to the values above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::issue_codes::DurationPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub codes: CodesConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagerConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Tick cadence and the counters measured in ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Seconds between two ticks.  Code durations are counted in ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Ticks a foreign device is tolerated before it is blocked.
    #[serde(default = "default_foreign_grace_ticks")]
    pub foreign_grace_ticks: u32,
    /// Every this many ticks, all router blocks are lifted.  `0` disables it.
    #[serde(default = "default_unblock_every_ticks")]
    pub unblock_every_ticks: u32,
}

/// Bounds applied to operator-requested code durations, in ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodesConfig {
    #[serde(default = "default_min_duration")]
    pub min_duration: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration: u32,
    /// Used when the requested duration cannot be parsed.
    #[serde(default = "default_max_duration")]
    pub default_duration: u32,
}

/// Concurrency of the registration queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkersConfig {
    #[serde(default = "default_registration_workers")]
    pub registration_workers: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_foreign_grace_ticks() -> u32 {
    wifi_core::GRACE
}
fn default_unblock_every_ticks() -> u32 {
    75
}
fn default_min_duration() -> u32 {
    5
}
fn default_max_duration() -> u32 {
    60
}
fn default_registration_workers() -> usize {
    2
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            foreign_grace_ticks: default_foreign_grace_ticks(),
            unblock_every_ticks: default_unblock_every_ticks(),
        }
    }
}

impl Default for CodesConfig {
    fn default() -> Self {
        Self {
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            default_duration: default_max_duration(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            registration_workers: default_registration_workers(),
        }
    }
}

impl From<&CodesConfig> for DurationPolicy {
    fn from(cfg: &CodesConfig) -> Self {
        Self {
            min: cfg.min_duration,
            max: cfg.max_duration,
            fallback: cfg.default_duration,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl AppConfig {
    /// Rejects values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.tick_interval_secs == 0 {
            return Err(invalid("timing.tick_interval_secs", "must be at least 1"));
        }
        if self.timing.foreign_grace_ticks == 0 {
            return Err(invalid("timing.foreign_grace_ticks", "must be at least 1"));
        }
        if self.codes.min_duration == 0 {
            return Err(invalid("codes.min_duration", "must be at least 1"));
        }
        if self.codes.min_duration > self.codes.max_duration {
            return Err(invalid(
                "codes.min_duration",
                format!("exceeds max_duration {}", self.codes.max_duration),
            ));
        }
        if !(self.codes.min_duration..=self.codes.max_duration)
            .contains(&self.codes.default_duration)
        {
            return Err(invalid(
                "codes.default_duration",
                "must lie within min_duration..=max_duration",
            ));
        }
        if self.workers.registration_workers == 0 {
            return Err(invalid("workers.registration_workers", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates `AppConfig` from `path`, returning
/// `AppConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("WifiManager"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("wifimanager"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("WifiManager")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
