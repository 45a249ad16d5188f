//! Configuration loading traits and types.
//!
//! The driver is configured from a single TOML file. Every section has
//! defaults, so an empty file describes the stock CrowPi2 buzzer driven by
//! the simulation backend.
//!
//! # Usage
//!
//! ```rust,no_run
//! use beep_common::config::{BeepConfig, ConfigError, ConfigLoader};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = BeepConfig::load(Path::new("beep.toml"))?;
//!     config.validate()?;
//!     println!("Device: {}", config.device.name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_COMPATIBLE, DEFAULT_GPIO_CHIP, DEFAULT_GPIO_LINE, DEFAULT_RINGING_DURATION_MS,
    DRIVER_NAME,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "beepd-crowpi2"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "beepd".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Device identity and timing, fixed at attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Driver/class name; the node is `{name}{minor}`.
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Compatible-hardware identifier this driver binds to.
    #[serde(default = "default_compatible")]
    pub compatible: String,

    /// Auto-shutoff duration in milliseconds.
    #[serde(default = "default_ringing_duration_ms")]
    pub ringing_duration_ms: u64,
}

fn default_device_name() -> String {
    DRIVER_NAME.to_string()
}

fn default_compatible() -> String {
    DEFAULT_COMPATIBLE.to_string()
}

fn default_ringing_duration_ms() -> u64 {
    DEFAULT_RINGING_DURATION_MS
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            compatible: default_compatible(),
            ringing_duration_ms: default_ringing_duration_ms(),
        }
    }
}

impl DeviceConfig {
    /// Auto-shutoff duration as a `Duration`.
    pub fn ringing_duration(&self) -> Duration {
        Duration::from_millis(self.ringing_duration_ms)
    }
}

/// GPIO backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    /// In-memory lines, no hardware required.
    #[default]
    Simulation,
    /// Linux GPIO character device (`/dev/gpiochipN`).
    Cdev,
}

/// GPIO line assignment for the buzzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioConfig {
    /// Backend used to acquire the line.
    #[serde(default)]
    pub backend: GpioBackend,

    /// GPIO chip device path.
    #[serde(default = "default_chip")]
    pub chip: PathBuf,

    /// Line offset within the chip.
    #[serde(default = "default_line")]
    pub line: u32,
}

fn default_chip() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_CHIP)
}

fn default_line() -> u32 {
    DEFAULT_GPIO_LINE
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: GpioBackend::default(),
            chip: default_chip(),
            line: default_line(),
        }
    }
}

/// Complete driver configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "info"
///
/// [device]
/// name = "beep"
/// compatible = "crowpi2,beep"
/// ringing_duration_ms = 3000
///
/// [gpio]
/// backend = "cdev"
/// chip = "/dev/gpiochip0"
/// line = 18
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeepConfig {
    /// Logging and instance identity.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Device identity and timing.
    #[serde(default)]
    pub device: DeviceConfig,

    /// GPIO assignment.
    #[serde(default)]
    pub gpio: GpioConfig,
}

impl BeepConfig {
    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` or `device.name` is empty
    /// - `device.name` contains a path separator
    /// - `device.compatible` is empty
    /// - `ringing_duration_ms` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.device.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "device.name cannot be empty".to_string(),
            ));
        }
        if self.device.name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "device.name '{}' must not contain '/'",
                self.device.name
            )));
        }
        if self.device.compatible.is_empty() {
            return Err(ConfigError::ValidationError(
                "device.compatible cannot be empty".to_string(),
            ));
        }
        if self.device.ringing_duration_ms == 0 {
            return Err(ConfigError::ValidationError(
                "device.ringing_duration_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration file.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
