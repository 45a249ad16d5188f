//! Configuration file tests.
//!
//! Loads complete, partial and malformed `beep.toml` files from a temporary
//! directory and checks defaults, overrides and validation.

use beep_common::config::{BeepConfig, ConfigError, ConfigLoader, GpioBackend, LogLevel};
use beep_common::consts::{DEFAULT_GPIO_CHIP, DEFAULT_GPIO_LINE, DEFAULT_RINGING_DURATION};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Write `content` as `beep.toml` in `dir` and return its path.
fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("beep.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn empty_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");

    let config = BeepConfig::load_validated(&path).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Info);
    assert_eq!(config.device.name, "beep");
    assert_eq!(config.device.ringing_duration(), DEFAULT_RINGING_DURATION);
    assert_eq!(config.gpio.backend, GpioBackend::Simulation);
    assert_eq!(config.gpio.chip, PathBuf::from(DEFAULT_GPIO_CHIP));
    assert_eq!(config.gpio.line, DEFAULT_GPIO_LINE);
}

#[test]
fn shipped_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/beep.toml");
    let config = BeepConfig::load_validated(&path).unwrap();
    assert_eq!(config.device.compatible, "crowpi2,beep");
    assert_eq!(config.gpio.backend, GpioBackend::Cdev);
    assert_eq!(config.device.ringing_duration(), Duration::from_secs(3));
}

#[test]
fn partial_sections_keep_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[device]
ringing_duration_ms = 250

[gpio]
chip = "/dev/gpiochip2"
"#,
    );

    let config = BeepConfig::load_validated(&path).unwrap();
    assert_eq!(config.device.name, "beep");
    assert_eq!(config.device.ringing_duration(), Duration::from_millis(250));
    assert_eq!(config.gpio.chip, PathBuf::from("/dev/gpiochip2"));
    assert_eq!(config.gpio.line, DEFAULT_GPIO_LINE);
}

#[test]
fn zero_duration_fails_validation_not_parsing() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[device]\nringing_duration_ms = 0\n");

    assert!(BeepConfig::load(&path).is_ok());
    assert!(matches!(
        BeepConfig::load_validated(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn unknown_backend_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[gpio]\nbackend = \"sysfs\"\n");

    assert!(matches!(
        BeepConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn unknown_gpio_field_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[gpio]\nactive_low = true\n");

    assert!(matches!(
        BeepConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn negative_line_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[gpio]\nline = -1\n");

    assert!(BeepConfig::load(&path).is_err());
}

#[test]
fn missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        BeepConfig::load(&dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound)
    ));
}
