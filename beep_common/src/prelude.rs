//! Prelude module for common re-exports.
//!
//! # Usage
//!
//! ```rust
//! use beep_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    BeepConfig, ConfigError, ConfigLoader, DeviceConfig, GpioBackend, GpioConfig, LogLevel,
    SharedConfig,
};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{DEFAULT_RINGING_DURATION, DRIVER_NAME, LEVEL_HIGH, LEVEL_LOW};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{AttachError, FileError, WriteError};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::gpio::{GpioError, GpioLine, GpioProvider, LineRequest};
pub use crate::registration::{
    DevNum, DeviceClassRegistry, FileOperations, RegistrationError, RegistrationHandle,
};
