//! GPIO line and provider contracts.
//!
//! This module defines:
//! - `GpioLine` trait - a single digital output pin
//! - `GpioProvider` trait - acquires and releases lines for a hardware unit
//! - `LineRequest` struct - what a driver asks the provider for
//! - `GpioError` enum - acquisition failures
//!
//! Once acquired, a line is treated as infallible: backends that can fail
//! on individual `set`/`get` calls log the failure and keep reporting the
//! last level written.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for GPIO acquisition.
#[derive(Debug, Clone, Error)]
pub enum GpioError {
    /// The requested line does not exist or the chip cannot be opened.
    #[error("GPIO line {line} on {chip} unavailable: {reason}")]
    LineUnavailable {
        /// Chip device path
        chip: String,
        /// Line offset
        line: u32,
        /// Backend-specific reason
        reason: String,
    },

    /// The line is already held by another consumer.
    #[error("GPIO line {line} on {chip} is busy")]
    LineBusy {
        /// Chip device path
        chip: String,
        /// Line offset
        line: u32,
    },

    /// Backend failure not tied to a specific line.
    #[error("GPIO backend error: {0}")]
    Backend(String),
}

/// Request for a single output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    /// Chip device path (e.g. `/dev/gpiochip0`)
    pub chip: PathBuf,
    /// Line offset within the chip
    pub line: u32,
    /// Consumer label shown by the kernel for this line
    pub consumer: String,
    /// Level driven immediately after acquisition
    pub initial: bool,
}

impl LineRequest {
    /// Request an output line that starts low.
    pub fn output_low(chip: impl Into<PathBuf>, line: u32, consumer: impl Into<String>) -> Self {
        Self {
            chip: chip.into(),
            line,
            consumer: consumer.into(),
            initial: false,
        }
    }
}

impl fmt::Display for LineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chip.display(), self.line)
    }
}

/// A single digital output pin.
///
/// Implementations must be `Send`: the auto-shutoff worker drives the line
/// from its own thread while holding the device lock.
pub trait GpioLine: Send {
    /// Drive the line (`true` = high/energized).
    fn set(&mut self, level: bool);

    /// Current line level.
    fn get(&self) -> bool;

    /// Human-readable identity for logs (e.g. `/dev/gpiochip0:18`).
    fn label(&self) -> String;
}

/// Source of GPIO lines for a hardware unit.
///
/// # Lifecycle
///
/// 1. `acquire()` - called once at attach; the returned line is an output
///    already driven to `request.initial`
/// 2. `release()` - called exactly once at detach with the same line
pub trait GpioProvider: Send + Sync {
    /// Returns the backend identifier (e.g. "simulation", "cdev").
    fn name(&self) -> &'static str;

    /// Acquire the requested line.
    ///
    /// # Errors
    /// Returns `GpioError` if the line cannot be configured for output.
    fn acquire(&self, request: &LineRequest) -> Result<Box<dyn GpioLine>, GpioError>;

    /// Return a line to the provider.
    ///
    /// Default implementation drops the handle, which closes it.
    fn release(&self, line: Box<dyn GpioLine>) {
        drop(line);
    }
}
