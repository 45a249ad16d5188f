//! Error types for the device lifecycle and the byte protocol.

use crate::gpio::GpioError;
use crate::registration::RegistrationError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while attaching a device.
///
/// Whatever was acquired before the failing step has been released by the
/// time one of these is returned.
#[derive(Debug, Clone, Error)]
pub enum AttachError {
    /// The GPIO line could not be acquired; nothing was registered.
    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(#[source] GpioError),

    /// Device registration failed; the GPIO line was released.
    #[error("registration failed: {0}")]
    RegistrationFailed(#[source] RegistrationError),

    /// The auto-shutoff worker could not be started; the GPIO line was released.
    #[error("auto-shutoff timer unavailable: {0}")]
    TimerUnavailable(String),

    /// The hardware unit is not handled by this driver.
    #[error("unsupported hardware: {0}")]
    Unsupported(String),

    /// A device is already bound for this hardware unit.
    #[error("device already bound: {0}")]
    AlreadyBound(String),

    /// The ringing duration is zero or too large to schedule a deadline.
    #[error("ringing duration {0:?} out of range")]
    DurationOutOfRange(Duration),
}

/// Errors raised by a device write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The byte is neither `'0'` nor `'1'`.
    #[error("invalid command byte 0x{0:02x}")]
    InvalidCommand(u8),
}

/// Errors raised by file operations on a device node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    /// No device node with this name is registered.
    #[error("no such device node: {0}")]
    NotFound(String),

    /// The device behind the node has been detached.
    #[error("device is detached")]
    NoDevice,
}
