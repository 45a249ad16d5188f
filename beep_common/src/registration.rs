//! Character-device registration contracts.
//!
//! A driver publishes its device by handing a [`FileOperations`] object to
//! a [`DeviceClassRegistry`]. The registry allocates a device number,
//! creates the device class and node, and routes `open`/`read`/`write`/
//! `close` from callers to the registered object until `unregister`.

use crate::error::FileError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error types for device registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// No free major number in the dynamic range.
    #[error("no char-device region available for '{0}'")]
    RegionUnavailable(String),

    /// A device class with this name already exists.
    #[error("device class '{0}' already exists")]
    ClassExists(String),

    /// A device node with this name already exists.
    #[error("device node '{0}' already exists")]
    NodeExists(String),
}

/// Major/minor device number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DevNum {
    /// Major number (identifies the driver)
    pub major: u32,
    /// Minor number (identifies the instance)
    pub minor: u32,
}

impl DevNum {
    /// Build a device number.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Token for one registration, returned by `register` and consumed by
/// `unregister`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    class: String,
    node: String,
    devnum: DevNum,
}

impl RegistrationHandle {
    /// Build a handle. Only registry implementations should need this.
    pub fn new(class: impl Into<String>, node: impl Into<String>, devnum: DevNum) -> Self {
        Self {
            class: class.into(),
            node: node.into(),
            devnum,
        }
    }

    /// Device class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Device node name (e.g. `beep0`).
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Allocated device number.
    pub fn devnum(&self) -> DevNum {
        self.devnum
    }
}

/// Handlers a registered device exposes to callers.
///
/// All methods may be called concurrently from any number of threads.
pub trait FileOperations: Send + Sync {
    /// A caller opened the node.
    ///
    /// # Errors
    /// `FileError::NoDevice` once the device is being torn down.
    fn open(&self) -> Result<(), FileError>;

    /// A caller closed the node. Default: no-op.
    fn release(&self) {}

    /// Fill `buf` from the device; returns the number of bytes produced.
    fn read(&self, buf: &mut [u8]) -> Result<usize, FileError>;

    /// Consume bytes from `buf`; returns the number of bytes consumed.
    fn write(&self, buf: &[u8]) -> Result<usize, FileError>;
}

/// Registration service for character devices.
pub trait DeviceClassRegistry: Send + Sync {
    /// Publish `fops` under device class `class` with node
    /// `{node_prefix}{minor}`.
    ///
    /// # Errors
    /// Returns `RegistrationError` if any step fails; steps already taken
    /// are rolled back before returning.
    fn register(
        &self,
        class: &str,
        node_prefix: &str,
        fops: Arc<dyn FileOperations>,
    ) -> Result<RegistrationHandle, RegistrationError>;

    /// Tear down a registration. Unknown or already removed handles are
    /// ignored.
    fn unregister(&self, handle: &RegistrationHandle);
}
