//! Platform driver: binds the beep device to discovered hardware.
//!
//! The `BeepPlatformDriver` receives hardware units from discovery,
//! matches them by compatible identifier, attaches at most one
//! [`BeepDevice`] (probe) and detaches it on removal.

use crate::device::{BeepDevice, DeviceParams};
use beep_common::config::{BeepConfig, DeviceConfig};
use beep_common::error::AttachError;
use beep_common::gpio::{GpioProvider, LineRequest};
use beep_common::registration::DeviceClassRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// A discovered hardware unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareUnit {
    /// Compatible identifier (e.g. `crowpi2,beep`)
    pub compatible: String,
    /// GPIO chip the buzzer is wired to
    pub chip: PathBuf,
    /// Line offset on that chip
    pub line: u32,
}

impl HardwareUnit {
    /// The unit described by the configuration file.
    pub fn from_config(config: &BeepConfig) -> Self {
        Self {
            compatible: config.device.compatible.clone(),
            chip: config.gpio.chip.clone(),
            line: config.gpio.line,
        }
    }
}

/// Platform driver for the beeper.
pub struct BeepPlatformDriver {
    /// Device identity and timing
    config: DeviceConfig,
    /// GPIO backend
    provider: Arc<dyn GpioProvider>,
    /// Char-device registration service
    registry: Arc<dyn DeviceClassRegistry>,
    /// Bound device, if probed
    bound: Option<BeepDevice>,
}

impl BeepPlatformDriver {
    /// Create an unbound driver.
    pub fn new(
        config: DeviceConfig,
        provider: Arc<dyn GpioProvider>,
        registry: Arc<dyn DeviceClassRegistry>,
    ) -> Self {
        info!(
            "Platform driver '{}' ready for '{}' via {}",
            config.name,
            config.compatible,
            provider.name()
        );
        Self {
            config,
            provider,
            registry,
            bound: None,
        }
    }

    /// True if this driver handles `unit`.
    pub fn matches(&self, unit: &HardwareUnit) -> bool {
        unit.compatible == self.config.compatible
    }

    /// Attach the device for `unit`.
    ///
    /// # Errors
    /// - `AttachError::Unsupported` if `unit` does not match
    /// - `AttachError::AlreadyBound` if a device is already attached
    /// - any error from [`BeepDevice::attach`]
    pub fn probe(&mut self, unit: &HardwareUnit) -> Result<&BeepDevice, AttachError> {
        if !self.matches(unit) {
            return Err(AttachError::Unsupported(unit.compatible.clone()));
        }
        if let Some(device) = &self.bound {
            return Err(AttachError::AlreadyBound(device.node().to_string()));
        }

        debug!("Probing {:?}", unit);
        let params = DeviceParams {
            name: self.config.name.clone(),
            line: LineRequest::output_low(unit.chip.clone(), unit.line, self.config.name.clone()),
            ringing_duration: self.config.ringing_duration(),
        };
        let device = BeepDevice::attach(
            Arc::clone(&self.provider),
            Arc::clone(&self.registry),
            &params,
        )?;
        Ok(&*self.bound.insert(device))
    }

    /// Detach the bound device. Returns `false` if nothing was bound.
    pub fn remove(&mut self) -> bool {
        match self.bound.take() {
            Some(device) => {
                device.detach();
                true
            }
            None => {
                debug!("Remove with no bound device");
                false
            }
        }
    }

    /// The bound device, if any.
    pub fn device(&self) -> Option<&BeepDevice> {
        self.bound.as_ref()
    }
}
