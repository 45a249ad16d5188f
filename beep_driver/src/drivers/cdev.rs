//! Linux GPIO character-device backend.
//!
//! Requests the buzzer line from `/dev/gpiochipN` through the `gpio-cdev`
//! crate. The kernel keeps the line reserved for as long as the
//! `LineHandle` is open, so releasing the line is dropping the handle.

use beep_common::gpio::{GpioError, GpioLine, GpioProvider, LineRequest};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use tracing::{debug, warn};

/// Provider backed by the GPIO character device.
#[derive(Debug, Default)]
pub struct CdevGpio;

impl CdevGpio {
    /// Create the provider. Chips are opened on `acquire`.
    pub fn new() -> Self {
        Self
    }
}

fn unavailable(request: &LineRequest, error: gpio_cdev::Error) -> GpioError {
    GpioError::LineUnavailable {
        chip: request.chip.display().to_string(),
        line: request.line,
        reason: error.to_string(),
    }
}

impl GpioProvider for CdevGpio {
    fn name(&self) -> &'static str {
        "cdev"
    }

    fn acquire(&self, request: &LineRequest) -> Result<Box<dyn GpioLine>, GpioError> {
        let mut chip = Chip::new(&request.chip).map_err(|e| unavailable(request, e))?;
        let line = chip
            .get_line(request.line)
            .map_err(|e| unavailable(request, e))?;
        let handle = line
            .request(
                LineRequestFlags::OUTPUT,
                u8::from(request.initial),
                &request.consumer,
            )
            .map_err(|e| unavailable(request, e))?;

        debug!("Requested {} as output for '{}'", request, request.consumer);
        Ok(Box::new(CdevLine {
            handle,
            level: request.initial,
            label: request.to_string(),
        }))
    }
}

/// A requested output line.
struct CdevLine {
    handle: LineHandle,
    /// Last level successfully written
    level: bool,
    label: String,
}

impl GpioLine for CdevLine {
    fn set(&mut self, level: bool) {
        match self.handle.set_value(u8::from(level)) {
            Ok(()) => self.level = level,
            Err(e) => warn!("{}: failed to set {}: {}", self.label, level as u8, e),
        }
    }

    fn get(&self) -> bool {
        match self.handle.get_value() {
            Ok(value) => value != 0,
            Err(e) => {
                warn!("{}: failed to read back level: {}", self.label, e);
                self.level
            }
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
