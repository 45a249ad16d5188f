//! GPIO backends.
//!
//! - [`simulation`] - In-memory lines for development and testing
//! - `cdev` - Linux GPIO character device (`cdev` feature)
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `GpioProvider` from `beep_common::gpio`
//! 3. Add a `GpioBackend` variant and map it in [`provider_for`]

#[cfg(feature = "cdev")]
pub mod cdev;
pub mod simulation;

use beep_common::config::GpioBackend;
use beep_common::gpio::{GpioError, GpioProvider};
use std::sync::Arc;

/// Build the provider for a configured backend.
///
/// # Errors
/// Returns `GpioError::Backend` if the backend was not compiled in.
pub fn provider_for(backend: GpioBackend) -> Result<Arc<dyn GpioProvider>, GpioError> {
    match backend {
        GpioBackend::Simulation => Ok(Arc::new(simulation::SimulatedGpio::default())),
        #[cfg(feature = "cdev")]
        GpioBackend::Cdev => Ok(Arc::new(cdev::CdevGpio::new())),
        #[cfg(not(feature = "cdev"))]
        GpioBackend::Cdev => Err(GpioError::Backend(
            "built without the `cdev` feature".to_string(),
        )),
    }
}
