//! # Beep Driver Library
//!
//! A buzzer on a GPIO line exposed as a byte-oriented character device.
//! Writing `'1'` energizes the line and arms an auto-shutoff timer, writing
//! `'0'` de-energizes it, reading returns the level as `'0'` or `'1'`.
//!
//! # Module Structure
//!
//! - [`device`] - `BeepDevice`, the protocol and attach/detach
//! - [`timer`] - Auto-shutoff state machine and worker thread
//! - [`registry`] - In-process char-device registry and open files
//! - [`platform`] - Compatible matching, probe and remove
//! - [`drivers`] - GPIO backends (simulation, cdev)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     beep_driver                                │
//! │  ┌──────────────┐   open    ┌──────────────────────────────┐   │
//! │  │ CharDevice   │──────────►│  BeepDevice                  │   │
//! │  │ Registry     │ read/write│  ┌────────────────────────┐  │   │
//! │  └──────────────┘           │  │ Guarded { gpio, timer }│  │   │
//! │         ▲                   │  └───────────▲────────────┘  │   │
//! │         │ register          │              │ ForceOff      │   │
//! │  ┌──────┴───────┐  attach   │  ┌───────────┴────────────┐  │   │
//! │  │ Platform     │──────────►│  │ TimerWorker (thread)   │  │   │
//! │  │ Driver       │           │  └────────────────────────┘  │   │
//! │  └──────────────┘           └──────────────┬───────────────┘   │
//! │                                            ▼                   │
//! │                                   GpioProvider (drivers/)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod device;
pub mod drivers;
pub mod platform;
pub mod registry;
pub mod timer;

// Re-export key types for convenience
pub use crate::device::{BeepDevice, DeviceParams, DeviceStatus};
pub use crate::platform::{BeepPlatformDriver, HardwareUnit};
pub use crate::registry::{CharDeviceRegistry, OpenFile};
