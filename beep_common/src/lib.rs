//! Beep Common Library
//!
//! This crate provides the constants, configuration loading and
//! collaborator contracts shared by the beep driver crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Driver names, default durations and device numbering
//! - [`config`] - Configuration loading traits and types
//! - [`error`] - Attach, write and file-operation error types
//! - [`gpio`] - GPIO line and provider contracts
//! - [`registration`] - Character-device registration contracts
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use beep_common::prelude::*;
//!
//! let config = BeepConfig::default();
//! assert_eq!(config.device.ringing_duration(), DEFAULT_RINGING_DURATION);
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod gpio;
pub mod prelude;
pub mod registration;
