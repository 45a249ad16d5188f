//! Constants for the beep driver.
//!
//! Single source of truth for names, device numbering and default timings.

use std::time::Duration;

/// Driver name. Also the device class name and the device node prefix.
pub const DRIVER_NAME: &str = "beep";

/// Compatible-hardware identifier the platform driver binds to.
pub const DEFAULT_COMPATIBLE: &str = "crowpi2,beep";

/// First minor number of the char-device region.
pub const MINOR_BASE: u32 = 0;

/// Number of minors allocated per driver (one line per instance).
pub const MINOR_NUM: u32 = 1;

/// Highest dynamically allocated major number.
pub const DYNAMIC_MAJOR_START: u32 = 254;

/// Lowest dynamically allocated major number.
pub const DYNAMIC_MAJOR_END: u32 = 234;

/// Default auto-shutoff duration in milliseconds.
pub const DEFAULT_RINGING_DURATION_MS: u64 = 3000;

/// Default auto-shutoff duration.
pub const DEFAULT_RINGING_DURATION: Duration = Duration::from_millis(DEFAULT_RINGING_DURATION_MS);

/// Default GPIO chip device path.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// Default GPIO line offset (buzzer on the CrowPi2 board).
pub const DEFAULT_GPIO_LINE: u32 = 18;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/beep/beep.toml";

/// Byte reported by `read` and accepted by `write` for a low line.
pub const LEVEL_LOW: u8 = b'0';

/// Byte reported by `read` and accepted by `write` for a high line.
pub const LEVEL_HIGH: u8 = b'1';

/// Format the device node name for a minor number (e.g. `beep0`).
pub fn node_name(prefix: &str, minor: u32) -> String {
    format!("{prefix}{minor}")
}
