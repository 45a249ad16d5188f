//! Timed actuator device.
//!
//! [`BeepDevice`] owns one GPIO line and one auto-shutoff timer. Writing
//! `'1'` energizes the line and (re-)arms the timer; writing `'0'`
//! de-energizes it; reading reports the level as `'0'` or `'1'`.
//!
//! # Critical section
//!
//! The line and the timer live together in one [`Guarded`] state. Caller
//! writes and the shutoff worker both mutate it through [`Command`]s
//! applied under that lock, so "set high + arm" is never split by an
//! expiry and the last completed command determines the level.
//!
//! # Lifecycle
//!
//! ```text
//! attach:  acquire line (low) ─► start shutoff worker ─► register node
//! detach:  cancel + join worker ─► unregister node ─► drive low + release line
//! ```

use crate::timer::{Expire, Guarded, ShutoffTimer, TimerState, TimerWorker};
use beep_common::config::BeepConfig;
use beep_common::consts::{LEVEL_HIGH, LEVEL_LOW};
use beep_common::error::{AttachError, FileError, WriteError};
use beep_common::gpio::{GpioLine, GpioProvider, LineRequest};
use beep_common::registration::{
    DevNum, DeviceClassRegistry, FileOperations, RegistrationHandle,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Operation applied to the line inside the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Caller wrote `'1'`: line high, timer re-armed.
    Energize,
    /// Caller wrote `'0'`: line low. A pending deadline stays armed.
    DeEnergize,
    /// Timer expiry: line low.
    ForceOff,
}

impl TryFrom<u8> for Command {
    type Error = WriteError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            LEVEL_HIGH => Ok(Command::Energize),
            LEVEL_LOW => Ok(Command::DeEnergize),
            other => Err(WriteError::InvalidCommand(other)),
        }
    }
}

/// Encode a line level as the protocol byte.
pub fn level_byte(level: bool) -> u8 {
    if level { LEVEL_HIGH } else { LEVEL_LOW }
}

/// Line and timer, guarded together.
struct LineState {
    gpio: Option<Box<dyn GpioLine>>,
    timer: ShutoffTimer,
    closing: bool,
}

impl LineState {
    fn level(&self) -> Result<bool, FileError> {
        match &self.gpio {
            Some(gpio) if !self.closing => Ok(gpio.get()),
            _ => Err(FileError::NoDevice),
        }
    }

    fn apply(&mut self, command: Command, now: Instant) -> Result<(), FileError> {
        if self.closing && command != Command::ForceOff {
            return Err(FileError::NoDevice);
        }
        let Some(gpio) = self.gpio.as_mut() else {
            return Err(FileError::NoDevice);
        };
        match command {
            Command::Energize => {
                // Armed first so the line is never high without a deadline.
                let Some(deadline) = self.timer.arm(now) else {
                    warn!("{} shutoff deadline out of range, not energized", gpio.label());
                    return Ok(());
                };
                gpio.set(true);
                debug!(
                    "{} energized, shutoff in {:?}",
                    gpio.label(),
                    deadline.saturating_duration_since(now)
                );
            }
            Command::DeEnergize => {
                gpio.set(false);
                debug!("{} de-energized", gpio.label());
            }
            Command::ForceOff => {
                gpio.set(false);
                info!(
                    "{} forced off after {:?}",
                    gpio.label(),
                    self.timer.duration()
                );
            }
        }
        Ok(())
    }
}

impl Expire for LineState {
    fn timer(&mut self) -> &mut ShutoffTimer {
        &mut self.timer
    }

    fn expire(&mut self) {
        // Only fails once the line is gone, and the worker is joined before that.
        let _ = self.apply(Command::ForceOff, Instant::now());
    }
}

type Core = Guarded<LineState>;

fn execute(core: &Core, command: Command) -> Result<(), FileError> {
    let mut state = core.lock();
    state.apply(command, Instant::now())?;
    drop(state);
    if command == Command::Energize {
        core.notify();
    }
    Ok(())
}

/// Take the line out of the critical section, drive it low and hand it back.
fn release_line(core: &Core, provider: &dyn GpioProvider) {
    let line = {
        let mut state = core.lock();
        state.closing = true;
        state.gpio.take()
    };
    if let Some(mut line) = line {
        line.set(false);
        debug!("Releasing {}", line.label());
        provider.release(line);
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parameters fixed at attach.
#[derive(Debug, Clone)]
pub struct DeviceParams {
    /// Driver/class name; node is `{name}0`
    pub name: String,
    /// GPIO line to acquire
    pub line: LineRequest,
    /// Auto-shutoff duration
    pub ringing_duration: Duration,
}

impl DeviceParams {
    /// Derive attach parameters from the configuration.
    pub fn from_config(config: &BeepConfig) -> Self {
        Self {
            name: config.device.name.clone(),
            line: LineRequest::output_low(
                config.gpio.chip.clone(),
                config.gpio.line,
                config.device.name.clone(),
            ),
            ringing_duration: config.device.ringing_duration(),
        }
    }
}

/// Timer state as reported by [`DeviceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TimerStatus {
    /// No shutoff pending
    Disarmed,
    /// Shutoff pending
    Armed {
        /// Milliseconds until forced off
        remaining_ms: u64,
    },
}

/// Point-in-time snapshot of a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    /// Driver/class name
    pub name: String,
    /// Device node name
    pub node: String,
    /// Device number
    pub devnum: DevNum,
    /// Current line level
    pub level: bool,
    /// Shutoff timer
    pub timer: TimerStatus,
    /// Configured auto-shutoff duration
    pub ringing_duration_ms: u64,
    /// Number of forced-offs since attach
    pub forced_offs: u64,
}

/// File operations routed to a device by the registry.
struct BeepFile {
    core: Arc<Core>,
    node: String,
}

impl FileOperations for BeepFile {
    fn open(&self) -> Result<(), FileError> {
        if self.core.lock().closing {
            return Err(FileError::NoDevice);
        }
        debug!("{} opened", self.node);
        Ok(())
    }

    fn release(&self) {
        debug!("{} closed", self.node);
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        let Some(first) = buf.first_mut() else {
            return Ok(0);
        };
        *first = level_byte(self.core.lock().level()?);
        Ok(1)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, FileError> {
        let Some(&byte) = buf.first() else {
            return Ok(0);
        };
        match Command::try_from(byte) {
            Ok(command) => execute(&self.core, command)?,
            // Reported as consumed; only a later read reveals it was ignored.
            Err(e) => warn!("{}: {}, ignored", self.node, e),
        }
        Ok(1)
    }
}

/// An attached beeper.
///
/// Dropping the device detaches it; [`detach`](Self::detach) makes that
/// explicit at call sites.
pub struct BeepDevice {
    name: String,
    ringing_duration: Duration,
    core: Arc<Core>,
    worker: TimerWorker,
    registration: RegistrationHandle,
    provider: Arc<dyn GpioProvider>,
    registry: Arc<dyn DeviceClassRegistry>,
}

impl BeepDevice {
    /// Acquire the line, start the shutoff worker and publish the node.
    ///
    /// # Errors
    /// - `AttachError::DurationOutOfRange` if the ringing duration is zero
    ///   or cannot be added to the current time
    /// - `AttachError::HardwareUnavailable` if the line cannot be acquired
    /// - `AttachError::TimerUnavailable` if the worker thread cannot start
    /// - `AttachError::RegistrationFailed` if the node cannot be registered
    ///
    /// On error everything acquired so far has been released.
    pub fn attach(
        provider: Arc<dyn GpioProvider>,
        registry: Arc<dyn DeviceClassRegistry>,
        params: &DeviceParams,
    ) -> Result<Self, AttachError> {
        info!(
            "Attaching {} on {} via {} (ringing {:?})",
            params.name,
            params.line,
            provider.name(),
            params.ringing_duration
        );

        if params.ringing_duration.is_zero()
            || Instant::now().checked_add(params.ringing_duration).is_none()
        {
            return Err(AttachError::DurationOutOfRange(params.ringing_duration));
        }

        let gpio = provider
            .acquire(&params.line)
            .map_err(AttachError::HardwareUnavailable)?;

        let core = Arc::new(Guarded::new(LineState {
            gpio: Some(gpio),
            timer: ShutoffTimer::new(params.ringing_duration),
            closing: false,
        }));

        let mut worker = match TimerWorker::spawn(&params.name, Arc::clone(&core)) {
            Ok(worker) => worker,
            Err(e) => {
                release_line(&core, provider.as_ref());
                return Err(AttachError::TimerUnavailable(e.to_string()));
            }
        };

        let fops = Arc::new(BeepFile {
            core: Arc::clone(&core),
            node: params.name.clone(),
        });
        let registration = match registry.register(&params.name, &params.name, fops) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Registration of {} failed: {}", params.name, e);
                worker.stop();
                release_line(&core, provider.as_ref());
                return Err(AttachError::RegistrationFailed(e));
            }
        };

        info!(
            "{} attached as /dev/{} ({})",
            params.name,
            registration.node(),
            registration.devnum()
        );

        Ok(Self {
            name: params.name.clone(),
            ringing_duration: params.ringing_duration,
            core,
            worker,
            registration,
            provider,
            registry,
        })
    }

    /// Tear the device down. Never fails.
    pub fn detach(self) {
        drop(self);
    }

    /// Current level as `'0'` or `'1'`.
    pub fn read(&self) -> u8 {
        level_byte(self.level())
    }

    /// Apply one protocol byte. Returns the number of bytes consumed.
    ///
    /// # Errors
    /// `WriteError::InvalidCommand` for anything but `'0'`/`'1'`; the line
    /// is left untouched.
    pub fn write(&self, byte: u8) -> Result<usize, WriteError> {
        let command = Command::try_from(byte)?;
        // Teardown needs `self` by value, so this only fails from `Drop`.
        if let Err(e) = execute(&self.core, command) {
            warn!("{}: {:?} dropped: {}", self.name, command, e);
        }
        Ok(1)
    }

    /// Current line level.
    pub fn level(&self) -> bool {
        self.core.lock().level().unwrap_or(false)
    }

    /// Driver/class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device node name (e.g. `beep0`).
    pub fn node(&self) -> &str {
        self.registration.node()
    }

    /// Allocated device number.
    pub fn devnum(&self) -> DevNum {
        self.registration.devnum()
    }

    /// Configured auto-shutoff duration.
    pub fn ringing_duration(&self) -> Duration {
        self.ringing_duration
    }

    /// Snapshot of level and timer.
    pub fn status(&self) -> DeviceStatus {
        let now = Instant::now();
        let state = self.core.lock();
        let timer = match state.timer.state() {
            TimerState::Armed { deadline, .. } => TimerStatus::Armed {
                remaining_ms: millis(deadline.saturating_duration_since(now)),
            },
            TimerState::Disarmed | TimerState::Firing => TimerStatus::Disarmed,
        };
        DeviceStatus {
            name: self.name.clone(),
            node: self.node().to_string(),
            devnum: self.devnum(),
            level: state.level().unwrap_or(false),
            timer,
            ringing_duration_ms: millis(self.ringing_duration),
            forced_offs: state.timer.expirations(),
        }
    }
}

impl Drop for BeepDevice {
    fn drop(&mut self) {
        info!("Detaching {}", self.name);
        self.core.lock().closing = true;
        self.worker.stop();
        self.registry.unregister(&self.registration);
        release_line(&self.core, self.provider.as_ref());
        info!("{} detached", self.name);
    }
}

impl std::fmt::Debug for BeepDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeepDevice")
            .field("name", &self.name)
            .field("node", &self.registration.node())
            .field("ringing_duration", &self.ringing_duration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulatedGpio;
    use crate::registry::CharDeviceRegistry;
    use std::thread;

    fn params(ms: u64) -> DeviceParams {
        DeviceParams {
            name: "beep".to_string(),
            line: LineRequest::output_low("/dev/gpiochip0", 18, "beep"),
            ringing_duration: Duration::from_millis(ms),
        }
    }

    fn attach(ms: u64) -> (BeepDevice, Arc<SimulatedGpio>, Arc<CharDeviceRegistry>) {
        let gpio = Arc::new(SimulatedGpio::default());
        let registry = Arc::new(CharDeviceRegistry::new());
        let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(ms))
            .expect("attach");
        (device, gpio, registry)
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Command::try_from(b'1'), Ok(Command::Energize));
        assert_eq!(Command::try_from(b'0'), Ok(Command::DeEnergize));
        assert_eq!(
            Command::try_from(b'2'),
            Err(WriteError::InvalidCommand(b'2'))
        );
    }

    #[test]
    fn reads_low_after_attach() {
        let (device, _, _) = attach(3000);
        assert_eq!(device.read(), b'0');
        assert_eq!(device.node(), "beep0");
    }

    #[test]
    fn write_one_arms_timer() {
        let (device, _, _) = attach(3000);
        assert_eq!(device.write(b'1'), Ok(1));
        assert_eq!(device.read(), b'1');
        let status = device.status();
        assert!(status.level);
        match status.timer {
            TimerStatus::Armed { remaining_ms } => assert!(remaining_ms <= 3000),
            TimerStatus::Disarmed => panic!("timer should be armed"),
        }
    }

    #[test]
    fn write_zero_leaves_timer_armed() {
        let (device, _, _) = attach(3000);
        device.write(b'1').unwrap();
        device.write(b'0').unwrap();
        assert_eq!(device.read(), b'0');
        assert!(matches!(device.status().timer, TimerStatus::Armed { .. }));
    }

    #[test]
    fn invalid_byte_changes_nothing() {
        let (device, _, _) = attach(3000);
        device.write(b'1').unwrap();
        assert_eq!(device.write(b'x'), Err(WriteError::InvalidCommand(b'x')));
        assert_eq!(device.read(), b'1');
    }

    #[test]
    fn status_saturates_huge_durations() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);

        let (device, _, _) = attach(u64::MAX);
        device.write(b'1').unwrap();
        assert_eq!(device.read(), b'1');
        let status = device.status();
        assert_eq!(status.ringing_duration_ms, u64::MAX);
        assert!(matches!(status.timer, TimerStatus::Armed { remaining_ms } if remaining_ms > 0));
    }

    #[test]
    fn expiry_forces_line_low() {
        let (device, _, _) = attach(40);
        device.write(b'1').unwrap();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(device.read(), b'0');
        let status = device.status();
        assert_eq!(status.forced_offs, 1);
        assert_eq!(status.timer, TimerStatus::Disarmed);
    }

    #[test]
    fn file_ops_follow_byte_protocol() {
        let (device, _, registry) = attach(3000);
        let file = registry.open(device.node()).expect("open");

        let mut empty = [0u8; 0];
        assert_eq!(file.read(&mut empty), Ok(0));
        assert_eq!(file.write(&[]), Ok(0));

        assert_eq!(file.write(b"1\n"), Ok(1));
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), Ok(1));
        assert_eq!(buf[0], b'1');

        // Invalid bytes are consumed silently.
        assert_eq!(file.write(b"z"), Ok(1));
        assert_eq!(device.read(), b'1');
    }

    #[test]
    fn detach_releases_line_low() {
        let (device, gpio, registry) = attach(3000);
        let probe = gpio.probe("/dev/gpiochip0", 18).expect("probe");
        device.write(b'1').unwrap();
        assert!(probe.level());

        device.detach();
        assert!(!probe.level());
        assert_eq!(gpio.released(), 1);
        assert!(registry.nodes().is_empty());
    }

    #[test]
    fn open_file_outliving_detach_sees_no_device() {
        let (device, _, registry) = attach(3000);
        let file = registry.open("beep0").unwrap();
        device.detach();

        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Err(FileError::NoDevice));
        assert_eq!(file.write(b"1"), Err(FileError::NoDevice));
    }
}
