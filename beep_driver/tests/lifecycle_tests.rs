//! Attach/detach lifecycle tests.
//!
//! Covers rollback of partial attaches, teardown ordering and the
//! "released exactly once, no expiry after detach" guarantee.

use beep_common::config::{BeepConfig, ConfigLoader};
use beep_common::error::{AttachError, FileError};
use beep_common::gpio::{GpioError, LineRequest};
use beep_common::registration::{
    DeviceClassRegistry, FileOperations, RegistrationError, RegistrationHandle,
};
use beep_driver::drivers::simulation::SimulatedGpio;
use beep_driver::{BeepDevice, CharDeviceRegistry, DeviceParams};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ─── Helpers ────────────────────────────────────────────────────────

const CHIP: &str = "/dev/gpiochip0";

fn params(ms: u64) -> DeviceParams {
    DeviceParams {
        name: "beep".to_string(),
        line: LineRequest::output_low(CHIP, 18, "beep"),
        ringing_duration: Duration::from_millis(ms),
    }
}

/// Registry that refuses every registration.
struct FullRegistry;

impl DeviceClassRegistry for FullRegistry {
    fn register(
        &self,
        class: &str,
        _node_prefix: &str,
        _fops: Arc<dyn FileOperations>,
    ) -> Result<RegistrationHandle, RegistrationError> {
        Err(RegistrationError::RegionUnavailable(class.to_string()))
    }

    fn unregister(&self, _handle: &RegistrationHandle) {}
}

/// Registry that records whether the line was still held at unregister.
struct OrderCheckingRegistry {
    inner: CharDeviceRegistry,
    gpio: Arc<SimulatedGpio>,
    held_at_unregister: Mutex<Vec<bool>>,
}

impl DeviceClassRegistry for OrderCheckingRegistry {
    fn register(
        &self,
        class: &str,
        node_prefix: &str,
        fops: Arc<dyn FileOperations>,
    ) -> Result<RegistrationHandle, RegistrationError> {
        self.inner.register(class, node_prefix, fops)
    }

    fn unregister(&self, handle: &RegistrationHandle) {
        self.held_at_unregister
            .lock()
            .push(self.gpio.is_held(CHIP, 18));
        self.inner.unregister(handle);
    }
}

// ─── Attach ─────────────────────────────────────────────────────────

#[test]
fn attach_fails_cleanly_without_hardware() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    gpio.fail_next_acquire(GpioError::LineUnavailable {
        chip: CHIP.to_string(),
        line: 18,
        reason: "not wired".to_string(),
    });

    let result = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000));
    assert!(matches!(result, Err(AttachError::HardwareUnavailable(_))));
    assert!(registry.nodes().is_empty());
    assert_eq!(gpio.acquired(), 0);
}

#[test]
fn attach_rejects_unschedulable_duration() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());

    for duration in [Duration::MAX, Duration::ZERO] {
        let mut bad = params(3000);
        bad.ringing_duration = duration;
        let result = BeepDevice::attach(gpio.clone(), registry.clone(), &bad);
        assert!(matches!(
            result,
            Err(AttachError::DurationOutOfRange(d)) if d == duration
        ));
    }
    assert_eq!(gpio.acquired(), 0);
    assert!(registry.nodes().is_empty());

    // The longest duration that still fits arms normally.
    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(u64::MAX)).unwrap();
    let probe = gpio.probe(CHIP, 18).unwrap();
    device.write(b'1').unwrap();
    assert!(probe.level());
    device.write(b'0').unwrap();
    assert!(!probe.level());
}

#[test]
fn attach_fails_when_line_busy() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    let _first = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();

    let other_registry = Arc::new(CharDeviceRegistry::new());
    let result = BeepDevice::attach(gpio.clone(), other_registry.clone(), &params(3000));
    assert!(matches!(
        result,
        Err(AttachError::HardwareUnavailable(GpioError::LineBusy { .. }))
    ));
    assert!(other_registry.nodes().is_empty());
}

#[test]
fn registration_failure_releases_line() {
    let gpio = Arc::new(SimulatedGpio::default());
    let result = BeepDevice::attach(gpio.clone(), Arc::new(FullRegistry), &params(3000));

    assert!(matches!(
        result,
        Err(AttachError::RegistrationFailed(
            RegistrationError::RegionUnavailable(_)
        ))
    ));
    assert_eq!(gpio.acquired(), 1);
    assert_eq!(gpio.released(), 1);
    assert!(!gpio.is_held(CHIP, 18));
}

#[test]
fn duplicate_class_rolls_back_attach() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    let first = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();

    // Same class name, different line.
    let mut second = params(3000);
    second.line = LineRequest::output_low(CHIP, 17, "beep");
    let result = BeepDevice::attach(gpio.clone(), registry.clone(), &second);

    assert!(matches!(
        result,
        Err(AttachError::RegistrationFailed(RegistrationError::ClassExists(_)))
    ));
    assert!(!gpio.is_held(CHIP, 17));
    assert!(gpio.is_held(CHIP, 18));
    assert_eq!(registry.nodes(), vec!["beep0".to_string()]);
    assert_eq!(first.read(), b'0');
}

#[test]
fn attach_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[device]
name = "buzzer"
ringing_duration_ms = 1500

[gpio]
line = 5
"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = BeepConfig::load(file.path()).unwrap();
    let params = DeviceParams::from_config(&config);
    assert_eq!(params.ringing_duration, Duration::from_millis(1500));
    assert_eq!(params.line.line, 5);
    assert!(!params.line.initial);

    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params).unwrap();
    assert_eq!(device.node(), "buzzer0");
    assert_eq!(device.ringing_duration(), Duration::from_millis(1500));
    assert!(gpio.is_held(CHIP, 5));
}

// ─── Detach ─────────────────────────────────────────────────────────

#[test]
fn detach_while_armed_never_fires_afterward() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(50)).unwrap();
    let probe = gpio.probe(CHIP, 18).unwrap();

    device.write(b'1').unwrap();
    device.detach();

    assert!(!probe.level());
    let writes_at_detach = probe.writes();
    thread::sleep(Duration::from_millis(200));

    assert_eq!(probe.writes(), writes_at_detach);
    assert_eq!(gpio.released(), 1);
    assert!(!gpio.is_held(CHIP, 18));
}

#[test]
fn detach_unregisters_before_release() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(OrderCheckingRegistry {
        inner: CharDeviceRegistry::new(),
        gpio: gpio.clone(),
        held_at_unregister: Mutex::new(Vec::new()),
    });

    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();
    device.detach();

    assert_eq!(*registry.held_at_unregister.lock(), vec![true]);
    assert!(registry.inner.nodes().is_empty());
    assert_eq!(gpio.released(), 1);
}

#[test]
fn drop_detaches() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    {
        let _device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();
        assert_eq!(registry.nodes().len(), 1);
    }
    assert!(registry.nodes().is_empty());
    assert_eq!(gpio.released(), 1);
}

#[test]
fn node_is_gone_after_detach() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());
    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();
    let early = registry.open("beep0").unwrap();
    device.detach();

    assert!(matches!(registry.open("beep0"), Err(FileError::NotFound(_))));
    assert_eq!(early.write(b"1"), Err(FileError::NoDevice));
}

#[test]
fn reattach_after_detach() {
    let gpio = Arc::new(SimulatedGpio::default());
    let registry = Arc::new(CharDeviceRegistry::new());

    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();
    device.write(b'1').unwrap();
    device.detach();

    let device = BeepDevice::attach(gpio.clone(), registry.clone(), &params(3000)).unwrap();
    assert_eq!(device.read(), b'0');
    assert_eq!(gpio.acquired(), 2);
    assert_eq!(gpio.released(), 1);
}
