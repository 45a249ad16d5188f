//! Simulated GPIO backend.
//!
//! The `SimulatedGpio` provider manages:
//! - One level per (chip, line), persisting across acquire/release
//! - Exclusive ownership of a line while it is held
//! - Acquire/release accounting and one-shot failure injection
//!
//! [`LineProbe`] lets tests and the daemon observe a line from outside the
//! driver, the way a logic analyzer would.

use beep_common::gpio::{GpioError, GpioLine, GpioProvider, LineRequest};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

/// Default number of lines per simulated chip.
const DEFAULT_LINE_COUNT: u32 = 54;

type LineKey = (PathBuf, u32);

/// Observable state of one simulated line.
#[derive(Debug, Default)]
struct LineSignal {
    level: AtomicBool,
    writes: AtomicU64,
}

#[derive(Default)]
struct SimState {
    held: HashSet<LineKey>,
    signals: HashMap<LineKey, Arc<LineSignal>>,
    acquired: u64,
    released: u64,
    fail_next: Option<GpioError>,
}

/// Simulated GPIO provider.
pub struct SimulatedGpio {
    line_count: u32,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGpio {
    /// Create a provider whose chips have `line_count` lines each.
    pub fn new(line_count: u32) -> Self {
        Self {
            line_count,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Make the next `acquire` fail with `error`.
    pub fn fail_next_acquire(&self, error: GpioError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Number of successful acquisitions.
    pub fn acquired(&self) -> u64 {
        self.state.lock().acquired
    }

    /// Number of lines released.
    pub fn released(&self) -> u64 {
        self.state.lock().released
    }

    /// True while a line is held by a driver.
    pub fn is_held(&self, chip: impl AsRef<Path>, line: u32) -> bool {
        self.state
            .lock()
            .held
            .contains(&(chip.as_ref().to_path_buf(), line))
    }

    /// Observe a line that has been acquired at least once.
    pub fn probe(&self, chip: impl AsRef<Path>, line: u32) -> Option<LineProbe> {
        self.state
            .lock()
            .signals
            .get(&(chip.as_ref().to_path_buf(), line))
            .map(|signal| LineProbe {
                signal: Arc::clone(signal),
            })
    }
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_COUNT)
    }
}

impl GpioProvider for SimulatedGpio {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn acquire(&self, request: &LineRequest) -> Result<Box<dyn GpioLine>, GpioError> {
        let mut state = self.state.lock();

        if let Some(error) = state.fail_next.take() {
            debug!("Injected acquire failure for {}: {}", request, error);
            return Err(error);
        }

        let chip = request.chip.display().to_string();
        if request.line >= self.line_count {
            return Err(GpioError::LineUnavailable {
                chip,
                line: request.line,
                reason: format!("chip has {} lines", self.line_count),
            });
        }

        let key = (request.chip.clone(), request.line);
        if !state.held.insert(key.clone()) {
            return Err(GpioError::LineBusy {
                chip,
                line: request.line,
            });
        }

        let signal = Arc::clone(state.signals.entry(key.clone()).or_default());
        signal.level.store(request.initial, Ordering::SeqCst);
        state.acquired += 1;
        debug!("Acquired simulated line {} for '{}'", request, request.consumer);

        Ok(Box::new(SimulatedLine {
            key,
            label: request.to_string(),
            signal,
            state: Arc::clone(&self.state),
        }))
    }
}

/// A held simulated line. Dropping it releases the line.
struct SimulatedLine {
    key: LineKey,
    label: String,
    signal: Arc<LineSignal>,
    state: Arc<Mutex<SimState>>,
}

impl GpioLine for SimulatedLine {
    fn set(&mut self, level: bool) {
        self.signal.level.store(level, Ordering::SeqCst);
        self.signal.writes.fetch_add(1, Ordering::SeqCst);
        trace!("{} <- {}", self.label, level as u8);
    }

    fn get(&self) -> bool {
        self.signal.level.load(Ordering::SeqCst)
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl Drop for SimulatedLine {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.held.remove(&self.key);
        state.released += 1;
        debug!("Released simulated line {}", self.label);
    }
}

/// Read-only view of a simulated line.
#[derive(Debug, Clone)]
pub struct LineProbe {
    signal: Arc<LineSignal>,
}

impl LineProbe {
    /// Current level.
    pub fn level(&self) -> bool {
        self.signal.level.load(Ordering::SeqCst)
    }

    /// Number of `set` calls since the line was first acquired.
    pub fn writes(&self) -> u64 {
        self.signal.writes.load(Ordering::SeqCst)
    }
}
