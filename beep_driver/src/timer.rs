//! Auto-shutoff timer.
//!
//! Two parts:
//!
//! - [`ShutoffTimer`] - a one-shot, re-armable deadline state machine. It
//!   never reads the clock itself; callers pass `now`, which keeps it
//!   testable with synthetic instants.
//! - [`TimerWorker`] - the thread that delivers expiries. It sleeps on the
//!   condition variable of a [`Guarded`] critical section and, when the
//!   deadline has passed, applies the expiry while holding the same lock
//!   the writers use.
//!
//! Because the worker re-evaluates the deadline under the lock before
//! acting, a re-arm that completes first always wins over the old deadline.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No deadline pending.
    Disarmed,
    /// A deadline is pending.
    Armed {
        /// When the expiry fires
        deadline: Instant,
        /// Arm counter value at the time of arming
        generation: u64,
    },
    /// The expiry is being applied (only visible to the expiry handler).
    Firing,
}

/// Result of polling the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPoll {
    /// Nothing pending; wait for a notification.
    Idle,
    /// Deadline in the future; wait until then.
    Pending(Instant),
    /// Deadline reached; the timer is now `Firing`.
    Expired,
    /// The worker must exit.
    Shutdown,
}

/// One-shot, re-armable deadline.
#[derive(Debug)]
pub struct ShutoffTimer {
    duration: Duration,
    state: TimerState,
    generation: u64,
    expirations: u64,
    shutdown: bool,
}

impl ShutoffTimer {
    /// Create a disarmed timer.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: TimerState::Disarmed,
            generation: 0,
            expirations: 0,
            shutdown: false,
        }
    }

    /// Configured duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Current state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// True while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        matches!(self.state, TimerState::Armed { .. })
    }

    /// Pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TimerState::Armed { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Number of expiries applied so far.
    pub fn expirations(&self) -> u64 {
        self.expirations
    }

    /// Arm (or re-arm) for `now + duration`, replacing any pending deadline.
    ///
    /// Returns the new deadline, or `None` without touching the state if
    /// `now + duration` is not representable as an `Instant`.
    pub fn arm(&mut self, now: Instant) -> Option<Instant> {
        let deadline = now.checked_add(self.duration)?;
        self.generation += 1;
        self.state = TimerState::Armed {
            deadline,
            generation: self.generation,
        };
        Some(deadline)
    }

    /// Drop any pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        self.state = TimerState::Disarmed;
        was_armed
    }

    /// Evaluate the timer at `now`.
    ///
    /// On `Expired` the state moves to `Firing`; the caller applies the
    /// expiry and then calls [`complete`](Self::complete).
    pub fn poll(&mut self, now: Instant) -> TimerPoll {
        if self.shutdown {
            return TimerPoll::Shutdown;
        }
        match self.state {
            TimerState::Disarmed | TimerState::Firing => TimerPoll::Idle,
            TimerState::Armed { deadline, .. } if now >= deadline => {
                self.state = TimerState::Firing;
                TimerPoll::Expired
            }
            TimerState::Armed { deadline, .. } => TimerPoll::Pending(deadline),
        }
    }

    /// Finish an expiry: `Firing -> Disarmed`.
    pub fn complete(&mut self) {
        if self.state == TimerState::Firing {
            self.state = TimerState::Disarmed;
            self.expirations += 1;
        }
    }

    /// Cancel and make every later `poll` return `Shutdown`.
    pub fn shut_down(&mut self) {
        self.cancel();
        self.shutdown = true;
    }

    /// True once `shut_down` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }
}

/// State that owns a [`ShutoffTimer`] and knows how to apply its expiry.
pub trait Expire: Send + 'static {
    /// The timer bound to this state.
    fn timer(&mut self) -> &mut ShutoffTimer;

    /// Apply the expiry. Called with the lock held and the timer `Firing`.
    fn expire(&mut self);
}

/// A critical section plus the condition variable its timer worker
/// sleeps on.
#[derive(Debug)]
pub struct Guarded<S> {
    state: Mutex<S>,
    wake: Condvar,
}

impl<S> Guarded<S> {
    /// Wrap `state`.
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            wake: Condvar::new(),
        }
    }

    /// Enter the critical section.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    /// Wake the worker so it re-reads the deadline.
    pub fn notify(&self) {
        self.wake.notify_all();
    }
}

/// Thread delivering timer expiries for one [`Guarded`] state.
pub struct TimerWorker {
    handle: Option<JoinHandle<()>>,
    stop: Box<dyn Fn() + Send + Sync>,
}

impl TimerWorker {
    /// Start the worker thread.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<S: Expire>(name: &str, shared: Arc<Guarded<S>>) -> std::io::Result<Self> {
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("{name}-shutoff"))
            .spawn(move || run(&worker_shared))?;

        let stop = Box::new(move || {
            let mut guard = shared.lock();
            if guard.timer().cancel() {
                debug!("Pending shutoff deadline cancelled");
            }
            guard.timer().shut_down();
            drop(guard);
            shared.notify();
        });

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Cancel any pending deadline and join the thread.
    ///
    /// After this returns no expiry runs again. Calling it twice is a no-op.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        (self.stop)();
        if handle.join().is_err() {
            warn!("Shutoff worker panicked");
        }
    }
}

impl Drop for TimerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: Expire>(shared: &Guarded<S>) {
    let mut guard = shared.state.lock();
    loop {
        match guard.timer().poll(Instant::now()) {
            TimerPoll::Shutdown => break,
            TimerPoll::Idle => shared.wake.wait(&mut guard),
            TimerPoll::Pending(deadline) => {
                trace!("Shutoff worker sleeping until {:?}", deadline);
                let _ = shared.wake.wait_until(&mut guard, deadline);
            }
            TimerPoll::Expired => {
                guard.expire();
                guard.timer().complete();
            }
        }
    }
    debug!("Shutoff worker exiting");
}
