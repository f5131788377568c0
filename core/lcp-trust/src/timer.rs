//! Background timer driving periodic CRL refreshes.
//!
//! One worker thread waits until the armed [`Schedule`] elapses, runs the
//! handler, and either stops or re-arms (`auto_reset`). Handler errors and
//! panics are kept until [`ThreadTimer::take_failure`] collects them.

use lcp_types::{LcpResult, Status, StatusCode};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// When the handler fires next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// After a delay counted from the moment the schedule is armed.
    After(Duration),
    /// At a wall-clock time point; past time points fire at once.
    At(SystemTime),
}

impl Schedule {
    fn deadline(&self, armed_at: Instant) -> Instant {
        match self {
            Self::After(delay) => armed_at + *delay,
            Self::At(when) => {
                armed_at + when.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Work run by the timer thread.
pub type TimerHandler = Arc<dyn Fn() -> LcpResult<()> + Send + Sync>;

struct TimerState {
    schedule: Schedule,
    auto_reset: bool,
    running: bool,
    /// Bumped whenever the schedule is re-armed or the timer restarted.
    generation: u64,
    handler: Option<TimerHandler>,
    failure: Option<Status>,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl TimerShared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-thread timer with re-armable schedule.
pub struct ThreadTimer {
    shared: Arc<TimerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new(Schedule::After(Duration::ZERO), false)
    }
}

impl ThreadTimer {
    #[must_use]
    pub fn new(schedule: Schedule, auto_reset: bool) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    schedule,
                    auto_reset,
                    running: false,
                    generation: 0,
                    handler: None,
                    failure: None,
                }),
                wake: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn set_handler(&self, handler: TimerHandler) {
        self.shared.lock().handler = Some(handler);
    }

    /// Re-arms the timer; a running timer recomputes its deadline from now.
    pub fn set_schedule(&self, schedule: Schedule) {
        rearm(&self.shared, schedule);
    }

    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.shared.lock().schedule
    }

    pub fn set_auto_reset(&self, auto_reset: bool) {
        self.shared.lock().auto_reset = auto_reset;
    }

    #[must_use]
    pub fn is_auto_reset(&self) -> bool {
        self.shared.lock().auto_reset
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Handle the handler can use to re-arm its own timer.
    #[must_use]
    pub fn controller(&self) -> TimerController {
        TimerController {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Starts the worker. Restarting a running timer re-arms it.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = self.shared.lock();
            state.generation += 1;
            if state.running {
                self.shared.wake.notify_all();
                return;
            }
            state.running = true;
        }

        if let Some(finished) = worker.take() {
            let _ = finished.join();
        }
        let shared = Arc::clone(&self.shared);
        *worker = Some(thread::spawn(move || run_worker(&shared)));
        debug!("timer started");
    }

    /// Stops the worker and waits for it, unless called from the worker itself.
    pub fn stop(&self) {
        {
            let mut state = self.shared.lock();
            state.running = false;
            state.generation += 1;
        }
        self.shared.wake.notify_all();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("timer worker terminated abnormally");
            }
        }
    }

    /// Returns and clears the last handler failure.
    pub fn take_failure(&self) -> Option<Status> {
        self.shared.lock().failure.take()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ThreadTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ThreadTimer")
            .field("schedule", &state.schedule)
            .field("auto_reset", &state.auto_reset)
            .field("running", &state.running)
            .finish()
    }
}

/// Weak handle to a timer's schedule.
#[derive(Clone)]
pub struct TimerController {
    shared: Weak<TimerShared>,
}

impl TimerController {
    pub fn set_schedule(&self, schedule: Schedule) {
        if let Some(shared) = self.shared.upgrade() {
            rearm(&shared, schedule);
        }
    }

    pub fn set_auto_reset(&self, auto_reset: bool) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().auto_reset = auto_reset;
        }
    }
}

fn rearm(shared: &TimerShared, schedule: Schedule) {
    let mut state = shared.lock();
    state.schedule = schedule;
    state.generation += 1;
    shared.wake.notify_all();
}

fn run_worker(shared: &TimerShared) {
    let mut state = shared.lock();
    loop {
        if !state.running {
            return;
        }

        let armed = state.generation;
        let deadline = state.schedule.deadline(Instant::now());
        loop {
            if !state.running || state.generation != armed {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = shared
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        if !state.running {
            return;
        }
        if state.generation != armed {
            continue;
        }

        let handler = state.handler.clone();
        drop(state);
        let outcome = handler.map(|handler| panic::catch_unwind(AssertUnwindSafe(|| handler())));
        state = shared.lock();

        match outcome {
            Some(Ok(Err(status))) => {
                warn!(error = %status, "timer handler failed");
                state.failure = Some(status);
            }
            Some(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "timer handler panicked");
                state.failure = Some(Status::with_context(StatusCode::CommonError, message));
            }
            _ => {}
        }

        // A time point that already fired and was not re-armed has nothing left to wait for.
        let spent = state.generation == armed && matches!(state.schedule, Schedule::At(_));
        if !state.auto_reset || spent {
            state.running = false;
            debug!("timer finished");
            return;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "timer handler panicked".to_string()
    }
}
