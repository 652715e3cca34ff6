//! Repeating Timer
//!
//! A self-rescheduling loop built on the host's one-shot timeout. Each firing
//! runs the callback inside a fault boundary, reports any failure, and then
//! schedules the next firing with the same delay. The loop only ends when its
//! [`TimerHandle`] is cancelled.

use crate::context::ShimContext;
use crate::host::Host;
use crate::report::{report_error, CallbackError};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, trace};

/// Callback run on every firing.
pub type RepeatingCallback = Box<dyn FnMut() -> Result<(), CallbackError>>;

struct TimerState {
    delay_ms: u64,
    callback: RefCell<RepeatingCallback>,
    cancelled: Cell<bool>,
    firings: Cell<u64>,
    host: Rc<dyn Host>,
}

/// Cancellation handle returned when a timer starts.
#[derive(Clone)]
pub struct TimerHandle {
    state: Rc<TimerState>,
}

impl TimerHandle {
    /// Stop the loop. A firing already queued on the host will not run.
    pub fn cancel(&self) {
        debug!("Cancelling repeating timer ({} ms)", self.state.delay_ms);
        self.state.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    /// Number of times the callback has been invoked.
    pub fn firings(&self) -> u64 {
        self.state.firings.get()
    }

    pub fn delay_ms(&self) -> u64 {
        self.state.delay_ms
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("delay_ms", &self.state.delay_ms)
            .field("firings", &self.firings())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Timer component as handed out by the registry.
pub struct RepeatingTimer {
    host: Rc<dyn Host>,
    current: Option<TimerHandle>,
}

impl RepeatingTimer {
    pub fn new(ctx: &ShimContext) -> Self {
        Self {
            host: ctx.host().clone(),
            current: None,
        }
    }

    /// Start firing `callback` every `delay_ms`.
    ///
    /// Starting again cancels the previous loop first.
    pub fn init_with_callback<F>(&mut self, callback: F, delay_ms: u64) -> TimerHandle
    where
        F: FnMut() -> Result<(), CallbackError> + 'static,
    {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }

        let state = Rc::new(TimerState {
            delay_ms,
            callback: RefCell::new(Box::new(callback)),
            cancelled: Cell::new(false),
            firings: Cell::new(0),
            host: self.host.clone(),
        });
        schedule(state.clone());

        let handle = TimerHandle { state };
        self.current = Some(handle.clone());
        handle
    }

    /// Handle of the running loop, if any.
    pub fn handle(&self) -> Option<&TimerHandle> {
        self.current.as_ref()
    }
}

impl fmt::Debug for RepeatingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatingTimer")
            .field("current", &self.current)
            .finish()
    }
}

fn schedule(state: Rc<TimerState>) {
    let host = state.host.clone();
    let delay_ms = state.delay_ms;
    host.set_timeout(Box::new(move || fire(state)), delay_ms);
}

fn fire(state: Rc<TimerState>) {
    if state.cancelled.get() {
        trace!("Dropping firing of cancelled timer");
        return;
    }

    state.firings.set(state.firings.get() + 1);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut callback = state.callback.borrow_mut();
        (*callback)()
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => report_error(state.host.as_ref(), &error),
        Err(payload) => report_error(state.host.as_ref(), &CallbackError::from_panic(payload)),
    }

    if !state.cancelled.get() {
        schedule(state);
    }
}
