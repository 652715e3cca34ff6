//! Host Timer Queue
//!
//! Backs [`Host::set_timeout`](crate::Host::set_timeout) for the bundled
//! hosts. The queue is driven from outside, one step at a time:
//!
//! 1. Pick the entry with the smallest remaining delay (first queued wins ties)
//! 2. If that delay is positive → age every entry by it and ask the driver to wait
//! 3. Otherwise → pop the entry and run its callback
//!
//! Callbacks run with no borrow of the queue held, so they may schedule
//! further timeouts (this is how repeating timers reschedule themselves).

use crate::host::TimerCallback;
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Outcome of a single [`TimerQueue::run_next`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRun {
    /// Nothing is scheduled
    Idle,
    /// The next callback is due after this many milliseconds
    Wait(u64),
    /// One callback was run
    Ran,
}

struct QueueEntry {
    callback: TimerCallback,
    remaining_ms: u64,
}

/// Single-threaded queue of pending one-shot timeouts.
#[derive(Default)]
pub struct TimerQueue {
    entries: RefCell<Vec<QueueEntry>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `callback` to run after `delay_ms`.
    pub fn schedule(&self, callback: TimerCallback, delay_ms: u64) {
        trace!("Scheduling timeout in {} ms", delay_ms);
        self.entries.borrow_mut().push(QueueEntry {
            callback,
            remaining_ms: delay_ms,
        });
    }

    /// Number of pending timeouts.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Remaining delay of the next timeout to fire.
    pub fn next_delay(&self) -> Option<u64> {
        self.next_entry().map(|(_, delay)| delay)
    }

    fn next_entry(&self) -> Option<(usize, u64)> {
        let entries = self.entries.borrow();
        let mut best: Option<(usize, u64)> = None;
        for (index, entry) in entries.iter().enumerate() {
            match best {
                Some((_, delay)) if entry.remaining_ms >= delay => {}
                _ => best = Some((index, entry.remaining_ms)),
            }
        }
        best
    }

    fn age(&self, elapsed_ms: u64) {
        for entry in self.entries.borrow_mut().iter_mut() {
            entry.remaining_ms = entry.remaining_ms.saturating_sub(elapsed_ms);
        }
    }

    /// Perform one scheduling step.
    ///
    /// A `Wait(ms)` result has already aged the queue by `ms`; the caller is
    /// expected to actually wait that long before calling again.
    pub fn run_next(&self) -> NextRun {
        let Some((index, delay)) = self.next_entry() else {
            return NextRun::Idle;
        };

        if delay > 0 {
            self.age(delay);
            return NextRun::Wait(delay);
        }

        let entry = self.entries.borrow_mut().remove(index);
        (entry.callback)();
        NextRun::Ran
    }

    /// Let `elapsed_ms` of virtual time pass, running every timeout that
    /// falls due. Returns the number of callbacks run.
    ///
    /// A zero-delay callback that keeps rescheduling itself at zero delay
    /// makes this loop forever.
    pub fn advance(&self, elapsed_ms: u64) -> usize {
        let mut budget = elapsed_ms;
        let mut ran = 0;

        while let Some(delay) = self.next_delay() {
            if delay > budget {
                self.age(budget);
                break;
            }
            self.age(delay);
            budget -= delay;
            if self.run_next() == NextRun::Ran {
                ran += 1;
            }
        }

        ran
    }

    /// Drive the queue in real time until nothing is left to run.
    ///
    /// Repeating timers keep the queue non-empty, so this only returns once
    /// every loop has been cancelled.
    pub async fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.run_next() {
                NextRun::Idle => break,
                NextRun::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                NextRun::Ran => ran += 1,
            }
        }
        ran
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.len())
            .field("next_delay", &self.next_delay())
            .finish()
    }
}
