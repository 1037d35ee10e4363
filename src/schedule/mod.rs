//! Cancelable scheduling primitives for interactive validation.
//!
//! [`Debouncer`] is a clock-driven state machine: each `schedule` pushes the
//! deadline out and supersedes the previous one, so only the last input in a
//! burst fires. [`LatestSlot`] hands the newest deferred update to a consumer;
//! older unconsumed updates are overwritten.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    generation: u64,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)arms the timer. Returns the generation that will fire.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        self.generation
    }

    /// Fires at most once per armed deadline.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// Time left before the pending deadline, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns whether a pending deadline was dropped.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    closed: bool,
    overwritten: u64,
}

/// Single-value mailbox with last-write-wins semantics.
#[derive(Debug)]
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                closed: false,
                overwritten: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `value`, replacing anything not yet taken. Returns `false` once
    /// the slot is closed.
    pub fn post(&self, value: T) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if state.value.replace(value).is_some() {
            state.overwritten += 1;
        }
        self.ready.notify_one();
        true
    }

    pub fn take(&self) -> Option<T> {
        self.lock().value.take()
    }

    /// Blocks until a value arrives, the slot closes, or `timeout` elapses.
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        let state = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.value.is_none() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());
        state.value.take()
    }

    /// Drops any pending value without closing.
    pub fn cancel(&self) -> bool {
        self.lock().value.take().is_some()
    }

    /// Drops any pending value and refuses further posts.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.value = None;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// How many posted values were replaced before being taken.
    pub fn overwritten(&self) -> u64 {
        self.lock().overwritten
    }
}
