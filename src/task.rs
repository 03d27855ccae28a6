//! Schedulable unit of work: a callback plus its timing metadata.
//!
//! A [`Task`] pairs a step function with the scheduler's bookkeeping:
//! the remaining delay until it is next due, a step counter handed back
//! to the callback on every invocation, and a caller-assigned id. The
//! callback is stored behind an `Rc` trait object, so cloning a task
//! copies the metadata but shares the callable (closures capturing
//! state are fine).

use alloc::rc::Rc;
use core::fmt;

/// Unit selector for delay accessors and blocking waits.
///
/// Storage is always microseconds internally; [`DelayUnit::Millis`]
/// reads integer-divide by 1000, so fractional milliseconds truncate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayUnit {
    #[default]
    Micros,
    Millis,
}

/// Signature every step function must match: `(step, id) -> next delay`.
///
/// A return of 0 means "finished, remove me"; any positive value means
/// "run me again after this many microseconds". A function that never
/// returns 0 is a periodic task, not an error.
pub type StepFn = dyn Fn(u64, u64) -> u64;

/// A step function plus scheduling metadata.
pub struct Task {
    callback: Rc<StepFn>,
    delay_us: u64,
    step: u64,
    id: u64,
}

impl Task {
    /// Wrap a step function with default metadata: delay 0, step 1, id 0.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u64, u64) -> u64 + 'static,
    {
        Self {
            callback: Rc::new(callback),
            delay_us: 0,
            step: 1,
            id: 0,
        }
    }

    /// Remaining delay in the requested unit (millisecond reads truncate).
    pub fn delay(&self, unit: DelayUnit) -> u64 {
        match unit {
            DelayUnit::Micros => self.delay_us,
            DelayUnit::Millis => self.delay_us / 1000,
        }
    }

    /// Set the remaining delay; millisecond values are stored as µs.
    pub fn set_delay(&mut self, value: u64, unit: DelayUnit) {
        self.delay_us = match unit {
            DelayUnit::Micros => value,
            DelayUnit::Millis => value * 1000,
        };
    }

    /// How many times this task has run (starts at 1).
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn set_step(&mut self, step: u64) {
        self.step = step;
    }

    /// Caller-assigned identity tag. Informational only, defaults to 0;
    /// the scheduler never assumes uniqueness.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Exchange all four fields with `other`.
    ///
    /// Removal and sorting are built on this so a task is never observed
    /// half-exchanged.
    pub fn swap(&mut self, other: &mut Task) {
        core::mem::swap(&mut self.callback, &mut other.callback);
        core::mem::swap(&mut self.delay_us, &mut other.delay_us);
        core::mem::swap(&mut self.step, &mut other.step);
        core::mem::swap(&mut self.id, &mut other.id);
    }

    /// Call the wrapped step function and return its value unchanged.
    pub fn invoke(&self, step: u64, id: u64) -> u64 {
        (self.callback)(step, id)
    }
}

impl Clone for Task {
    /// Copies the metadata; the callback is shared, not duplicated.
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
            delay_us: self.delay_us,
            step: self.step,
            id: self.id,
        }
    }
}

impl PartialEq for Task {
    /// Equal iff the callback is the *same* callable (pointer identity)
    /// and delay, step and id all match.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
            && self.delay_us == other.delay_us
            && self.step == other.step
            && self.id == other.id
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("callback", &Rc::as_ptr(&self.callback))
            .field("delay_us", &self.delay_us)
            .field("step", &self.step)
            .field("id", &self.id)
            .finish()
    }
}
