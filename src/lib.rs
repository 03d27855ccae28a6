// microsched: cooperative no_std micro-task scheduler.
// task:      step function + delay/step/id metadata, unit conversion
// scheduler: capacity-managed registry, delay ordering, run loop
// clock:     monotonic-time + blocking-sleep seam (embedded-hal DelayNs)
//
// Single core, no preemption. Registered step functions report their
// own "run again after N microseconds"; the run loop executes the
// earliest-due one, sleeps out the gap, and repeats until every task
// has returned 0.

#![no_std]

extern crate alloc;

pub mod clock;
pub mod scheduler;
pub mod task;

pub use clock::{Clock, MAX_ACCURATE_MICROS, wait};
pub use scheduler::{AddError, DEFAULT_MAX_TASKS, Scheduler};
pub use task::{DelayUnit, StepFn, Task};
