//! Time-keeping seam between the scheduler and the platform.
//!
//! The engine needs exactly two things from the outside world: a
//! monotonic microsecond reading and a blocking sleep. Sleeping reuses
//! [`embedded_hal::delay::DelayNs`]; the reading is the one extra
//! method on [`Clock`]. The embedding program implements `Clock` for
//! its hardware timer and hands it to
//! [`Scheduler::run_until_complete`](crate::Scheduler::run_until_complete).

use embedded_hal::delay::DelayNs;

use crate::task::DelayUnit;

/// Longest microsecond-granularity sleep the helper will request.
///
/// Busy-wait microsecond delays on small MCUs are only accurate up to
/// about this long (Arduino's `delayMicroseconds` tops out at 16383 µs);
/// anything longer goes through the millisecond path instead.
pub const MAX_ACCURATE_MICROS: u64 = 16383;

/// Monotonic clock plus blocking sleep, provided by the embedder.
///
/// `now_micros` must be monotonic for the lifetime of a run loop;
/// wrap-around handling is the implementor's problem, not the
/// scheduler's.
pub trait Clock: DelayNs {
    /// Current monotonic time in microseconds.
    fn now_micros(&mut self) -> u64;
}

/// Block for `time` in the given unit, picking the sleep granularity.
///
/// Microsecond requests above [`MAX_ACCURATE_MICROS`] are converted to
/// millisecond sleeps (truncating the sub-millisecond remainder).
/// `DelayNs` is u32-valued, so absurdly long requests saturate rather
/// than wrap.
pub fn wait<D: DelayNs + ?Sized>(delay: &mut D, time: u64, unit: DelayUnit) {
    match unit {
        DelayUnit::Micros if time > MAX_ACCURATE_MICROS => {
            delay.delay_ms(saturate_u32(time / 1000));
        }
        // fits: time <= 16383
        DelayUnit::Micros => delay.delay_us(time as u32),
        DelayUnit::Millis => delay.delay_ms(saturate_u32(time)),
    }
}

fn saturate_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
