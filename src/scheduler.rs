// Delay-ordered cooperative scheduler for single-core targets
// NOTE: No preemption. Tasks run to completion on one call stack and
// report their own next delay; earliest-delay-first is the only policy.
//
// The registry is a growable array with explicit capacity control
// (doubling on growth, halving on shrink, hard-capped at MAX_TASKS)
// so peak memory stays predictable on a device with a few KB of RAM.

use alloc::vec::Vec;
use core::fmt;

use crate::clock::{self, Clock};
use crate::task::{DelayUnit, Task};

/// Default registry ceiling. 32 tasks of metadata fits comfortably in
/// the couple of KB the smallest supported targets have.
pub const DEFAULT_MAX_TASKS: usize = 32;

#[derive(Debug)]
pub enum AddError {
    /// Registry is at the hard cap, contains the rejected task
    Full(Task),
}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddError::Full(task) => write!(f, "registry full, rejected task {}", task.id()),
        }
    }
}

/// The task registry and run loop.
///
/// `MAX_TASKS` is the hard capacity ceiling, tunable per target memory
/// budget. One instance owns one logical event loop; the type is
/// deliberately not `Clone`.
///
/// Ordering invariant: outside the window between an [`add`](Self::add)
/// and the next sort pass, the live range is ascending by delay and
/// slot 0 holds the next task to run.
#[derive(Debug)]
pub struct Scheduler<const MAX_TASKS: usize = DEFAULT_MAX_TASKS> {
    tasks: Vec<Task>,
    /// Logical capacity; `tasks.len() <= cap <= MAX_TASKS`.
    cap: usize,
}

impl<const MAX_TASKS: usize> Scheduler<MAX_TASKS> {
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cap: 1,
        }
    }

    /// Append a task to the end of the registry.
    ///
    /// Fails with [`AddError::Full`] (returning the task) once
    /// `MAX_TASKS` live tasks exist; capacity below the cap doubles as
    /// needed. The new task is *not* sorted into position; ordering is
    /// restored lazily by the next sort pass, so readers in between may
    /// observe an unsorted tail.
    pub fn add(&mut self, task: Task) -> Result<(), AddError> {
        if self.tasks.len() >= MAX_TASKS {
            log::warn!(
                "sched: at hard cap ({}), rejecting task {}",
                MAX_TASKS,
                task.id()
            );
            return Err(AddError::Full(task));
        }

        if self.tasks.len() == self.cap {
            self.cap = (self.cap * 2).min(MAX_TASKS);
            self.tasks.reserve_exact(self.cap - self.tasks.len());
            log::debug!("sched: capacity grown to {}", self.cap);
        }

        self.tasks.push(task);
        Ok(())
    }

    /// Append a task, dropping it silently if the registry is full.
    ///
    /// Degrade-gracefully variant of [`add`](Self::add) for callers
    /// that would ignore the error anyway; returns whether the task was
    /// kept.
    pub fn add_or_drop(&mut self, task: Task) -> bool {
        self.add(task).is_ok()
    }

    /// Remove and return the task at `index`; `None` if out of range.
    ///
    /// The victim is swapped with the last live slot, the registry is
    /// re-sorted, and capacity halves once occupancy drops below half.
    pub fn remove(&mut self, index: usize) -> Option<Task> {
        if index >= self.tasks.len() {
            return None;
        }

        let removed = self.tasks.swap_remove(index);
        self.sort();

        if self.tasks.len() < self.cap / 2 {
            self.cap /= 2;
            self.tasks.shrink_to(self.cap);
            log::debug!("sched: capacity shrunk to {}", self.cap);
        }

        Some(removed)
    }

    /// Borrow the task at `index`; `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Read-only view of the live tasks, for diagnostics.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Current logical capacity (≥ [`len`](Self::len), ≤ `MAX_TASKS`).
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Sort the live range ascending by delay, in place.
    ///
    /// Selection sort: O(n²), but n is bounded by `MAX_TASKS` so this
    /// beats carrying a heap on the target hardware. First-found
    /// minimum; equal delays have no guaranteed order.
    pub fn sort(&mut self) {
        let len = self.tasks.len();
        for current in 0..len.saturating_sub(1) {
            let mut smallest = current;
            for i in current + 1..len {
                if self.tasks[i].delay(DelayUnit::Micros)
                    < self.tasks[smallest].delay(DelayUnit::Micros)
                {
                    smallest = i;
                }
            }

            if smallest != current {
                // smallest > current, so the split puts them on
                // opposite sides
                let (head, tail) = self.tasks.split_at_mut(smallest);
                head[current].swap(&mut tail[0]);
            }
        }
    }

    /// Advance virtual time: subtract `amount_us` from every live
    /// delay, saturating at zero.
    pub fn offset_delay_by(&mut self, amount_us: u64) {
        for task in &mut self.tasks {
            let remaining = task.delay(DelayUnit::Micros).saturating_sub(amount_us);
            task.set_delay(remaining, DelayUnit::Micros);
        }
    }

    /// Run the registry to empty, blocking the calling context.
    ///
    /// Each iteration invokes the earliest-due task with its
    /// `(step, id)`, then reinterprets the return value: 0 evicts the
    /// task, anything positive reschedules it that many microseconds
    /// out (and bumps its step). Between executions the loop either
    /// sleeps until the next task is due or, when the execution itself
    /// already took that long, advances straight to the next iteration.
    pub fn run_until_complete<C: Clock + ?Sized>(&mut self, clock: &mut C) {
        // adds are ordered lazily; restore the invariant before the
        // first read of slot 0
        self.sort();

        while !self.tasks.is_empty() {
            let begin = clock.now_micros();

            let head = &self.tasks[0];
            let ret = head.invoke(head.step(), head.id());

            if ret > 0 {
                let head = &mut self.tasks[0];
                head.set_delay(ret, DelayUnit::Micros);
                head.set_step(head.step() + 1);
                log::trace!(
                    "sched: task {} rescheduled in {}us (step {})",
                    head.id(),
                    ret,
                    head.step()
                );
            } else {
                let done = self.remove(0);
                if let Some(task) = done {
                    log::trace!("sched: task {} finished after {} steps", task.id(), task.step());
                }
            }

            self.sort();

            if self.tasks.is_empty() {
                break;
            }

            let elapsed = clock.now_micros().saturating_sub(begin);
            let head_delay = self.tasks[0].delay(DelayUnit::Micros);

            if elapsed >= head_delay {
                // execution already covered the head's delay, no sleep
                self.offset_delay_by(elapsed);
                continue;
            }

            clock::wait(clock, head_delay - elapsed, DelayUnit::Micros);
            self.offset_delay_by(head_delay);
        }
    }
}

impl<const MAX_TASKS: usize> Default for Scheduler<MAX_TASKS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    fn task(id: u64, delay_us: u64) -> Task {
        let mut t = Task::new(|_, _| 0);
        t.set_id(id);
        t.set_delay(delay_us, DelayUnit::Micros);
        t
    }

    fn delays<const N: usize>(sched: &Scheduler<N>) -> Vec<u64> {
        sched
            .tasks()
            .iter()
            .map(|t| t.delay(DelayUnit::Micros))
            .collect()
    }

    #[test]
    fn len_tracks_successful_adds() {
        let mut sched = Scheduler::<8>::new();
        assert!(sched.is_empty());

        for i in 0..5 {
            assert!(sched.add(task(i, 0)).is_ok());
        }

        assert_eq!(5, sched.len());
        assert!(!sched.is_empty());
    }

    #[test]
    fn capacity_doubles_up_to_the_cap() {
        let mut sched = Scheduler::<8>::new();
        assert_eq!(1, sched.capacity());

        let mut seen = Vec::new();
        for i in 0..8 {
            sched.add(task(i, 0)).unwrap();
            seen.push(sched.capacity());
        }

        assert_eq!(&[1, 2, 4, 4, 8, 8, 8, 8], seen.as_slice());
        // capacity is always a power of two >= len
        assert!(sched.capacity() >= sched.len());
    }

    #[test]
    fn add_past_the_cap_is_rejected_with_the_task() {
        let mut sched = Scheduler::<4>::new();
        for i in 0..4 {
            sched.add(task(i, 0)).unwrap();
        }

        match sched.add(task(99, 0)) {
            Err(AddError::Full(rejected)) => assert_eq!(99, rejected.id()),
            Ok(()) => panic!("add beyond MAX_TASKS must fail"),
        }
        assert_eq!(4, sched.len());

        assert!(!sched.add_or_drop(task(100, 0)));
        assert_eq!(4, sched.len());
    }

    #[test]
    fn add_does_not_sort() {
        let mut sched = Scheduler::<8>::new();
        sched.add(task(0, 50)).unwrap();
        sched.add(task(1, 10)).unwrap();

        // unsorted until the next sort pass
        assert_eq!(&[50, 10], delays(&sched).as_slice());

        sched.sort();
        assert_eq!(&[10, 50], delays(&sched).as_slice());
    }

    #[test]
    fn sort_orders_adjacent_pairs_and_is_idempotent() {
        let mut sched = Scheduler::<8>::new();
        for (i, d) in [300u64, 100, 700, 100, 0].into_iter().enumerate() {
            sched.add(task(i as u64, d)).unwrap();
        }

        sched.sort();
        let once = delays(&sched);
        for pair in once.windows(2) {
            assert!(pair[0] <= pair[1]);
        }

        sched.sort();
        assert_eq!(once, delays(&sched));
    }

    #[test]
    fn remove_returns_the_victim_and_keeps_the_rest_sorted() {
        let mut sched = Scheduler::<8>::new();
        sched.add(task(0, 300)).unwrap();
        sched.add(task(1, 100)).unwrap();
        sched.add(task(2, 200)).unwrap();
        sched.sort();

        // slot 1 holds the 200us task after sorting
        let removed = sched.remove(1).unwrap();
        assert_eq!(2, removed.id());

        assert_eq!(2, sched.len());
        assert_eq!(&[100, 300], delays(&sched).as_slice());

        let survivors: Vec<u64> = sched.tasks().iter().map(|t| t.id()).collect();
        assert!(survivors.contains(&0));
        assert!(survivors.contains(&1));
    }

    #[test]
    fn remove_out_of_range_is_an_observable_noop() {
        let mut sched = Scheduler::<8>::new();
        sched.add(task(0, 0)).unwrap();

        assert!(sched.remove(1).is_none());
        assert!(sched.remove(usize::MAX).is_none());
        assert_eq!(1, sched.len());
    }

    #[test]
    fn remove_shrinks_capacity_below_half_occupancy() {
        let mut sched = Scheduler::<8>::new();
        for i in 0..8 {
            sched.add(task(i, 0)).unwrap();
        }
        assert_eq!(8, sched.capacity());

        // 8 -> 7 -> 6 -> 5 -> 4: still >= cap/2, no shrink
        for _ in 0..4 {
            sched.remove(0).unwrap();
        }
        assert_eq!(8, sched.capacity());

        // 4 -> 3: below half of 8, halve
        sched.remove(0).unwrap();
        assert_eq!(4, sched.capacity());
    }

    #[test]
    fn get_is_bounds_checked() {
        let mut sched = Scheduler::<8>::new();
        sched.add(task(7, 123)).unwrap();

        assert_eq!(7, sched.get(0).unwrap().id());
        assert!(sched.get(1).is_none());
    }

    #[test]
    fn offset_saturates_and_composes() {
        let mut sched = Scheduler::<8>::new();
        sched.add(task(0, 1000)).unwrap();
        sched.add(task(1, 300)).unwrap();

        sched.offset_delay_by(400);
        assert_eq!(&[600, 0], delays(&sched).as_slice());

        // two offsets equal one offset by the sum
        let mut other = Scheduler::<8>::new();
        other.add(task(0, 1000)).unwrap();
        other.add(task(1, 300)).unwrap();
        other.offset_delay_by(150);
        other.offset_delay_by(250);
        assert_eq!(delays(&sched), delays(&other));
    }
}
