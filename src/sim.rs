//! Single-threaded discrete-event scheduling over a virtual clock.
//!
//! Each task has at most one pending wakeup. The scheduler always resumes the
//! task with the earliest wake time; equal wake times go to the task that was
//! registered first, so a run is reproducible bit for bit.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("cannot schedule task {task} at {at}s: clock is already at {now}s")]
    InThePast { task: usize, at: f64, now: f64 },

    #[error("cannot schedule task {task} at non-finite time {at}")]
    NonFinite { task: usize, at: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Simulated time in seconds. Only the scheduler moves it, and only forward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Clock {
    now: f64,
}

impl Clock {
    fn now(&self) -> f64 {
        self.now
    }
}

#[derive(Debug, Clone, Copy)]
struct Wakeup {
    at: f64,
    task: TaskId,
}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Wakeup {}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then_with(|| self.task.cmp(&other.task))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    clock: Clock,
    tasks: usize,
    pending: BinaryHeap<Reverse<Wakeup>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Registers a task. Registration order breaks ties between wakeups.
    pub fn register(&mut self) -> TaskId {
        let id = TaskId(self.tasks);
        self.tasks += 1;
        id
    }

    pub fn schedule_at(&mut self, task: TaskId, at: f64) -> Result<(), SimError> {
        if !at.is_finite() {
            return Err(SimError::NonFinite { task: task.0, at });
        }
        if at < self.clock.now {
            return Err(SimError::InThePast {
                task: task.0,
                at,
                now: self.clock.now,
            });
        }
        self.pending.push(Reverse(Wakeup { at, task }));
        Ok(())
    }

    /// Suspends `task` for `delta` simulated seconds.
    pub fn hold(&mut self, task: TaskId, delta: f64) -> Result<(), SimError> {
        self.schedule_at(task, self.clock.now + delta)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Pops the earliest wakeup, moves the clock to it and hands back its task.
    pub fn next(&mut self) -> Option<TaskId> {
        let Reverse(wakeup) = self.pending.pop()?;
        debug_assert!(wakeup.at >= self.clock.now);
        self.clock.now = wakeup.at;
        Some(wakeup.task)
    }
}
