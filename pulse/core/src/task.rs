//! Task identity and logic capability

use core::fmt;

/// Opaque per-task state threaded through successive dispatches
pub type TaskState = i32;

/// Registration index of a task.
///
/// Assigned in insertion order starting at 0 and never reassigned. The index
/// is also the task's priority: a lower index is dispatched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u8);

impl TaskId {
    /// Create a task id from a raw table index
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Raw table index
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Task({})", self.0);
    }
}

/// Task logic invoked by the dispatcher.
///
/// Implementations must run to completion without blocking or allocating and
/// return the state for the next dispatch. Logic executes with interrupts
/// enabled and outside every scheduler critical section.
pub trait TaskLogic: Sync {
    /// Run one step of the task
    fn tick(&self, state: TaskState) -> TaskState;
}

impl<F> TaskLogic for F
where
    F: Fn(TaskState) -> TaskState + Sync,
{
    fn tick(&self, state: TaskState) -> TaskState {
        self(state)
    }
}

/// Point-in-time view of a registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    /// Registration index and priority
    pub id: TaskId,
    /// State after the most recent dispatch
    pub state: TaskState,
    /// Period in ticks
    pub period: u32,
    /// Ticks accumulated since the last dispatch
    pub elapsed: u32,
    /// Whether the task logic is executing right now
    pub running: bool,
}
