//! Kernel state shared between the tick interrupt and the dispatcher

use heapless::Vec;
use pulse_core::{Elapsed, ReadySet, TaskId, TaskInfo, TaskLogic, TaskState};

/// One entry of the task table
#[derive(Clone, Copy)]
pub(crate) struct TaskSlot {
    pub state: TaskState,
    pub period: u32,
    pub elapsed: Elapsed,
    pub running: bool,
    pub logic: Option<&'static dyn TaskLogic>,
}

impl TaskSlot {
    pub fn info(&self, id: TaskId) -> TaskInfo {
        TaskInfo {
            id,
            state: self.state,
            period: self.period,
            elapsed: self.elapsed.ticks(),
            running: self.running,
        }
    }
}

/// Everything guarded by the kernel critical section
pub(crate) struct KernelState<const N: usize> {
    /// Append-only task table; slot index is the task's priority
    pub tasks: Vec<TaskSlot, N>,
    pub ready: ReadySet,
    pub started: bool,
    pub tick_period_ms: u32,
}

impl<const N: usize> KernelState<N> {
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            ready: ReadySet::EMPTY,
            started: false,
            tick_period_ms: 1,
        }
    }

    pub fn reset(&mut self, tick_period_ms: u32) {
        self.tasks.clear();
        self.ready.clear();
        self.started = false;
        self.tick_period_ms = tick_period_ms;
    }
}

/// A task claimed for dispatch; logic runs on this copy outside the lock
pub(crate) struct Dispatch {
    pub id: TaskId,
    pub state: TaskState,
    pub logic: Option<&'static dyn TaskLogic>,
}
