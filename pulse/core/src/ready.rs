//! Ready bitset shared between the tick interrupt and the dispatcher

use crate::TaskId;

/// Largest task table a [`ReadySet`] can track
pub const MAX_TASKS: usize = 64;

/// Bitset of tasks waiting for dispatch.
///
/// Bit `i` is set while task `i` is ready and has not been dispatched yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadySet(u64);

impl ReadySet {
    /// Empty set
    pub const EMPTY: Self = Self(0);

    /// Create a new empty set
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Create a set from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Mark a task ready; ids past [`MAX_TASKS`] are ignored
    pub fn insert(&mut self, id: TaskId) {
        self.0 |= Self::bit(id);
    }

    /// Clear a task's ready bit
    pub fn remove(&mut self, id: TaskId) {
        self.0 &= !Self::bit(id);
    }

    /// Check whether a task is ready; always false past [`MAX_TASKS`]
    pub const fn contains(self, id: TaskId) -> bool {
        self.0 & Self::bit(id) != 0
    }

    /// Check if no task is ready
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of ready tasks
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Clear every bit
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Lowest-index (highest-priority) ready task among the first `limit` slots.
    ///
    /// Linear scan; `limit` is the task table capacity and never exceeds 64.
    pub fn lowest(self, limit: usize) -> Option<TaskId> {
        let limit = if limit > MAX_TASKS { MAX_TASKS } else { limit };
        (0..limit as u8)
            .map(TaskId::new)
            .find(|&id| self.contains(id))
    }

    /// Iterate over ready tasks in priority order
    pub fn iter(self) -> impl Iterator<Item = TaskId> {
        (0..MAX_TASKS as u8)
            .map(TaskId::new)
            .filter(move |&id| self.contains(id))
    }

    const fn bit(id: TaskId) -> u64 {
        match 1u64.checked_shl(id.raw() as u32) {
            Some(bit) => bit,
            None => 0,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ReadySet {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ReadySet({=u64:b})", self.0);
    }
}
