//! The Pulse kernel: task table, tick producer and dispatch consumer

use core::cell::RefCell;

use critical_section::Mutex;
use log::{debug, error, info, trace};
use pulse_core::{
    Elapsed, KernelConfig, Port, PulseError, PulseResult, ReadySet, TaskId, TaskInfo, TaskLogic,
    TaskState, MAX_TASKS,
};

use crate::state::{Dispatch, KernelState, TaskSlot};

/// Cooperative scheduler for up to `N` tasks.
///
/// The timer interrupt calls [`Kernel::tick_isr`], which only advances time
/// and marks tasks ready. The main context calls [`Kernel::poll`] (directly or
/// through [`Kernel::start`]), which runs every ready task to completion in
/// registration order. Shared state lives behind a critical section; task
/// logic never runs inside one.
///
/// One kernel value is meant to live for the whole program. [`crate::kernel()`]
/// provides a process-wide instance; applications that need a different
/// capacity or configuration place their own in a `static`.
pub struct Kernel<const N: usize> {
    config: KernelConfig,
    state: Mutex<RefCell<KernelState<N>>>,
}

impl<const N: usize> Kernel<N> {
    const CAPACITY_CHECK: () = assert!(
        N >= 1 && N <= MAX_TASKS,
        "task capacity must be within 1..=64"
    );

    /// Create an empty kernel
    pub const fn new(config: KernelConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            config,
            state: Mutex::new(RefCell::new(KernelState::new())),
        }
    }

    /// Reset the kernel and set the tick period.
    ///
    /// A period of 0 ms is raised to 1 ms. Every registered task is dropped
    /// and the started flag is cleared. Must not be called once the run loop
    /// is running.
    pub fn init(&self, tick_period_ms: u32) {
        let tick_period_ms = tick_period_ms.max(1);
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).reset(tick_period_ms);
        });
        debug!("pulse: init, tick period {} ms", tick_period_ms);
    }

    /// Register a task.
    ///
    /// Tasks are dispatched in registration order when ready at the same
    /// time, so the returned id is also the task's priority. With
    /// `run_immediately` configured the task is ready before the first tick.
    pub fn add_task(
        &self,
        initial_state: TaskState,
        period: u32,
        logic: Option<&'static dyn TaskLogic>,
    ) -> PulseResult<TaskId> {
        if period == 0 {
            return Err(PulseError::InvalidPeriod);
        }
        if logic.is_none() && self.config.null_logic_guard {
            return Err(PulseError::InvalidLogic);
        }

        let run_immediately = self.config.run_immediately;
        let id = critical_section::with(|cs| -> PulseResult<TaskId> {
            let mut state = self.state.borrow_ref_mut(cs);
            let id = TaskId::new(state.tasks.len() as u8);
            let slot = TaskSlot {
                state: initial_state,
                period,
                elapsed: if run_immediately {
                    Elapsed::new(period)
                } else {
                    Elapsed::ZERO
                },
                running: false,
                logic,
            };
            state
                .tasks
                .push(slot)
                .map_err(|_| PulseError::CapacityExceeded)?;
            if run_immediately {
                state.ready.insert(id);
            }
            Ok(id)
        })?;

        debug!("pulse: registered {} with period {} ticks", id, period);
        Ok(id)
    }

    /// Advance time by one tick. Call only from the timer interrupt.
    ///
    /// Marks a task ready once its elapsed count reaches its period, unless
    /// it is executing right now. The count keeps growing until the task is
    /// dispatched, so a late poll releases the task once, not once per missed
    /// period.
    pub fn tick_isr(&self) {
        let saturate = self.config.saturate_elapsed;
        let count = critical_section::with(|cs| self.state.borrow_ref(cs).tasks.len());

        for index in 0..count {
            critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                let KernelState { tasks, ready, .. } = &mut *state;
                if let Some(task) = tasks.get_mut(index) {
                    task.elapsed.advance(saturate);
                    if task.elapsed.has_reached(task.period) && !task.running {
                        ready.insert(TaskId::new(index as u8));
                    }
                }
            });
        }
    }

    /// Run every ready task once, highest priority first.
    ///
    /// Returns when no ready bit is left. A task made ready while another one
    /// runs is picked up by the same call.
    pub fn poll(&self) {
        while let Some(dispatch) = self.begin_dispatch() {
            let next = match dispatch.logic {
                Some(logic) => logic.tick(dispatch.state),
                None => dispatch.state,
            };
            self.end_dispatch(dispatch.id, next);
            trace!("pulse: dispatched {} -> state {}", dispatch.id, next);
        }
    }

    /// Start the scheduler. Never returns.
    ///
    /// Arms the port timer, enables interrupts and then alternates
    /// [`Kernel::poll`] with the port idle hook. Calling it a second time is a
    /// fatal error: the call parks in the idle hook forever.
    pub fn start<P: Port>(&self, port: &mut P) -> ! {
        if !self.mark_started() {
            error!("pulse: start called on a running kernel, parking in idle");
            loop {
                port.idle_hook();
            }
        }

        self.arm(port);
        loop {
            self.poll();
            port.idle_hook();
        }
    }

    /// Hosted run loop with a shutdown condition.
    ///
    /// Same sequence as [`Kernel::start`], but `stop` is checked before every
    /// pass. On exit interrupts are masked again through the port. Returns
    /// [`PulseError::AlreadyStarted`] instead of parking when the kernel was
    /// already started.
    pub fn run_until<P, F>(&self, port: &mut P, mut stop: F) -> PulseResult<()>
    where
        P: Port,
        F: FnMut() -> bool,
    {
        if !self.mark_started() {
            return Err(PulseError::AlreadyStarted);
        }

        self.arm(port);
        while !stop() {
            self.poll();
            port.idle_hook();
        }
        port.disable_global_irq();
        info!("pulse: run loop stopped");
        Ok(())
    }

    /// Whether the run loop has been entered since the last `init`
    pub fn is_started(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).started)
    }

    /// Configured milliseconds per tick
    pub fn tick_period_ms(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).tick_period_ms)
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).tasks.len())
    }

    /// Task table capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Behavior switches this kernel was built with
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Snapshot of the ready set
    pub fn ready_set(&self) -> ReadySet {
        critical_section::with(|cs| self.state.borrow_ref(cs).ready)
    }

    /// Snapshot of one task
    pub fn task(&self, id: TaskId) -> Option<TaskInfo> {
        critical_section::with(|cs| {
            self.state
                .borrow_ref(cs)
                .tasks
                .get(id.index())
                .map(|slot| slot.info(id))
        })
    }

    fn mark_started(&self) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.started {
                false
            } else {
                state.started = true;
                true
            }
        })
    }

    fn arm<P: Port>(&self, port: &mut P) {
        let tick_ms = self.tick_period_ms();
        port.timer_init(tick_ms);
        port.enable_global_irq();
        info!(
            "pulse: started with {} tasks, {} ms tick",
            self.task_count(),
            tick_ms
        );
    }

    /// Claim the highest-priority ready task
    fn begin_dispatch(&self) -> Option<Dispatch> {
        critical_section::with(|cs| -> Option<Dispatch> {
            let mut state = self.state.borrow_ref_mut(cs);
            let KernelState { tasks, ready, .. } = &mut *state;

            let id = ready.lowest(N)?;
            ready.remove(id);

            let task = tasks.get_mut(id.index())?;
            task.running = true;
            task.elapsed.reset();

            Some(Dispatch {
                id,
                state: task.state,
                logic: task.logic,
            })
        })
    }

    fn end_dispatch(&self, id: TaskId, next: TaskState) {
        critical_section::with(|cs| {
            if let Some(task) = self.state.borrow_ref_mut(cs).tasks.get_mut(id.index()) {
                task.state = next;
                task.running = false;
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn set_elapsed(&self, id: TaskId, ticks: u32) {
        critical_section::with(|cs| {
            if let Some(task) = self.state.borrow_ref_mut(cs).tasks.get_mut(id.index()) {
                task.elapsed = Elapsed::new(ticks);
            }
        });
    }
}

impl<const N: usize> Default for Kernel<N> {
    fn default() -> Self {
        Self::new(KernelConfig::DEFAULT)
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for Kernel<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Kernel{{tasks: {}/{}, started: {}}}",
            self.task_count(),
            N,
            self.is_started()
        );
    }
}
