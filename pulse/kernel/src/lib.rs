#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! # Pulse Kernel
//!
//! Cooperative run-to-completion scheduler. A periodic timer interrupt marks
//! tasks ready; the main context dispatches them in strict priority order,
//! where priority is registration order. No preemption between tasks, no
//! allocation, fixed capacity.
//!
//! ```ignore
//! fn blink(state: pulse_kernel::TaskState) -> pulse_kernel::TaskState {
//!     toggle_led();
//!     state
//! }
//!
//! pulse_kernel::init(1);
//! pulse_kernel::add_task(0, 500, Some(&blink))?;
//! pulse_kernel::start(&mut port);
//! ```

mod kernel;
mod state;

pub use kernel::Kernel;
pub use pulse_core::{
    KernelConfig, Port, PulseError, PulseResult, ReadySet, TaskId, TaskInfo, TaskLogic, TaskState,
    DEFAULT_CAPACITY,
};

#[cfg(test)]
mod tests;

/// Process-wide kernel instance
static KERNEL: Kernel<DEFAULT_CAPACITY> = Kernel::new(KernelConfig::DEFAULT);

/// Get the process-wide kernel
pub fn kernel() -> &'static Kernel<DEFAULT_CAPACITY> {
    &KERNEL
}

/// Reset the process-wide kernel and set its tick period
pub fn init(tick_period_ms: u32) {
    kernel().init(tick_period_ms)
}

/// Register a task with the process-wide kernel
pub fn add_task(
    initial_state: TaskState,
    period: u32,
    logic: Option<&'static dyn TaskLogic>,
) -> PulseResult<TaskId> {
    kernel().add_task(initial_state, period, logic)
}

/// Start the process-wide kernel (never returns)
pub fn start<P: Port>(port: &mut P) -> ! {
    kernel().start(port)
}

/// Run the process-wide kernel until `stop` returns true
pub fn run_until<P, F>(port: &mut P, stop: F) -> PulseResult<()>
where
    P: Port,
    F: FnMut() -> bool,
{
    kernel().run_until(port, stop)
}

/// Timer interrupt entry point for the process-wide kernel
pub fn tick_isr() {
    kernel().tick_isr()
}

/// Run every ready task of the process-wide kernel once
pub fn poll() {
    kernel().poll()
}

/// Whether the process-wide kernel has been started
pub fn is_started() -> bool {
    kernel().is_started()
}

/// Tick period of the process-wide kernel
pub fn tick_period_ms() -> u32 {
    kernel().tick_period_ms()
}
