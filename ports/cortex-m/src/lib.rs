//! Arm Cortex-M port for the Pulse scheduler.
//!
//! - Tick source: SysTick, clocked from the core clock.
//! - Interrupt masking: PRIMASK.
//! - Critical sections: `cortex-m`'s single-core implementation.
//! - Idle: `wfi`, woken by the next interrupt.
//!
//! With the `systick-handler` feature (on by default) this crate installs the
//! SysTick exception handler and forwards it to [`pulse_kernel::tick_isr`].
//! Applications that run their own [`pulse_kernel::Kernel`] disable the
//! feature and call `tick_isr` on it from their own handler.

#![no_std]

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use pulse_core::{timer_reload, Port};

/// SysTick counts down from a 24-bit reload value
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Cortex-M implementation of [`Port`]
pub struct CortexMPort {
    syst: SYST,
    core_clock_hz: u32,
}

impl CortexMPort {
    /// Take ownership of SysTick. `core_clock_hz` is the processor clock.
    pub fn new(syst: SYST, core_clock_hz: u32) -> Self {
        Self {
            syst,
            core_clock_hz,
        }
    }

    /// SysTick reload value for a tick of `tick_ms`
    pub const fn reload_for(&self, tick_ms: u32) -> u32 {
        timer_reload(self.core_clock_hz / 1_000, tick_ms, SYSTICK_MAX_RELOAD)
    }

    /// Give SysTick back
    pub fn free(self) -> SYST {
        self.syst
    }
}

impl Port for CortexMPort {
    fn enable_global_irq(&mut self) {
        // SAFETY: the kernel enables interrupts once, after its state and the
        // timer are set up; nothing is inside a critical section here.
        unsafe { cortex_m::interrupt::enable() }
    }

    fn disable_global_irq(&mut self) {
        cortex_m::interrupt::disable();
    }

    fn timer_init(&mut self, tick_ms: u32) {
        let reload = self.reload_for(tick_ms);
        self.syst.disable_counter();
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.set_reload(reload);
        self.syst.clear_current();
        self.syst.enable_interrupt();
        self.syst.enable_counter();
    }

    fn idle_hook(&mut self) {
        cortex_m::asm::wfi();
    }
}

#[cfg(feature = "systick-handler")]
mod handler {
    use cortex_m_rt::exception;

    #[exception]
    fn SysTick() {
        pulse_kernel::tick_isr();
    }
}
