//! Hardware port contract
//!
//! A port supplies the primitives the kernel needs from the target. Critical
//! sections are not part of [`Port`]: the kernel takes them through the
//! [`critical-section`](https://docs.rs/critical-section) crate, so every
//! target must also provide a `critical_section::Impl` (interrupt masking on a
//! single core, a global lock on hosted targets).

/// Target primitives used by the run loop
pub trait Port {
    /// Unmask interrupts globally
    fn enable_global_irq(&mut self);

    /// Mask interrupts globally
    fn disable_global_irq(&mut self);

    /// Arm a periodic timer whose interrupt calls the kernel's `tick_isr`
    /// every `tick_ms` milliseconds
    fn timer_init(&mut self, tick_ms: u32);

    /// Called between dispatch passes; sleep, power-save or watchdog service
    fn idle_hook(&mut self) {}
}

/// Compare-match value for a periodic timer.
///
/// `counts_per_ms` is the timer input frequency in counts per millisecond.
/// The timer fires after `reload + 1` counts, so the result is one less than
/// the period; it never underflows and is clamped to the counter width `max`.
/// A period that overflows `u32` yields `max`.
pub const fn timer_reload(counts_per_ms: u32, tick_ms: u32, max: u32) -> u32 {
    let period = match counts_per_ms.checked_mul(tick_ms) {
        Some(period) => period,
        None => return max,
    };
    let reload = if period > 0 { period - 1 } else { 0 };
    if reload > max {
        max
    } else {
        reload
    }
}
