//! Hosted port for the Pulse scheduler.
//!
//! Stands in for a microcontroller on a desktop OS: a ticker thread plays the
//! periodic timer interrupt, an atomic flag plays the global interrupt enable
//! bit and the critical-section crate's `std` implementation provides the
//! process-wide lock the kernel uses for its critical sections.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, warn};
use pulse_core::Port;
use pulse_kernel::Kernel;
use thiserror::Error;

mod ticker;

pub use ticker::{TickCallback, Ticker};

/// Errors raised by the hosted port
#[derive(Error, Debug)]
pub enum HostPortError {
    #[error("ticker thread already running")]
    TickerRunning,
    #[error("failed to spawn ticker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Builder for [`HostPort`]
pub struct HostPortBuilder {
    on_tick: Option<TickCallback>,
    idle_sleep: Option<Duration>,
}

impl HostPortBuilder {
    fn new() -> Self {
        Self {
            on_tick: None,
            idle_sleep: None,
        }
    }

    /// Callback run by the ticker on every unmasked tick.
    ///
    /// Defaults to the process-wide [`pulse_kernel::tick_isr`].
    pub fn on_tick<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_tick = Some(Arc::new(callback));
        self
    }

    /// Drive the tick of a specific kernel
    pub fn kernel<const N: usize>(self, kernel: &'static Kernel<N>) -> Self {
        self.on_tick(move || kernel.tick_isr())
    }

    /// Sleep this long in the idle hook instead of just yielding
    pub fn idle_sleep(mut self, duration: Duration) -> Self {
        self.idle_sleep = Some(duration);
        self
    }

    pub fn build(self) -> HostPort {
        let on_tick: TickCallback = match self.on_tick {
            Some(callback) => callback,
            None => Arc::new(pulse_kernel::tick_isr),
        };
        HostPort {
            irq_enabled: Arc::new(AtomicBool::new(false)),
            delivered: Arc::new(AtomicU64::new(0)),
            idle_passes: 0,
            idle_sleep: self.idle_sleep,
            on_tick,
            ticker: None,
        }
    }
}

/// Desktop stand-in for the MCU primitives the kernel needs
pub struct HostPort {
    irq_enabled: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    idle_passes: u64,
    idle_sleep: Option<Duration>,
    on_tick: TickCallback,
    ticker: Option<Ticker>,
}

impl HostPort {
    /// Port driving the process-wide kernel
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Port driving `kernel`
    pub fn for_kernel<const N: usize>(kernel: &'static Kernel<N>) -> Self {
        Self::builder().kernel(kernel).build()
    }

    pub fn builder() -> HostPortBuilder {
        HostPortBuilder::new()
    }

    /// Spawn the ticker with a period of `tick_ms` milliseconds.
    ///
    /// This is the fallible form of [`Port::timer_init`].
    pub fn try_timer_init(&mut self, tick_ms: u32) -> Result<(), HostPortError> {
        if self.is_ticking() {
            return Err(HostPortError::TickerRunning);
        }

        let period = Duration::from_millis(u64::from(tick_ms.max(1)));
        let ticker = Ticker::spawn(
            period,
            Arc::clone(&self.irq_enabled),
            Arc::clone(&self.delivered),
            Arc::clone(&self.on_tick),
        )?;
        self.ticker = Some(ticker);
        Ok(())
    }

    /// Whether the ticker thread is running
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().map_or(false, Ticker::is_running)
    }

    /// Whether ticks are currently delivered
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled.load(Ordering::SeqCst)
    }

    /// Number of ticks delivered to the callback so far
    pub fn ticks(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Number of idle hook invocations so far
    pub fn idle_passes(&self) -> u64 {
        self.idle_passes
    }

    /// Stop the ticker and mask delivery
    pub fn stop(&mut self) {
        self.irq_enabled.store(false, Ordering::SeqCst);
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

impl Default for HostPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HostPort {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Port for HostPort {
    fn enable_global_irq(&mut self) {
        self.irq_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_global_irq(&mut self) {
        self.irq_enabled.store(false, Ordering::SeqCst);
    }

    fn timer_init(&mut self, tick_ms: u32) {
        match self.try_timer_init(tick_ms) {
            Ok(()) => {}
            Err(HostPortError::TickerRunning) => {
                warn!("pulse-host: timer already armed, keeping the running ticker")
            }
            Err(err) => error!("pulse-host: {}", err),
        }
    }

    fn idle_hook(&mut self) {
        self.idle_passes += 1;
        match self.idle_sleep {
            Some(duration) => thread::sleep(duration),
            None => thread::yield_now(),
        }
    }
}
