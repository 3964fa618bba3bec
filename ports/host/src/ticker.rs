//! Clock tick service
//!
//! Emulates the periodic timer interrupt with a dedicated thread. Deadlines
//! are absolute on a monotonic clock, so sleep jitter does not accumulate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::HostPortError;

/// Callback run on every delivered tick
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Running ticker thread
pub struct Ticker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a ticker firing every `period`.
    ///
    /// Ticks are delivered to `callback` only while `irq_enabled` is set;
    /// masked ticks are dropped, like a timer interrupt that fires with
    /// interrupts disabled and is not latched.
    pub fn spawn(
        period: Duration,
        irq_enabled: Arc<AtomicBool>,
        delivered: Arc<AtomicU64>,
        callback: TickCallback,
    ) -> Result<Self, HostPortError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("pulse-ticker".into())
            .spawn(move || {
                ticker_thread(period, &thread_running, &irq_enabled, &delivered, &callback)
            })
            .map_err(HostPortError::Spawn)?;

        debug!("pulse-host: ticker started, period {:?}", period);
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the ticker thread is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the ticker and wait for the thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("pulse-host: ticker stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker_thread(
    period: Duration,
    running: &AtomicBool,
    irq_enabled: &AtomicBool,
    delivered: &AtomicU64,
    callback: &TickCallback,
) {
    let mut next_tick = Instant::now();

    while running.load(Ordering::Relaxed) {
        next_tick += period;

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }

        if !running.load(Ordering::Relaxed) {
            break;
        }

        if irq_enabled.load(Ordering::SeqCst) {
            callback();
            delivered.fetch_add(1, Ordering::SeqCst);
        } else {
            trace!("pulse-host: tick masked");
        }
    }
}
