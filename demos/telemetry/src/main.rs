//! Hosted telemetry downlink.
//!
//! Usage: `telemetry [TICKS]`. Runs until `TICKS` ticks have elapsed
//! (default 50) or Ctrl-C. Set `RUST_LOG=debug` to see every downlink frame.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use pulse_host::HostPort;
use pulse_kernel::{Kernel, KernelConfig};
use pulse_telemetry::{register, Pipeline, Role, Stage};

const TICK_MS: u32 = 10;
const DEFAULT_TICKS: u32 = 50;

/// Sensor and battery every tick, downlink every fifth
const PRODUCER_PERIOD: u32 = 1;
const DOWNLINK_PERIOD: u32 = 5;

static KERNEL: Kernel<8> = Kernel::new(KernelConfig::DEFAULT);
static PIPELINE: Pipeline = Pipeline::new();
static PRODUCERS: [Stage; 2] = [
    Stage::new(Role::Sensor, &PIPELINE),
    Stage::new(Role::Battery, &PIPELINE),
];
static DOWNLINK: [Stage; 1] = [Stage::new(Role::Transmitter, &PIPELINE)];

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let budget = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<u32>()?,
        None => DEFAULT_TICKS,
    };

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    KERNEL.init(TICK_MS);
    register(&KERNEL, &PRODUCERS, PRODUCER_PERIOD)?;
    register(&KERNEL, &DOWNLINK, DOWNLINK_PERIOD)?;

    let mut port = HostPort::builder()
        .on_tick(|| {
            PIPELINE.advance_clock();
            KERNEL.tick_isr();
        })
        .idle_sleep(Duration::from_millis(1))
        .build();

    info!("telemetry: running for {} ticks of {} ms", budget, TICK_MS);
    KERNEL.run_until(&mut port, || {
        !running.load(Ordering::SeqCst) || PIPELINE.now() >= budget
    })?;
    port.stop();

    let downlinks = PIPELINE
        .events()
        .iter()
        .filter(|event| event.role == Role::Transmitter)
        .count();
    let last = PIPELINE.telemetry().read_snapshot();
    info!(
        "telemetry: {} ticks, {} downlinks logged ({} events dropped), last frame tick={} temp={}C vbat={}mV",
        PIPELINE.now(),
        downlinks,
        PIPELINE.dropped(),
        last.tick,
        last.temp_c,
        last.vbat_mv
    );

    Ok(())
}
