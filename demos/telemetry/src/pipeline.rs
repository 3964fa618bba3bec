//! Producer/consumer task wiring.
//!
//! Two producers (sensor, battery) update the shared telemetry record, one
//! consumer (transmitter) takes a snapshot for the downlink. Priority follows
//! registration order, so on a tick where all three are due the transmitter
//! sees both updates of that tick.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use log::debug;
use pulse_kernel::{Kernel, PulseResult, TaskId, TaskLogic, TaskState};

use crate::telemetry::{Telemetry, TelemetryCell};

/// Events kept by the pipeline log
pub const EVENT_CAPACITY: usize = 64;

/// Temperature step applied by every sensor run
pub const TEMP_STEP_C: i16 = 10;

/// Voltage step applied by every battery run
pub const VBAT_STEP_MV: u16 = 100;

/// What a stage does when dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sensor,
    Battery,
    Transmitter,
}

/// One dispatched stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub tick: u32,
    pub role: Role,
    /// Frame handed to the downlink; transmitter events only
    pub snapshot: Option<Telemetry>,
}

/// Shared state of the telemetry application
pub struct Pipeline {
    telemetry: TelemetryCell,
    now: AtomicU32,
    events: Mutex<RefCell<heapless::Vec<Event, EVENT_CAPACITY>>>,
    dropped: AtomicU32,
    #[cfg(any(test, feature = "fault-injection"))]
    inject_on_tick: AtomicU32,
}

impl Pipeline {
    pub const fn new() -> Self {
        Self {
            telemetry: TelemetryCell::new(),
            now: AtomicU32::new(0),
            events: Mutex::new(RefCell::new(heapless::Vec::new())),
            dropped: AtomicU32::new(0),
            #[cfg(any(test, feature = "fault-injection"))]
            inject_on_tick: AtomicU32::new(0),
        }
    }

    pub fn telemetry(&self) -> &TelemetryCell {
        &self.telemetry
    }

    /// Application clock in ticks
    pub fn now(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }

    /// Advance the application clock by one tick; returns the new value
    pub fn advance_clock(&self) -> u32 {
        self.now.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Copy of the event log
    pub fn events(&self) -> heapless::Vec<Event, EVENT_CAPACITY> {
        critical_section::with(|cs| self.events.borrow_ref(cs).clone())
    }

    /// Events lost because the log was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Clear the clock, the log and the telemetry record
    pub fn reset(&self) {
        self.now.store(0, Ordering::SeqCst);
        self.dropped.store(0, Ordering::SeqCst);
        self.telemetry.reset();
        #[cfg(any(test, feature = "fault-injection"))]
        self.inject_on_tick.store(0, Ordering::SeqCst);
        critical_section::with(|cs| self.events.borrow_ref_mut(cs).clear());
    }

    /// Race the transmitter's snapshot on `tick` with one extra write.
    ///
    /// Tick 0 disables the injection.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn inject_on_tick(&self, tick: u32) {
        self.inject_on_tick.store(tick, Ordering::SeqCst);
    }

    fn record(&self, role: Role, snapshot: Option<Telemetry>) {
        let event = Event {
            tick: self.now(),
            role,
            snapshot,
        };
        let pushed = critical_section::with(|cs| self.events.borrow_ref_mut(cs).push(event));
        if pushed.is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn run_sensor(&self) {
        let now = self.now();
        self.telemetry.write(|frame| {
            frame.tick = now;
            frame.temp_c = frame.temp_c.wrapping_add(TEMP_STEP_C);
        });
        self.record(Role::Sensor, None);
    }

    fn run_battery(&self) {
        let now = self.now();
        self.telemetry.write(|frame| {
            frame.tick = now;
            frame.vbat_mv = frame.vbat_mv.wrapping_add(VBAT_STEP_MV);
        });
        self.record(Role::Battery, None);
    }

    fn run_transmitter(&self) {
        #[cfg(any(test, feature = "fault-injection"))]
        {
            let target = self.inject_on_tick.load(Ordering::SeqCst);
            if target != 0 && target == self.now() {
                self.telemetry.inject_interference_once();
            }
        }

        let snapshot = self.telemetry.read_snapshot();
        debug!(
            "telemetry: downlink tick={} temp={}C vbat={}mV",
            snapshot.tick, snapshot.temp_c, snapshot.vbat_mv
        );
        self.record(Role::Transmitter, Some(snapshot));
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Task logic for one [`Role`] of a [`Pipeline`].
///
/// The task state counts completed runs.
pub struct Stage {
    role: Role,
    pipeline: &'static Pipeline,
}

impl Stage {
    pub const fn new(role: Role, pipeline: &'static Pipeline) -> Self {
        Self { role, pipeline }
    }

    /// Sensor, battery and transmitter stages, in priority order
    pub const fn all(pipeline: &'static Pipeline) -> [Stage; 3] {
        [
            Stage::new(Role::Sensor, pipeline),
            Stage::new(Role::Battery, pipeline),
            Stage::new(Role::Transmitter, pipeline),
        ]
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl TaskLogic for Stage {
    fn tick(&self, state: TaskState) -> TaskState {
        match self.role {
            Role::Sensor => self.pipeline.run_sensor(),
            Role::Battery => self.pipeline.run_battery(),
            Role::Transmitter => self.pipeline.run_transmitter(),
        }
        state.wrapping_add(1)
    }
}

/// Register `stages` with `kernel` in order, each with `period` ticks
pub fn register<const N: usize>(
    kernel: &Kernel<N>,
    stages: &'static [Stage],
    period: u32,
) -> PulseResult<heapless::Vec<TaskId, N>> {
    let mut ids = heapless::Vec::new();
    for stage in stages {
        let id = kernel.add_task(0, period, Some(stage))?;
        // Never full: the kernel runs out of slots first.
        ids.push(id).ok();
        debug!("telemetry: {:?} stage is {}", stage.role(), id);
    }
    Ok(ids)
}

/// One simulated timer period: clock, tick interrupt, main-loop poll
pub fn step<const N: usize>(kernel: &Kernel<N>, pipeline: &Pipeline) {
    pipeline.advance_clock();
    kernel.tick_isr();
    kernel.poll();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_kernel::KernelConfig;

    fn setup() -> (&'static Kernel<8>, &'static Pipeline) {
        let kernel: &'static Kernel<8> =
            Box::leak(Box::new(Kernel::<8>::new(KernelConfig::new().run_immediately(false))));
        let pipeline: &'static Pipeline = Box::leak(Box::new(Pipeline::new()));
        let stages: &'static [Stage; 3] = Box::leak(Box::new(Stage::all(pipeline)));

        kernel.init(1);
        let ids = register(kernel, stages, 1).unwrap();
        assert_eq!(
            ids.iter().map(|id| id.index()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            stages.iter().map(Stage::role).collect::<Vec<_>>(),
            vec![Role::Sensor, Role::Battery, Role::Transmitter]
        );
        (kernel, pipeline)
    }

    #[test]
    fn register_stops_when_the_kernel_is_full() {
        let kernel: &'static Kernel<2> = Box::leak(Box::new(Kernel::<2>::default()));
        let pipeline: &'static Pipeline = Box::leak(Box::new(Pipeline::new()));
        let stages: &'static [Stage; 3] = Box::leak(Box::new(Stage::all(pipeline)));

        kernel.init(1);
        assert_eq!(
            register(kernel, stages, 1),
            Err(pulse_kernel::PulseError::CapacityExceeded)
        );
        assert_eq!(kernel.task_count(), 2);
    }

    #[test]
    fn snapshot_on_tick_one_includes_injected_write() {
        let (kernel, pipeline) = setup();
        pipeline.inject_on_tick(1);

        for _ in 0..3 {
            step(kernel, pipeline);
        }

        let events = pipeline.events();
        assert_eq!(events.len(), 9);

        let expected_roles = [Role::Sensor, Role::Battery, Role::Transmitter];
        for (index, event) in events.iter().enumerate() {
            assert_eq!(event.tick, index as u32 / 3 + 1);
            assert_eq!(event.role, expected_roles[index % 3]);
            assert_eq!(event.snapshot.is_some(), event.role == Role::Transmitter);
        }

        let snapshots: Vec<(i16, u16)> = events
            .iter()
            .filter_map(|event| event.snapshot)
            .map(|snap| (snap.temp_c, snap.vbat_mv))
            .collect();
        assert_eq!(snapshots, vec![(11, 100), (21, 200), (31, 300)]);
        assert_eq!(pipeline.telemetry().retries(), 1);
    }

    #[test]
    fn stage_state_counts_runs() {
        let (kernel, pipeline) = setup();
        for _ in 0..4 {
            step(kernel, pipeline);
        }
        for index in 0..3u8 {
            let info = kernel.task(TaskId::new(index)).unwrap();
            assert_eq!(info.state, 4);
        }
    }

    #[test]
    fn full_log_counts_dropped_events() {
        let (kernel, pipeline) = setup();
        for _ in 0..22 {
            step(kernel, pipeline);
        }
        assert_eq!(pipeline.events().len(), EVENT_CAPACITY);
        assert_eq!(pipeline.dropped(), 66 - EVENT_CAPACITY as u32);

        pipeline.reset();
        assert!(pipeline.events().is_empty());
        assert_eq!(pipeline.now(), 0);
        assert_eq!(pipeline.dropped(), 0);
    }
}
