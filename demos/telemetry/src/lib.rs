//! Telemetry downlink on Pulse.
//!
//! Sensor and battery tasks update a shared frame; a transmitter task takes a
//! consistent snapshot of it for the downlink. The frame is guarded by a
//! sequence counter, so the consumer never blocks the producers.

pub mod pipeline;
pub mod telemetry;

pub use pipeline::{register, step, Event, Pipeline, Role, Stage, EVENT_CAPACITY};
pub use telemetry::{Telemetry, TelemetryCell};
