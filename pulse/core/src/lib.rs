#![no_std]
#![forbid(unsafe_code)]

//! # Pulse Core
//!
//! Core types, traits, and abstractions for the Pulse cooperative scheduler.
//! The kernel crate builds the task table and the tick/dispatch loop on top of
//! these; ports implement [`Port`] for a concrete target.

use core::fmt;

pub mod config;
pub mod port;
pub mod ready;
pub mod task;
pub mod time;

pub use config::*;
pub use port::*;
pub use ready::*;
pub use task::*;
pub use time::*;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scheduler major version
pub const VERSION_MAJOR: u32 = 0;

/// Scheduler minor version
pub const VERSION_MINOR: u32 = 1;

/// Scheduler patch version
pub const VERSION_PATCH: u32 = 0;

/// Packed version for numeric comparisons (`major * 10000 + minor * 100 + patch`)
pub const VERSION_PACKED: u32 = VERSION_MAJOR * 10_000 + VERSION_MINOR * 100 + VERSION_PATCH;

/// Result type used throughout Pulse
pub type PulseResult<T> = Result<T, PulseError>;

/// Error types for Pulse operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseError {
    /// Task period is zero
    InvalidPeriod,
    /// Task registered without logic while the null-logic guard is enabled
    InvalidLogic,
    /// Task table is full
    CapacityExceeded,
    /// Run loop was already started
    AlreadyStarted,
}

impl PulseError {
    /// Legacy status code for this error.
    ///
    /// Registration failures map to `-1`, `-2` and `-3` in validation order.
    pub const fn code(self) -> i32 {
        match self {
            PulseError::InvalidPeriod => -1,
            PulseError::InvalidLogic => -2,
            PulseError::CapacityExceeded => -3,
            PulseError::AlreadyStarted => -4,
        }
    }
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseError::InvalidPeriod => write!(f, "Task period must be greater than zero"),
            PulseError::InvalidLogic => write!(f, "Task logic is missing"),
            PulseError::CapacityExceeded => write!(f, "Task table is full"),
            PulseError::AlreadyStarted => write!(f, "Scheduler already started"),
        }
    }
}

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for PulseError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PulseError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PulseError::InvalidPeriod => defmt::write!(fmt, "InvalidPeriod"),
            PulseError::InvalidLogic => defmt::write!(fmt, "InvalidLogic"),
            PulseError::CapacityExceeded => defmt::write!(fmt, "CapacityExceeded"),
            PulseError::AlreadyStarted => defmt::write!(fmt, "AlreadyStarted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_validation_order() {
        assert_eq!(PulseError::InvalidPeriod.code(), -1);
        assert_eq!(PulseError::InvalidLogic.code(), -2);
        assert_eq!(PulseError::CapacityExceeded.code(), -3);
    }

    #[test]
    fn packed_version() {
        assert_eq!(VERSION_PACKED, 100);
        assert_eq!(VERSION_MAJOR, 0);
    }
}
