//! Tick accounting

use core::fmt;

/// Ticks accumulated by a task since its last dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Elapsed(u32);

impl Elapsed {
    /// Zero ticks
    pub const ZERO: Self = Self(0);

    /// Largest representable count
    pub const MAX: Self = Self(u32::MAX);

    /// Create a counter holding `ticks`
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Raw tick count
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Advance by one tick.
    ///
    /// With `saturate` the counter sticks at [`Elapsed::MAX`]; otherwise it
    /// wraps to zero.
    pub fn advance(&mut self, saturate: bool) {
        self.0 = if saturate {
            self.0.saturating_add(1)
        } else {
            self.0.wrapping_add(1)
        };
    }

    /// Whether a task with this count and `period` is due
    pub const fn has_reached(self, period: u32) -> bool {
        self.0 >= period
    }

    /// Restart counting from zero
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Elapsed {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}
