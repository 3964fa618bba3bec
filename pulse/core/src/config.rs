//! Compile-time kernel configuration

/// Task table capacity of the process-wide kernel
pub const DEFAULT_CAPACITY: usize = 16;

/// Kernel behavior switches.
///
/// Built with `const fn`s so a kernel placed in a `static` is fully configured
/// at compile time. [`KernelConfig::DEFAULT`] follows the crate features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Reject registrations that carry no task logic
    pub null_logic_guard: bool,
    /// Make new tasks ready before the first tick
    pub run_immediately: bool,
    /// Saturate elapsed counters instead of wrapping
    pub saturate_elapsed: bool,
}

impl KernelConfig {
    /// Configuration selected by the `null-logic-guard`, `run-immediately` and
    /// `saturate-elapsed` features
    pub const DEFAULT: Self = Self {
        null_logic_guard: cfg!(feature = "null-logic-guard"),
        run_immediately: cfg!(feature = "run-immediately"),
        saturate_elapsed: cfg!(feature = "saturate-elapsed"),
    };

    /// Start from the feature-selected defaults
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Enable or disable the null-logic guard
    pub const fn null_logic_guard(mut self, enabled: bool) -> Self {
        self.null_logic_guard = enabled;
        self
    }

    /// Enable or disable ready-on-registration
    pub const fn run_immediately(mut self, enabled: bool) -> Self {
        self.run_immediately = enabled;
        self
    }

    /// Choose saturating (`true`) or wrapping (`false`) elapsed accounting
    pub const fn saturate_elapsed(mut self, enabled: bool) -> Self {
        self.saturate_elapsed = enabled;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for KernelConfig {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "KernelConfig{{guard: {}, immediate: {}, saturate: {}}}",
            self.null_logic_guard,
            self.run_immediately,
            self.saturate_elapsed
        );
    }
}
