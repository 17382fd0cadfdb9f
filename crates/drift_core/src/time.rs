//! Simulation clock
//!
//! Planes advance one fixed step per presented frame, so simulated time is a
//! step count scaled by the nominal display rate rather than wall time.

use std::time::Duration;

/// Nominal refresh rate the per-step velocities are tuned for.
pub const NOMINAL_RATE_HZ: u32 = 60;
pub const NOMINAL_STEP: Duration = Duration::from_nanos(1_000_000_000 / NOMINAL_RATE_HZ as u64);

/// Counts simulation steps taken by the frame driver.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    steps: u64,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn advance(&mut self) -> u64 {
        self.steps += 1;
        self.steps
    }

    /// Simulated time assuming every step lasted `NOMINAL_STEP`.
    pub fn nominal_elapsed(&self) -> Duration {
        NOMINAL_STEP * self.steps.min(u32::MAX as u64) as u32
    }
}
