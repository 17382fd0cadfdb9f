//! Accumulated wall time per named frame phase

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct PhaseProfiler {
    timings: BTreeMap<&'static str, Duration>,
}

impl PhaseProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_phase<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.add(name, start.elapsed());
        result
    }

    pub fn add(&mut self, name: &'static str, elapsed: Duration) {
        *self.timings.entry(name).or_insert(Duration::ZERO) += elapsed;
    }

    pub fn timing(&self, name: &str) -> Duration {
        self.timings.get(name).copied().unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.timings.iter().map(|(name, d)| (*name, *d))
    }
}
