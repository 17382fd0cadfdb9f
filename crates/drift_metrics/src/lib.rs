//! Drift Metrics - frame pacing instrumentation
//!
//! Frame timing, event counters and per-phase profiling for the frame
//! driver. Everything is real only with the `metrics` feature; without it
//! the same API compiles down to empty stubs.
//!
//! # Usage
//!
//! ```ignore
//! use drift_metrics::FrameTimer;
//!
//! let mut timer = FrameTimer::new(120); // Track last 120 frames
//! timer.begin();
//! // ... render a frame ...
//! timer.end();
//! tracing::info!(fps = timer.fps());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod phase_profiler;
#[cfg(feature = "metrics")]
mod ring_buffer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use phase_profiler::PhaseProfiler;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

/// Whether instrumentation is compiled in.
pub const ENABLED: bool = cfg!(feature = "metrics");

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct FrameTimer;

#[cfg(not(feature = "metrics"))]
impl FrameTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn record(&mut self, _frame_time: std::time::Duration) {}
    pub fn frames(&self) -> u64 { 0 }
    pub fn fps(&self) -> f64 { 0.0 }
    pub fn frame_time_ms(&self) -> f64 { 0.0 }
    pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str) {}
    pub fn add(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct PhaseProfiler;

#[cfg(not(feature = "metrics"))]
impl PhaseProfiler {
    pub fn new() -> Self { Self }
    pub fn time_phase<F, R>(&mut self, _name: &'static str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn add(&mut self, _name: &'static str, _elapsed: std::time::Duration) {}
    pub fn timing(&self, _name: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn reset(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, std::time::Duration)> + '_ { std::iter::empty() }
}

#[cfg(test)]
mod tests {
    #[test]
    fn api_is_available_either_way() {
        let mut timer = super::FrameTimer::new(60);
        timer.begin();
        timer.end();
        let mut counter = super::Counter::new();
        counter.increment("presented");
        let mut profiler = super::PhaseProfiler::new();
        assert_eq!(profiler.time_phase("advance", || 3), 3);
        assert_eq!(super::ENABLED, cfg!(feature = "metrics"));
    }
}
