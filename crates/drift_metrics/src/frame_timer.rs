//! CPU frame time tracking

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

pub struct FrameTimer {
    frame_start: Option<Instant>,
    frame_times: RingBuffer<Duration>,
    frames: u64,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frame_start: None,
            frame_times: RingBuffer::new(capacity),
            frames: 0,
        }
    }

    pub fn begin(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Records the time since `begin`. Calls without a matching `begin` are ignored.
    pub fn end(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.record(start.elapsed());
        }
    }

    pub fn record(&mut self, frame_time: Duration) {
        self.frame_times.push(frame_time);
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f64 {
        let avg = self.frame_times.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_times.average().as_secs_f64() * 1000.0
    }

    pub fn frame_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.frame_times.min_max();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_recorded_frames() {
        let mut timer = FrameTimer::new(4);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.frames(), 2);
        assert!((timer.frame_time_ms() - 20.0).abs() < 1e-9);
        assert!((timer.fps() - 50.0).abs() < 1e-6);
        assert_eq!(timer.frame_time_range_ms(), (10.0, 30.0));
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut timer = FrameTimer::new(4);
        timer.end();
        assert_eq!(timer.frames(), 0);
        assert_eq!(timer.fps(), 0.0);

        timer.begin();
        timer.end();
        assert_eq!(timer.frames(), 1);
    }
}
