//! Fixed-capacity sample window for rolling statistics

use std::time::Duration;

pub struct RingBuffer<T> {
    samples: Vec<T>,
    capacity: usize,
    next: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Overwrites the oldest sample once full.
    pub fn push(&mut self, sample: T) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn latest(&self) -> Option<T> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = (self.next + self.capacity - 1) % self.capacity;
        self.samples.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RingBuffer<Duration> {
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.samples.iter().sum();
        sum / self.samples.len() as u32
    }

    pub fn min_max(&self) -> (Duration, Duration) {
        let min = self.samples.iter().min().copied().unwrap_or_default();
        let max = self.samples.iter().max().copied().unwrap_or_default();
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_last_frames_only() {
        let mut frames = RingBuffer::new(3);
        assert_eq!(frames.average(), Duration::ZERO);

        // One slow frame, then three at 60Hz push it out of the window.
        for ms in [50, 16, 17, 18] {
            frames.push(Duration::from_millis(ms));
        }

        assert_eq!(frames.len(), 3);
        assert_eq!(frames.average(), Duration::from_millis(17));
        assert_eq!(frames.latest(), Some(Duration::from_millis(18)));
        assert_eq!(
            frames.min_max(),
            (Duration::from_millis(16), Duration::from_millis(18))
        );
    }

    #[test]
    fn zero_capacity_holds_one_sample() {
        let mut buffer = RingBuffer::new(0);
        buffer.push(1u32);
        buffer.push(2u32);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.latest(), Some(2));
    }
}
