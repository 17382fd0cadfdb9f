//! Bounded count of frame generations in flight
//!
//! The frame driver takes a permit before touching any per-frame state and
//! hands it to the GPU retire callback, which drops it once the batch has
//! been consumed. With `MAX_BUFFERS_IN_FLIGHT` permits the CPU can run at
//! most that many generations ahead of GPU retirement.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Shared {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counting semaphore shared by every uniform ring.
#[derive(Debug, Clone)]
pub struct InFlightSemaphore {
    shared: Arc<Shared>,
}

impl InFlightSemaphore {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                available: Mutex::new(capacity),
                released: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Blocks the calling thread until a permit is free.
    pub fn acquire(&self) -> FramePermit {
        let mut available = self.shared.lock();
        while *available == 0 {
            available = self
                .shared
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        self.permit()
    }

    /// Like `acquire`, giving up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<FramePermit> {
        let deadline = Instant::now() + timeout;
        let mut available = self.shared.lock();
        while *available == 0 {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .shared
                .released
                .wait_timeout(available, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            available = guard;
        }
        *available -= 1;
        Some(self.permit())
    }

    pub fn try_acquire(&self) -> Option<FramePermit> {
        self.acquire_timeout(Duration::ZERO)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn available(&self) -> usize {
        *self.shared.lock()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity() - self.available()
    }

    fn permit(&self) -> FramePermit {
        FramePermit {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// One in-flight frame generation. Dropping it releases the slot.
#[derive(Debug)]
#[must_use = "dropping a permit immediately releases its frame slot"]
pub struct FramePermit {
    shared: Arc<Shared>,
}

impl FramePermit {
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FramePermit {
    fn drop(&mut self) {
        let mut available = self.shared.lock();
        debug_assert!(*available < self.shared.capacity);
        *available += 1;
        drop(available);
        self.shared.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn counts_permits() {
        let sem = InFlightSemaphore::new(3);
        let a = sem.acquire();
        let b = sem.acquire();
        assert_eq!(sem.in_flight(), 2);
        assert_eq!(sem.available(), 1);

        a.release();
        drop(b);
        assert_eq!(sem.in_flight(), 0);
        assert_eq!(sem.available(), 3);
    }

    #[test]
    fn try_acquire_fails_when_exhausted() {
        let sem = InFlightSemaphore::new(3);
        let _held: Vec<_> = (0..3).map(|_| sem.acquire()).collect();
        assert!(sem.try_acquire().is_none());
        assert!(sem.acquire_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn fourth_acquire_blocks_until_release() {
        let sem = InFlightSemaphore::new(3);
        let mut held: Vec<_> = (0..3).map(|_| sem.acquire()).collect();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || {
                let permit = sem.acquire();
                tx.send(()).unwrap();
                drop(permit);
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(sem.in_flight(), 3);

        held.pop().unwrap().release();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter should wake after a release");
        waiter.join().unwrap();
    }

    #[test]
    fn never_more_than_capacity_outstanding() {
        let sem = InFlightSemaphore::new(3);
        let outstanding = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<FramePermit>();

        // Plays the GPU: retires each permit a little later.
        let retirer = {
            let outstanding = Arc::clone(&outstanding);
            thread::spawn(move || {
                for permit in rx {
                    thread::sleep(Duration::from_millis(2));
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                }
            })
        };

        for _ in 0..50 {
            let permit = sem.acquire();
            let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tx.send(permit).unwrap();
        }
        drop(tx);
        retirer.join().unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak outstanding {peak}");
        assert_eq!(outstanding.load(Ordering::SeqCst), 0);
        assert_eq!(sem.in_flight(), 0);
    }
}
