//! Per-object uniform rings
//!
//! Every plane owns one buffer holding `MAX_BUFFERS_IN_FLIGHT` uniform slots
//! and its own rotating index. The ring index alone does not make reuse
//! safe; the shared `InFlightSemaphore` guarantees the slot being written is
//! not one the GPU is still reading.

use std::time::Duration;

use crate::gpu::{BufferHandle, BufferUsage, GpuDevice};
use crate::in_flight::{FramePermit, InFlightSemaphore};
use crate::uniforms::ALIGNED_UNIFORMS_SIZE;
use crate::RenderError;

pub const MAX_BUFFERS_IN_FLIGHT: usize = 3;

#[derive(Debug, Clone)]
pub struct FrameSlotRing {
    buffer: BufferHandle,
    index: usize,
    slots: usize,
}

impl FrameSlotRing {
    pub fn new(buffer: BufferHandle, slots: usize) -> Self {
        Self {
            buffer,
            index: 0,
            slots: slots.max(1),
        }
    }

    /// Bytes needed to back a ring of `slots` slots.
    pub fn byte_len(slots: usize) -> u64 {
        (ALIGNED_UNIFORMS_SIZE * slots) as u64
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves to the next slot and returns its index.
    pub fn advance(&mut self) -> usize {
        self.index = (self.index + 1) % self.slots;
        self.index
    }

    pub fn current_offset(&self) -> u64 {
        (self.index * ALIGNED_UNIFORMS_SIZE) as u64
    }
}

/// The rings of every plane plus the semaphore bounding frames in flight.
#[derive(Debug)]
pub struct UniformPool {
    rings: Vec<FrameSlotRing>,
    semaphore: InFlightSemaphore,
}

impl UniformPool {
    /// Allocates one ring per object.
    pub fn allocate<D: GpuDevice>(device: &mut D, objects: usize) -> Result<Self, RenderError> {
        let size = FrameSlotRing::byte_len(MAX_BUFFERS_IN_FLIGHT);
        let rings = (0..objects)
            .map(|_| {
                device
                    .create_buffer("uniform ring", BufferUsage::Uniform, size)
                    .map(|buffer| FrameSlotRing::new(buffer, MAX_BUFFERS_IN_FLIGHT))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rings,
            semaphore: InFlightSemaphore::new(MAX_BUFFERS_IN_FLIGHT),
        })
    }

    pub fn semaphore(&self) -> &InFlightSemaphore {
        &self.semaphore
    }

    /// Blocks until a frame generation may start.
    pub fn acquire_frame(&self) -> FramePermit {
        self.semaphore.acquire()
    }

    pub fn acquire_frame_timeout(&self, timeout: Duration) -> Option<FramePermit> {
        self.semaphore.acquire_timeout(timeout)
    }

    /// Rotates every ring to its next slot.
    pub fn advance_all(&mut self) {
        for ring in &mut self.rings {
            ring.advance();
        }
    }

    pub fn current_offset(&self, object: usize) -> Option<u64> {
        self.rings.get(object).map(FrameSlotRing::current_offset)
    }

    pub fn ring(&self, object: usize) -> Option<&FrameSlotRing> {
        self.rings.get(object)
    }

    pub fn rings(&self) -> &[FrameSlotRing] {
        &self.rings
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_rotates_through_every_slot() {
        let mut ring = FrameSlotRing::new(BufferHandle::new(0), MAX_BUFFERS_IN_FLIGHT);
        assert_eq!(ring.current_offset(), 0);

        let offsets: Vec<u64> = (0..6)
            .map(|_| {
                ring.advance();
                ring.current_offset()
            })
            .collect();
        assert_eq!(offsets, [256, 512, 0, 256, 512, 0]);
    }

    #[test]
    fn ring_backing_size_covers_all_slots() {
        assert_eq!(FrameSlotRing::byte_len(MAX_BUFFERS_IN_FLIGHT), 768);
    }

    #[test]
    fn rings_advance_independently() {
        let mut a = FrameSlotRing::new(BufferHandle::new(0), 3);
        let b = FrameSlotRing::new(BufferHandle::new(1), 3);
        a.advance();
        assert_eq!(a.index(), 1);
        assert_eq!(b.index(), 0);
    }
}
