//! GPU collaborator contract
//!
//! The frame driver never talks to a graphics API directly. It allocates
//! buffers, writes uniform data and records a `CommandBatch` through this
//! trait; `backend::WgpuDevice` is the production implementation.

use crate::RenderError;

/// Opaque reference to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-vertex or per-texcoord stream.
    Vertex,
    /// Uniform ring bound with a dynamic offset.
    Uniform,
}

/// Backend-neutral draw recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    SetPipeline,
    /// Depth compare `Less` with depth writes disabled.
    SetDepthState,
    BindUniforms { buffer: BufferHandle, offset: u64 },
    BindVertices { buffer: BufferHandle },
    BindTexCoords { buffer: BufferHandle },
    /// Triangle strip draw.
    Draw { vertex_start: u32, vertex_count: u32 },
}

/// Commands for one frame generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBatch {
    generation: u64,
    commands: Vec<RenderCommand>,
}

impl CommandBatch {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            commands: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Draw { .. }))
            .count()
    }
}

/// Invoked once with the batch generation after the GPU retires it.
pub type RetireHandler = Box<dyn FnOnce(u64) + Send + 'static>;

pub trait GpuDevice {
    fn create_buffer_init(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<BufferHandle, RenderError>;

    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferHandle, RenderError>;

    /// Queue-ordered write; takes effect before any later submission reads it.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Returns `None` when there is nothing to render into this tick.
    fn begin_frame(&mut self, generation: u64) -> Option<CommandBatch>;

    /// `on_retired` must run exactly once, possibly on another thread.
    fn submit(&mut self, batch: CommandBatch, on_retired: RetireHandler);

    /// Presents the drawable acquired by the last `submit`, if any.
    fn present(&mut self) -> bool;

    /// Gives the backend a chance to deliver pending retire notifications.
    fn maintain(&mut self) {}

    fn resize(&mut self, _width: u32, _height: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_counts_draws() {
        let buffer = BufferHandle::new(4);
        let mut batch = CommandBatch::new(9);
        batch.push(RenderCommand::SetPipeline);
        batch.push(RenderCommand::BindVertices { buffer });
        batch.push(RenderCommand::Draw {
            vertex_start: 0,
            vertex_count: 4,
        });
        assert_eq!(batch.generation(), 9);
        assert_eq!(batch.commands().len(), 3);
        assert_eq!(batch.draw_count(), 1);
        assert_eq!(buffer.index(), 4);
    }
}
