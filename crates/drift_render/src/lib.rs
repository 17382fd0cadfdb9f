//! Drift Render
//!
//! Frame pacing and drawing for the bouncing planes: per-object uniform
//! rings, the in-flight semaphore that makes reusing them safe, and the
//! frame driver that ties the simulation to a `GpuDevice`.

pub mod backend;
pub mod driver;
pub mod error;
pub mod gpu;
pub mod in_flight;
pub mod ring;
pub mod uniforms;
pub mod window;

pub use backend::WgpuDevice;
pub use driver::{Camera, DriverConfig, FrameDriver, FrameReport};
pub use error::RenderError;
pub use gpu::{BufferHandle, BufferUsage, CommandBatch, GpuDevice, RenderCommand};
pub use in_flight::{FramePermit, InFlightSemaphore};
pub use ring::{FrameSlotRing, UniformPool, MAX_BUFFERS_IN_FLIGHT};

pub use wgpu;
pub use winit;
