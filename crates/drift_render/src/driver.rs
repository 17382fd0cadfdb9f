//! Frame driver
//!
//! Runs one frame generation per call to `render_frame`:
//! throttle on the in-flight semaphore, advance the simulation into each
//! plane's next uniform slot, record the draws, submit with a retire callback
//! that releases the permit, then present if a drawable exists.

use std::time::{Duration, Instant};

use drift_core::math::{
    look_at, perspective, radians_from_degrees, translation, DeterministicRng, Mat4, Vec3,
};
use drift_core::plane::{MotionParams, Plane, QUAD_VERTEX_COUNT};
use drift_core::time::SimulationClock;
use drift_metrics::PhaseProfiler;
use tracing::{debug, info, trace, warn};

use crate::gpu::{BufferHandle, BufferUsage, CommandBatch, GpuDevice, RenderCommand};
use crate::in_flight::FramePermit;
use crate::ring::UniformPool;
use crate::uniforms::Uniforms;
use crate::RenderError;

/// Longest single wait on the semaphore before the device is polled again.
const THROTTLE_SLICE: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn view_matrix(&self) -> Result<Mat4, RenderError> {
        Ok(look_at(self.eye, self.target, self.up)?)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 8.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub plane_count: usize,
    /// Uniform scale applied to every plane's unit quad.
    pub plane_scale: f32,
    pub alpha: f32,
    pub motion: MotionParams,
    pub seed: u64,
    pub camera: Camera,
    pub fovy_degrees: f32,
    pub near_z: f32,
    pub far_z: f32,
    pub light_position: Vec3,
    pub acquire_timeout: Duration,
    /// Drawable size at startup, in physical pixels.
    pub initial_size: (u32, u32),
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            plane_count: 33,
            plane_scale: 2.0,
            alpha: 1.0,
            motion: MotionParams::default(),
            seed: 0,
            camera: Camera::default(),
            fovy_degrees: 65.0,
            near_z: 0.1,
            far_z: 100.0,
            light_position: Vec3::X,
            acquire_timeout: Duration::from_secs(1),
            initial_size: (1280, 720),
        }
    }
}

/// Outcome of one `render_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub generation: u64,
    /// Simulation steps taken so far, including this frame.
    pub steps: u64,
    pub draws: usize,
    pub submitted: bool,
    pub presented: bool,
}

#[derive(Debug, Clone, Copy)]
struct PlaneMesh {
    vertices: BufferHandle,
    tex_coords: BufferHandle,
}

pub struct FrameDriver<D: GpuDevice> {
    device: D,
    planes: Vec<Plane>,
    meshes: Vec<PlaneMesh>,
    pool: UniformPool,
    camera: Camera,
    view: Mat4,
    projection: Mat4,
    fovy: f32,
    near_z: f32,
    far_z: f32,
    light_position: Vec3,
    acquire_timeout: Duration,
    generation: u64,
    clock: SimulationClock,
    profiler: PhaseProfiler,
}

impl<D: GpuDevice> FrameDriver<D> {
    /// Spawns the planes and allocates every buffer up front. Any failure
    /// here is fatal for the renderer.
    pub fn new(mut device: D, config: DriverConfig) -> Result<Self, RenderError> {
        let view = config.camera.view_matrix()?;
        let fovy = radians_from_degrees(config.fovy_degrees);
        let (width, height) = config.initial_size;
        let aspect = if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        let projection = perspective(fovy, aspect, config.near_z, config.far_z)?;

        let mut rng = DeterministicRng::new(config.seed);
        let scale = Vec3::splat(config.plane_scale);
        let planes: Vec<Plane> = (0..config.plane_count)
            .map(|_| Plane::new(&config.motion, scale, config.alpha, &mut rng))
            .collect();

        let meshes = planes
            .iter()
            .map(|plane| {
                Ok(PlaneMesh {
                    vertices: device.create_buffer_init(
                        "plane vertices",
                        BufferUsage::Vertex,
                        bytemuck::cast_slice(plane.vertices()),
                    )?,
                    tex_coords: device.create_buffer_init(
                        "plane tex coords",
                        BufferUsage::Vertex,
                        bytemuck::cast_slice(plane.tex_coords()),
                    )?,
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        let pool = UniformPool::allocate(&mut device, planes.len())?;

        info!(planes = planes.len(), seed = config.seed, "frame driver ready");

        Ok(Self {
            device,
            planes,
            meshes,
            pool,
            camera: config.camera,
            view,
            projection,
            fovy,
            near_z: config.near_z,
            far_z: config.far_z,
            light_position: config.light_position,
            acquire_timeout: config.acquire_timeout,
            generation: 0,
            clock: SimulationClock::new(),
            profiler: PhaseProfiler::new(),
        })
    }

    pub fn render_frame(&mut self) -> Result<FrameReport, RenderError> {
        let permit = self.throttle()?;

        self.generation += 1;
        let generation = self.generation;
        let batch = self.device.begin_frame(generation);

        let started = Instant::now();
        self.advance();
        self.profiler.add("advance", started.elapsed());

        let Some(mut batch) = batch else {
            // Nothing will retire this generation, so give the slot back now.
            permit.release();
            debug!(generation, "no command batch, frame skipped");
            return Ok(FrameReport {
                generation,
                steps: self.clock.steps(),
                draws: 0,
                submitted: false,
                presented: false,
            });
        };

        let started = Instant::now();
        self.encode(&mut batch);
        let draws = batch.draw_count();
        self.profiler.add("encode", started.elapsed());

        let started = Instant::now();
        self.device.submit(batch, retire_handler(permit));
        let presented = self.device.present();
        self.profiler.add("submit", started.elapsed());

        if !presented {
            debug!(generation, "no drawable, frame not presented");
        }

        Ok(FrameReport {
            generation,
            steps: self.clock.steps(),
            draws,
            submitted: true,
            presented,
        })
    }

    /// Rebuilds the projection for a new drawable size. A zero dimension
    /// keeps the previous projection.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
        if width == 0 || height == 0 {
            debug!(width, height, "ignoring degenerate resize");
            return;
        }

        let aspect = width as f32 / height as f32;
        match perspective(self.fovy, aspect, self.near_z, self.far_z) {
            Ok(projection) => {
                self.projection = projection;
                debug!(width, height, aspect, "projection rebuilt");
            }
            Err(err) => warn!(%err, "keeping previous projection"),
        }
    }

    /// Replaces the camera if it yields a valid view basis.
    pub fn set_camera(&mut self, camera: Camera) -> Result<(), RenderError> {
        self.view = camera.view_matrix()?;
        self.camera = camera;
        Ok(())
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Geometry edits made through this reference are uploaded next frame.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut Plane> {
        self.planes.get_mut(index)
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn simulation(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn pool(&self) -> &UniformPool {
        &self.pool
    }

    pub fn in_flight(&self) -> usize {
        self.pool.semaphore().in_flight()
    }

    pub fn profiler(&self) -> &PhaseProfiler {
        &self.profiler
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Waits for a free generation, polling the device between short waits
    /// so backends that deliver retirement on poll can make progress.
    fn throttle(&mut self) -> Result<FramePermit, RenderError> {
        let started = Instant::now();
        loop {
            self.device.maintain();

            let remaining = self.acquire_timeout.saturating_sub(started.elapsed());
            if let Some(permit) = self
                .pool
                .acquire_frame_timeout(remaining.min(THROTTLE_SLICE))
            {
                self.profiler.add("throttle", started.elapsed());
                return Ok(permit);
            }

            let waited = started.elapsed();
            if waited >= self.acquire_timeout {
                warn!(?waited, in_flight = self.in_flight(), "GPU stalled");
                return Err(RenderError::Timeout { waited });
            }
        }
    }

    fn advance(&mut self) {
        self.pool.advance_all();

        for (plane, (ring, mesh)) in self
            .planes
            .iter_mut()
            .zip(self.pool.rings().iter().zip(&self.meshes))
        {
            plane.step();

            let position = plane.position();
            let model_view = self.view * translation(position.x, position.y, 0.0);
            let uniforms = Uniforms::new(self.projection, model_view, self.light_position);
            self.device.write_buffer(
                ring.buffer(),
                ring.current_offset(),
                bytemuck::bytes_of(&uniforms),
            );

            if plane.take_geometry_dirty() {
                self.device
                    .write_buffer(mesh.vertices, 0, bytemuck::cast_slice(plane.vertices()));
            }
        }

        self.clock.advance();
    }

    fn encode(&self, batch: &mut CommandBatch) {
        batch.push(RenderCommand::SetPipeline);
        batch.push(RenderCommand::SetDepthState);

        for (ring, mesh) in self.pool.rings().iter().zip(&self.meshes) {
            batch.push(RenderCommand::BindUniforms {
                buffer: ring.buffer(),
                offset: ring.current_offset(),
            });
            batch.push(RenderCommand::BindVertices {
                buffer: mesh.vertices,
            });
            batch.push(RenderCommand::BindTexCoords {
                buffer: mesh.tex_coords,
            });
            batch.push(RenderCommand::Draw {
                vertex_start: 0,
                vertex_count: QUAD_VERTEX_COUNT as u32,
            });
        }
    }
}

fn retire_handler(permit: FramePermit) -> crate::gpu::RetireHandler {
    Box::new(move |generation| {
        trace!(generation, "frame retired");
        permit.release();
    })
}
