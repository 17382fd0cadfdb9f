//! wgpu backend
//!
//! Production `GpuDevice`: one surface, one pipeline (triangle strips with
//! additive blending and read-only depth) and a flat table of buffers
//! addressed by `BufferHandle`.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use drift_core::plane::Vertex;

use crate::gpu::{BufferHandle, BufferUsage, CommandBatch, GpuDevice, RenderCommand, RetireHandler};
use crate::uniforms::{UNIFORMS_SIZE, UNIFORM_ALIGNMENT};
use crate::RenderError;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// `src * src.alpha + dst`
const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    depth_view: wgpu::TextureView,
    buffers: Vec<wgpu::Buffer>,
    bind_groups: HashMap<BufferHandle, wgpu::BindGroup>,
    drawable: Option<wgpu::SurfaceTexture>,
    /// Last requested size; zero in either dimension means minimized.
    size: (u32, u32),
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::Initialization(format!("surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Initialization("no compatible adapter".to_string()))?;

        let info = adapter.get_info();
        info!(adapter = %info.name, backend = ?info.backend, "adapter selected");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("drift device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Initialization(format!("device: {e}")))?;

        let alignment = device.limits().min_uniform_buffer_offset_alignment.max(1) as usize;
        if alignment > UNIFORM_ALIGNMENT || UNIFORM_ALIGNMENT % alignment != 0 {
            return Err(RenderError::Initialization(format!(
                "uniform offset alignment {alignment} incompatible with {UNIFORM_ALIGNMENT}-byte slots"
            )));
        }

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Initialization("surface has no formats".to_string()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("plane uniforms layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORMS_SIZE as u64),
                },
                count: None,
            }],
        });

        let pipeline = create_pipeline(&device, &uniform_layout, config.format)?;
        let depth_view = create_depth_view(&device, config.width, config.height);

        info!(
            format = ?config.format,
            width = config.width,
            height = config.height,
            "surface configured"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            uniform_layout,
            depth_view,
            buffers: Vec::new(),
            bind_groups: HashMap::new(),
            drawable: None,
            size: (size.width, size.height),
        })
    }

    /// Runs `create` inside validation and out-of-memory error scopes.
    fn allocate(
        &mut self,
        label: &str,
        usage: BufferUsage,
        size: u64,
        create: impl FnOnce(&wgpu::Device) -> wgpu::Buffer,
    ) -> Result<BufferHandle, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = validation.or(out_of_memory) {
            return Err(RenderError::Allocation {
                label: label.to_string(),
                size,
                reason: err.to_string(),
            });
        }

        let handle = BufferHandle::new(self.buffers.len() as u32);
        if usage == BufferUsage::Uniform {
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: NonZeroU64::new(UNIFORMS_SIZE as u64),
                    }),
                }],
            });
            self.bind_groups.insert(handle, bind_group);
        }
        self.buffers.push(buffer);

        debug!(label, size, ?usage, handle = handle.index(), "buffer allocated");
        Ok(handle)
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, self.config.width, self.config.height);
    }

    fn acquire_drawable(&mut self) -> Option<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated, reconfiguring");
                self.reconfigure();
                self.surface.get_current_texture().ok()
            }
            Err(err) => {
                warn!(%err, "no drawable this frame");
                None
            }
        }
    }

    fn encode(&self, batch: &CommandBatch, target: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("plane encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("plane pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for command in batch.commands() {
                match *command {
                    RenderCommand::SetPipeline => pass.set_pipeline(&self.pipeline),
                    // Baked into the pipeline.
                    RenderCommand::SetDepthState => {}
                    RenderCommand::BindUniforms { buffer, offset } => {
                        if let Some(bind_group) = self.bind_groups.get(&buffer) {
                            pass.set_bind_group(0, bind_group, &[offset as u32]);
                        }
                    }
                    RenderCommand::BindVertices { buffer } => {
                        if let Some(buffer) = self.buffers.get(buffer.index()) {
                            pass.set_vertex_buffer(0, buffer.slice(..));
                        }
                    }
                    RenderCommand::BindTexCoords { buffer } => {
                        if let Some(buffer) = self.buffers.get(buffer.index()) {
                            pass.set_vertex_buffer(1, buffer.slice(..));
                        }
                    }
                    RenderCommand::Draw {
                        vertex_start,
                        vertex_count,
                    } => pass.draw(vertex_start..vertex_start + vertex_count, 0..1),
                }
            }
        }

        encoder.finish()
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer_init(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<BufferHandle, RenderError> {
        self.allocate(label, usage, contents.len() as u64, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: buffer_usages(usage),
            })
        })
    }

    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferHandle, RenderError> {
        self.allocate(label, usage, size, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: buffer_usages(usage),
                mapped_at_creation: false,
            })
        })
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(buffer.index()) {
            Some(target) => self.queue.write_buffer(target, offset, data),
            None => warn!(handle = buffer.index(), "write to unknown buffer"),
        }
    }

    fn begin_frame(&mut self, generation: u64) -> Option<CommandBatch> {
        let (width, height) = self.size;
        (width > 0 && height > 0).then(|| CommandBatch::new(generation))
    }

    fn submit(&mut self, batch: CommandBatch, on_retired: RetireHandler) {
        let generation = batch.generation();

        let mut commands = None;
        if let Some(frame) = self.acquire_drawable() {
            let view = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            commands = Some(self.encode(&batch, &view));
            self.drawable = Some(frame);
        }

        // Submitting even without a drawable flushes the uniform writes and
        // gives the retire callback something to wait on.
        self.queue.submit(commands);
        self.queue
            .on_submitted_work_done(move || on_retired(generation));
    }

    fn present(&mut self) -> bool {
        match self.drawable.take() {
            Some(frame) => {
                frame.present();
                true
            }
            None => false,
        }
    }

    fn maintain(&mut self) {
        let _ = self.device.poll(wgpu::Maintain::Poll);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
    }
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Builds the plane pipeline inside a validation scope, so a bad shader or
/// descriptor surfaces as an error instead of reaching the uncaptured handler.
fn create_pipeline(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = build_pipeline(device, uniform_layout, format);
    scope_result("pipeline", pollster::block_on(device.pop_error_scope()))?;
    Ok(pipeline)
}

fn scope_result(stage: &str, error: Option<wgpu::Error>) -> Result<(), RenderError> {
    match error {
        Some(err) => Err(RenderError::Initialization(format!("{stage}: {err}"))),
        None => Ok(()),
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("plane shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/plane.wgsl").into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("plane pipeline layout"),
        bind_group_layouts: &[uniform_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("plane pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x4,
                        1 => Float32x4,
                        2 => Float32x3
                    ],
                },
                wgpu::VertexBufferLayout {
                    array_stride: (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![3 => Float32x2],
                },
            ],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(ADDITIVE_BLEND),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_plane_vertex() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        assert_eq!(std::mem::offset_of!(Vertex, color), 16);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 32);
    }

    #[test]
    fn usages_allow_queue_writes() {
        for usage in [BufferUsage::Vertex, BufferUsage::Uniform] {
            assert!(buffer_usages(usage).contains(wgpu::BufferUsages::COPY_DST));
        }
        assert!(buffer_usages(BufferUsage::Uniform).contains(wgpu::BufferUsages::UNIFORM));
    }

    #[test]
    fn captured_validation_error_fails_initialization() {
        assert!(scope_result("pipeline", None).is_ok());

        let err = scope_result(
            "pipeline",
            Some(wgpu::Error::Validation {
                source: Box::new(std::fmt::Error),
                description: "entry point vs_main not found".to_string(),
            }),
        )
        .unwrap_err();
        match err {
            RenderError::Initialization(message) => {
                assert!(message.starts_with("pipeline: "));
                assert!(message.contains("vs_main"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blend_is_additive_over_source_alpha() {
        assert_eq!(ADDITIVE_BLEND.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(ADDITIVE_BLEND.color.dst_factor, wgpu::BlendFactor::One);
    }
}
