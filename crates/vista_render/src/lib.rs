//! Vista Render - wgpu implementation of `vista_core::RenderTarget`.
//!
//! One lit pipeline for models and one blended, depth-read-only pipeline for
//! translucent draws such as the reticle. Mesh buffers are uploaded on first
//! use and cached by `Arc<Mesh>` identity; per-draw data goes through a single
//! uniform buffer bound with dynamic offsets.

mod draw;
mod overlay;

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Result;
use vista_core::{Mesh, RenderError, RenderTarget, Scene};
use vista_math::Camera;
use wgpu::util::DeviceExt;
use wgpu::{Device, Instance, Queue, Surface, SurfaceConfiguration};

pub use draw::{collect_draws, DrawItem, DrawUniform, FrameUniform, Vertex};
pub use overlay::Overlay;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Clear colour outside AR
const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.2,
    b: 0.3,
    a: 1.0,
};

struct GpuMesh {
    // Held so the pointer key stays unique while cached
    _mesh: Arc<Mesh>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Core renderer managing wgpu state
pub struct Renderer {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    size: (u32, u32),
    opaque_pipeline: wgpu::RenderPipeline,
    blended_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: usize,
    draw_stride: u64,
    meshes: HashMap<usize, GpuMesh>,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    overlay: Overlay,
}

impl Renderer {
    /// Create a new renderer for the given window
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self> {
        let size = window.inner_size();
        let size = (size.width.max(1), size.height.max(1));

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Vista Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no formats"))?;

        // Prefer a compositing alpha mode so a transparent clear shows the camera feed
        let alpha_mode = [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]
        .into_iter()
        .find(|mode| surface_caps.alpha_modes.contains(mode))
        .or_else(|| surface_caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0,
            height: size.1,
            present_mode: wgpu::PresentMode::Fifo, // VSync
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Surface {:?} {}x{} alpha {:?}", surface_format, size.0, size.1, alpha_mode);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<DrawUniform>() as u64),
                },
                count: None,
            }],
        });

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let draw_stride = (std::mem::size_of::<DrawUniform>() as u64).div_ceil(alignment) * alignment;
        let draw_capacity = 16;
        let (draw_buffer, draw_bind_group) =
            Self::create_draw_buffer(&device, &draw_layout, draw_stride, draw_capacity);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let format = config.format;
        let opaque_pipeline = Self::create_pipeline(&device, &pipeline_layout, &shader, format, true);
        let blended_pipeline = Self::create_pipeline(&device, &pipeline_layout, &shader, format, false);

        let (depth_texture, depth_view) = Self::create_depth_texture(&device, size);
        let overlay = Overlay::new(&device, config.format, &window);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            opaque_pipeline,
            blended_pipeline,
            frame_buffer,
            frame_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_capacity,
            draw_stride,
            meshes: HashMap::new(),
            depth_texture,
            depth_view,
            overlay,
        })
    }

    /// Create a depth texture for the given size
    fn create_depth_texture(device: &Device, size: (u32, u32)) -> (wgpu::Texture, wgpu::TextureView) {
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        (depth_texture, depth_view)
    }

    fn create_draw_buffer(
        device: &Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniform Buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });

        (buffer, bind_group)
    }

    /// `depth_write` off gives the blended pipeline for translucent draws.
    fn create_pipeline(
        device: &Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        depth_write: bool,
    ) -> wgpu::RenderPipeline {
        let (label, blend) = if depth_write {
            ("Opaque Pipeline", wgpu::BlendState::REPLACE)
        } else {
            ("Blended Pipeline", wgpu::BlendState::ALPHA_BLENDING)
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // Two-sided
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
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

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    /// Number of meshes with GPU buffers.
    pub fn cached_meshes(&self) -> usize {
        self.meshes.len()
    }

    fn upload_meshes(&mut self, draws: &[DrawItem]) {
        for item in draws {
            let key = draw::mesh_key(&item.mesh);
            if self.meshes.contains_key(&key) {
                continue;
            }

            let vertices = Vertex::from_mesh(&item.mesh);
            let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&item.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

            log::debug!(
                "Uploaded mesh: {} vertices, {} triangles",
                vertices.len(),
                item.mesh.triangle_count()
            );
            self.meshes.insert(
                key,
                GpuMesh {
                    _mesh: item.mesh.clone(),
                    vertex_buffer,
                    index_buffer,
                    index_count: item.mesh.indices.len() as u32,
                },
            );
        }
    }

    /// Drop buffers for meshes no longer in the scene.
    fn prune_meshes(&mut self, draws: &[DrawItem]) {
        let live: HashSet<usize> = draws.iter().map(|item| draw::mesh_key(&item.mesh)).collect();
        self.meshes.retain(|key, _| live.contains(key));
    }

    fn write_draw_uniforms(&mut self, draws: &[DrawItem]) {
        if draws.len() > self.draw_capacity {
            self.draw_capacity = draws.len().next_power_of_two();
            let (buffer, bind_group) = Self::create_draw_buffer(
                &self.device,
                &self.draw_layout,
                self.draw_stride,
                self.draw_capacity,
            );
            self.draw_buffer = buffer;
            self.draw_bind_group = bind_group;
            log::debug!("Draw uniform buffer grown to {} slots", self.draw_capacity);
        }

        if draws.is_empty() {
            return;
        }
        let stride = self.draw_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len()];
        for (i, item) in draws.iter().enumerate() {
            let uniform = item.uniform();
            let data = bytemuck::bytes_of(&uniform);
            bytes[i * stride..i * stride + data.len()].copy_from_slice(data);
        }
        self.queue.write_buffer(&self.draw_buffer, 0, &bytes);
    }
}

impl RenderTarget for Renderer {
    /// Handle window resize
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);

            // Recreate depth texture with new size
            let (depth_texture, depth_view) = Self::create_depth_texture(&self.device, self.size);
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
        }
    }

    fn render(&mut self, scene: &Scene, camera: &Camera, passthrough: bool) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => return Err(RenderError::Other(err.to_string())),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let draws = collect_draws(scene);
        self.upload_meshes(&draws);
        self.write_draw_uniforms(&draws);

        let frame = FrameUniform::new(camera, &scene.lights);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame]));

        let clear_color = if passthrough {
            wgpu::Color::TRANSPARENT
        } else {
            BACKGROUND
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
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
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            let mut blended = None;
            for (i, item) in draws.iter().enumerate() {
                let Some(gpu) = self.meshes.get(&draw::mesh_key(&item.mesh)) else {
                    continue;
                };

                let transparent = item.is_transparent();
                if blended != Some(transparent) {
                    let pipeline = if transparent {
                        &self.blended_pipeline
                    } else {
                        &self.opaque_pipeline
                    };
                    render_pass.set_pipeline(pipeline);
                    blended = Some(transparent);
                }

                let offset = (i as u64 * self.draw_stride) as u32;
                render_pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
                render_pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                render_pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..gpu.index_count, 0, 0..1);
            }
        }

        self.overlay.paint(&self.device, &self.queue, &mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.prune_meshes(&draws);
        Ok(())
    }
}
