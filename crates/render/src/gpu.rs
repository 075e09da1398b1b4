//! wgpu glue: vertex buffer layouts, particle buffers, sample textures, the
//! uniform-block material and the render pipeline.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use ember_core::{pack_curve_range_z, CurveRange, SampleTable};
use ember_particles::RenderMode;
use glam::{Mat4, Vec3};
use thiserror::Error;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::layout::{VertexFormat, VertexLayout};
use crate::material::{
    Material, ShaderDefines, UniformHandle, UniformValue, CC_RENDER_MODE, CC_USE_WORLD_SPACE,
    UNIFORM_NAMES,
};
use crate::pool::{ParticlePool, Submission};

/// Failure while setting up GPU resources.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No adapter matched the request.
    #[error("failed to find a suitable GPU adapter")]
    NoAdapter,
    /// The adapter refused the device request.
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Create a device without a surface, for off-screen rendering and tools.
pub async fn request_headless_device() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ember device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await?;
    info!(adapter = ?adapter.get_info().name, "headless GPU device ready");
    Ok((device, queue))
}

/// wgpu format for a layout attribute.
pub fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Rgba32Float => wgpu::VertexFormat::Float32x4,
        VertexFormat::Rgb32Float => wgpu::VertexFormat::Float32x3,
        VertexFormat::R32Float => wgpu::VertexFormat::Float32,
        VertexFormat::Rgba8Unorm => wgpu::VertexFormat::Unorm8x4,
    }
}

/// Owned attribute list for [`wgpu::VertexBufferLayout`]. Shader locations
/// follow attribute order.
#[derive(Debug, Clone)]
pub struct GpuVertexLayout {
    array_stride: u64,
    attributes: Vec<wgpu::VertexAttribute>,
}

impl GpuVertexLayout {
    /// Convert a particle layout.
    pub fn new(layout: &VertexLayout) -> Self {
        let mut offset = 0;
        let attributes = layout
            .attributes()
            .iter()
            .enumerate()
            .map(|(location, attribute)| {
                let converted = wgpu::VertexAttribute {
                    format: vertex_format(attribute.format),
                    offset,
                    shader_location: location as u32,
                };
                offset += attribute.format.byte_size() as u64;
                converted
            })
            .collect();
        Self {
            array_stride: layout.byte_stride() as u64,
            attributes,
        }
    }

    /// Borrowed layout for pipeline creation.
    pub fn buffer_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Capacity-sized vertex and index buffers, created once per layout.
pub struct GpuParticleBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    generation: u64,
    index_count: u32,
}

impl GpuParticleBuffers {
    /// Allocate buffers large enough for the whole pool.
    pub fn new(device: &wgpu::Device, pool: &ParticlePool) -> Self {
        let submission = pool.submit();
        let vertex_size = std::mem::size_of_val(submission.buffer) as u64;
        let vertex = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Vertex Buffer"),
            size: vertex_size.max(4),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Index Buffer"),
            contents: bytemuck::cast_slice(submission.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        debug!(bytes = vertex_size, "particle buffers allocated");
        Self {
            vertex,
            index,
            generation: pool.generation(),
            index_count: 0,
        }
    }

    /// Whether `pool` rebuilt its buffers since these were created, after a
    /// render mode or mesh change.
    pub fn needs_rebuild(&self, pool: &ParticlePool) -> bool {
        pool.generation() != self.generation
    }

    /// Copy live records to the GPU.
    pub fn upload(&mut self, queue: &wgpu::Queue, submission: &Submission<'_>) {
        self.index_count = submission.index_count() as u32;
        let bytes = submission.live_vertex_bytes();
        if !bytes.is_empty() {
            queue.write_buffer(&self.vertex, 0, bytes);
        }
    }

    /// Record the draw. Does nothing with no live particles.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        if self.index_count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

impl Drop for GpuParticleBuffers {
    fn drop(&mut self) {
        self.vertex.destroy();
        self.index.destroy();
    }
}

/// Upload a sample table as an `Rgba32Float` texture.
pub fn upload_sample_table(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    table: &SampleTable,
    label: &str,
) -> wgpu::Texture {
    let (width, height) = (table.width(), table.height());
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let texels: &[u8] = bytemuck::cast_slice(table.texels());
    let row_bytes = width as usize * 16;
    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row_bytes = row_bytes.div_ceil(alignment) * alignment;
    let padded;
    let data = if padded_row_bytes == row_bytes {
        texels
    } else {
        let mut rows = vec![0u8; padded_row_bytes * height as usize];
        for row in 0..height as usize {
            rows[row * padded_row_bytes..row * padded_row_bytes + row_bytes]
                .copy_from_slice(&texels[row * row_bytes..(row + 1) * row_bytes]);
        }
        padded = rows;
        &padded[..]
    };

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(padded_row_bytes as u32),
            rows_per_image: Some(height),
        },
        size,
    );
    texture
}

/// Uniform block shared with `particles.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ParticleUniforms {
    view_proj: [[f32; 4]; 4],
    camera_right: [f32; 4],
    camera_up: [f32; 4],
    world_rot: [f32; 4],
    scale: [f32; 4],
    frame_tile_vel_len_scale: [f32; 4],
    ps_time: f32,
    delta: f32,
    render_mode: i32,
    features: u32,
    world_space: u32,
    size_mode: i32,
    color_mode: i32,
    force_mode: i32,
    velocity_mode: i32,
    rotation_mode: i32,
    texture_animation_mode: i32,
    force_space: i32,
    velocity_space: i32,
    _padding: [u32; 3],
}

impl Default for ParticleUniforms {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_right: [1.0, 0.0, 0.0, 0.0],
            camera_up: [0.0, 1.0, 0.0, 0.0],
            world_rot: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 4],
            frame_tile_vel_len_scale: [1.0, 1.0, 0.0, 0.0],
            ..Zeroable::zeroed()
        }
    }
}

const TEXTURE_SLOTS: usize = 6;
const FIRST_TEXTURE: usize = UNIFORM_NAMES.len() - TEXTURE_SLOTS;

/// [`Material`] backed by one uniform buffer and six sample textures.
///
/// wgpu pipelines cannot be specialized by preprocessor defines, so
/// "recompiling" writes the render mode and module feature bits into the
/// uniform block the shader branches on.
pub struct WgpuMaterial {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    uniforms: ParticleUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    uniform_group: wgpu::BindGroup,
    texture_group: wgpu::BindGroup,
    placeholder: wgpu::Texture,
    textures: [Option<wgpu::Texture>; TEXTURE_SLOTS],
    textures_dirty: bool,
}

impl WgpuMaterial {
    /// Create buffers, layouts and placeholder bindings.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let uniforms = ParticleUniforms::default();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_entries: Vec<_> = (0..TEXTURE_SLOTS as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Sample Texture Layout"),
            entries: &texture_entries,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let placeholder_table = pack_curve_range_z(1, &CurveRange::constant(0.0));
        let placeholder =
            upload_sample_table(&device, &queue, &placeholder_table, "Particle Placeholder Table");
        let textures: [Option<wgpu::Texture>; TEXTURE_SLOTS] = Default::default();
        let texture_group =
            Self::build_texture_group(&device, &texture_layout, &placeholder, &textures);

        Self {
            device,
            queue,
            uniforms,
            uniform_buffer,
            uniform_layout,
            texture_layout,
            uniform_group,
            texture_group,
            placeholder,
            textures,
            textures_dirty: false,
        }
    }

    fn build_texture_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        placeholder: &wgpu::Texture,
        textures: &[Option<wgpu::Texture>; TEXTURE_SLOTS],
    ) -> wgpu::BindGroup {
        let views: Vec<wgpu::TextureView> = textures
            .iter()
            .map(|texture| {
                texture
                    .as_ref()
                    .unwrap_or(placeholder)
                    .create_view(&wgpu::TextureViewDescriptor::default())
            })
            .collect();
        let entries: Vec<_> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Sample Texture Bind Group"),
            layout,
            entries: &entries,
        })
    }

    /// Camera state. For local-space systems `view_proj` must already include
    /// the node's world matrix.
    pub fn set_camera(&mut self, view_proj: Mat4, right: Vec3, up: Vec3) {
        self.uniforms.view_proj = view_proj.to_cols_array_2d();
        self.uniforms.camera_right = right.extend(0.0).to_array();
        self.uniforms.camera_up = up.extend(0.0).to_array();
    }

    /// Push pending uniform and texture changes. Call once per frame before drawing.
    pub fn flush(&mut self) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
        if self.textures_dirty {
            self.texture_group = Self::build_texture_group(
                &self.device,
                &self.texture_layout,
                &self.placeholder,
                &self.textures,
            );
            self.textures_dirty = false;
        }
    }

    /// Bind groups 0 (uniforms) and 1 (sample textures).
    pub fn bind<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_bind_group(0, &self.uniform_group, &[]);
        pass.set_bind_group(1, &self.texture_group, &[]);
    }

    /// Layouts for pipeline creation.
    pub fn bind_group_layouts(&self) -> [&wgpu::BindGroupLayout; 2] {
        [&self.uniform_layout, &self.texture_layout]
    }

    /// Uniform block as last written.
    pub fn uniforms(&self) -> &ParticleUniforms {
        &self.uniforms
    }
}

fn as_f32(name: &str, value: UniformValue) -> Option<f32> {
    match value {
        UniformValue::Float(v) => Some(v),
        other => {
            warn!(uniform = name, value = ?other, "expected a float uniform");
            None
        }
    }
}

fn as_i32(name: &str, value: UniformValue) -> Option<i32> {
    match value {
        UniformValue::Int(v) => Some(v),
        other => {
            warn!(uniform = name, value = ?other, "expected an int uniform");
            None
        }
    }
}

fn as_vec4(name: &str, value: UniformValue) -> Option<[f32; 4]> {
    match value {
        UniformValue::Vec4(v) => Some(v.to_array()),
        other => {
            warn!(uniform = name, value = ?other, "expected a vec4 uniform");
            None
        }
    }
}

impl Material for WgpuMaterial {
    fn uniform_handle(&self, name: &str) -> Option<UniformHandle> {
        UNIFORM_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| UniformHandle(index as u32))
    }

    fn set_uniform(&mut self, handle: UniformHandle, value: UniformValue) {
        let Some(&name) = UNIFORM_NAMES.get(handle.0 as usize) else {
            warn!(handle = handle.0, "unknown uniform handle");
            return;
        };
        let u = &mut self.uniforms;
        let slot: Option<&mut i32> = match name {
            "u_size_mode" => Some(&mut u.size_mode),
            "u_color_mode" => Some(&mut u.color_mode),
            "u_force_mode" => Some(&mut u.force_mode),
            "u_velocity_mode" => Some(&mut u.velocity_mode),
            "u_rotation_mode" => Some(&mut u.rotation_mode),
            "u_texture_animation_mode" => Some(&mut u.texture_animation_mode),
            "u_force_space" => Some(&mut u.force_space),
            "u_velocity_space" => Some(&mut u.velocity_space),
            _ => None,
        };
        if let Some(slot) = slot {
            if let Some(v) = as_i32(name, value) {
                *slot = v;
            }
            return;
        }
        match name {
            "u_psTime" => {
                if let Some(v) = as_f32(name, value) {
                    u.ps_time = v;
                }
            }
            "u_delta" => {
                if let Some(v) = as_f32(name, value) {
                    u.delta = v;
                }
            }
            "u_worldRot" => {
                if let Some(v) = as_vec4(name, value) {
                    u.world_rot = v;
                }
            }
            "scale" => {
                if let Some(v) = as_vec4(name, value) {
                    u.scale = v;
                }
            }
            "frameTile_velLenScale" => {
                if let Some(v) = as_vec4(name, value) {
                    u.frame_tile_vel_len_scale = v;
                }
            }
            _ => warn!(uniform = name, "uniform is a texture"),
        }
    }

    fn bind_texture(&mut self, handle: UniformHandle, table: &SampleTable) {
        let index = handle.0 as usize;
        let Some(slot) = index
            .checked_sub(FIRST_TEXTURE)
            .and_then(|slot| self.textures.get_mut(slot))
        else {
            warn!(handle = handle.0, "handle is not a texture");
            return;
        };
        let texture = upload_sample_table(&self.device, &self.queue, table, UNIFORM_NAMES[index]);
        if let Some(old) = slot.replace(texture) {
            old.destroy();
        }
        self.textures_dirty = true;
    }

    fn recompile_shaders(&mut self, defines: &ShaderDefines) {
        self.uniforms.features = defines.feature_bits();
        self.uniforms.render_mode = defines.int(CC_RENDER_MODE);
        self.uniforms.world_space = defines.is_enabled(CC_USE_WORLD_SPACE) as u32;
        debug!(features = self.uniforms.features, "particle shader features updated");
    }
}

impl Drop for WgpuMaterial {
    fn drop(&mut self) {
        for texture in self.textures.iter_mut().filter_map(Option::take) {
            texture.destroy();
        }
        self.placeholder.destroy();
        self.uniform_buffer.destroy();
    }
}

/// Render pipeline for one particle vertex layout.
pub struct ParticlePipeline {
    render_pipeline: wgpu::RenderPipeline,
    mode: RenderMode,
}

impl ParticlePipeline {
    /// Build the pipeline for `layout`; mesh layouts use the `vs_mesh` entry point.
    pub fn new(
        device: &wgpu::Device,
        material: &WgpuMaterial,
        layout: &VertexLayout,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particles.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &material.bind_group_layouts(),
            push_constant_ranges: &[],
        });
        let vertex_layout = GpuVertexLayout::new(layout);
        let entry_point = if layout.mode().is_mesh() {
            "vs_mesh"
        } else {
            "vs_billboard"
        };

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point,
                buffers: &[vertex_layout.buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });
        debug!(render_mode = ?layout.mode(), entry_point, "particle pipeline created");

        Self {
            render_pipeline,
            mode: layout.mode(),
        }
    }

    /// Render mode the pipeline was built for.
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Record a draw of every live particle.
    pub fn draw<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        material: &'a WgpuMaterial,
        buffers: &'a GpuParticleBuffers,
    ) {
        pass.set_pipeline(&self.render_pipeline);
        material.bind(pass);
        buffers.draw(pass);
    }
}
