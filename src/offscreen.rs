//! Off-screen GPU rendering of a particle system, for `--gpu` runs.

use anyhow::{Context, Result};
use ember_render::{
    request_headless_device, GpuParticleBuffers, ParticlePipeline, ParticleSystem, WgpuMaterial,
};
use glam::{Mat4, Vec3};
use std::sync::Arc;
use tracing::debug;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct OffscreenTarget {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color: wgpu::Texture,
    depth: wgpu::Texture,
    pipeline: Option<ParticlePipeline>,
    buffers: Option<GpuParticleBuffers>,
    frames: u64,
}

impl OffscreenTarget {
    /// Request a device and create `width x height` color and depth targets.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (device, queue) =
            pollster::block_on(request_headless_device()).context("GPU unavailable")?;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = |label, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        };
        let color = target("Particle Color Target", COLOR_FORMAT);
        let depth = target("Particle Depth Target", DEPTH_FORMAT);
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            color,
            depth,
            pipeline: None,
            buffers: None,
            frames: 0,
        })
    }

    /// Material bound to this target's device.
    pub fn material(&self) -> WgpuMaterial {
        WgpuMaterial::new(Arc::clone(&self.device), Arc::clone(&self.queue))
    }

    /// Point the camera at `target` from `eye`.
    pub fn look_at(system: &mut ParticleSystem<WgpuMaterial>, eye: Vec3, target: Vec3, aspect: f32) {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 200.0);
        let inverse = view.inverse();
        let right = inverse.x_axis.truncate();
        let up = inverse.y_axis.truncate();
        system
            .renderer_mut()
            .material_mut()
            .set_camera(proj * view, right, up);
    }

    /// Upload the latest submission and draw it.
    pub fn render(&mut self, system: &mut ParticleSystem<WgpuMaterial>) {
        let layout = system.submit().layout.clone();
        if self
            .pipeline
            .as_ref()
            .map_or(true, |pipeline| pipeline.mode() != layout.mode())
        {
            self.pipeline = Some(ParticlePipeline::new(
                &self.device,
                system.renderer().material(),
                &layout,
                COLOR_FORMAT,
                Some(DEPTH_FORMAT),
            ));
        }
        let pool = system.renderer().pool();
        if self
            .buffers
            .as_ref()
            .map_or(true, |buffers| buffers.needs_rebuild(pool))
        {
            self.buffers = Some(GpuParticleBuffers::new(&self.device, pool));
        }

        system.renderer_mut().material_mut().flush();
        let (Some(pipeline), Some(buffers)) = (self.pipeline.as_ref(), self.buffers.as_mut()) else {
            return;
        };
        buffers.upload(&self.queue, &system.submit());

        let color_view = self.color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = self.depth.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pipeline.draw(&mut pass, system.renderer().material(), buffers);
        }
        self.queue.submit(Some(encoder.finish()));
        self.frames += 1;
        debug!(frame = self.frames, live = system.particle_count(), "particle frame submitted");
    }
}

impl Drop for OffscreenTarget {
    fn drop(&mut self) {
        self.buffers = None;
        self.color.destroy();
        self.depth.destroy();
    }
}
