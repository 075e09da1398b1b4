use ember_core::Space;
use ember_particles::{
    ModuleStack, ModuleStage, Particle, ParticleModule, ParticleSystemConfig, RenderMode,
    SimulationMode,
};
use glam::Vec4;
use tracing::{debug, warn};

use crate::material::{
    Material, ShaderDefines, UniformHandle, UniformValue, CC_RENDER_MODE, CC_USE_WORLD_SPACE,
};
use crate::mesh::ParticleMesh;
use crate::node::NodeTransform;
use crate::pool::{ParticlePool, PoolError, Slot, Submission};

/// Samples per row of every over-lifetime table.
pub const SAMPLE_COUNT: u32 = 32;

#[derive(Debug, Clone, Copy, Default)]
struct FrameHandles {
    ps_time: Option<UniformHandle>,
    delta: Option<UniformHandle>,
    world_rot: Option<UniformHandle>,
}

/// Drives one system's pool and material: spawning into the pool, the
/// per-tick module pass and expiry, and uniform/define upkeep.
#[derive(Debug)]
pub struct ParticleRenderer<M: Material> {
    pool: ParticlePool,
    material: M,
    defines: ShaderDefines,
    frame: FrameHandles,
    simulation_space: Space,
    scale_space: Space,
    simulation_mode: SimulationMode,
    velocity_scale: f32,
    length_scale: f32,
    node_scale: Vec4,
    frame_tile_vel_len_scale: Vec4,
    time: f32,
}

fn set_named<M: Material>(material: &mut M, name: &str, value: UniformValue) {
    match material.uniform_handle(name) {
        Some(handle) => material.set_uniform(handle, value),
        None => warn!(uniform = name, "material has no such uniform"),
    }
}

impl<M: Material> ParticleRenderer<M> {
    /// Build the pool for `config` and push the initial material state.
    pub fn new(
        config: &ParticleSystemConfig,
        material: M,
        node: &impl NodeTransform,
    ) -> Result<Self, PoolError> {
        let mut renderer = Self {
            pool: ParticlePool::new(config.capacity as usize, config.render_mode, None)?,
            material,
            defines: ShaderDefines::default(),
            frame: FrameHandles::default(),
            simulation_space: config.simulation_space,
            scale_space: config.scale_space,
            simulation_mode: config.simulation_mode,
            velocity_scale: config.velocity_scale,
            length_scale: config.length_scale,
            node_scale: Vec4::ONE,
            frame_tile_vel_len_scale: Vec4::new(1.0, 1.0, 0.0, 0.0),
            time: 0.0,
        };
        renderer.update_material_params(node, &config.modules);
        Ok(renderer)
    }

    /// Recompute defines and init-time uniforms, rebind sample tables and
    /// recompile the material.
    pub fn update_material_params(&mut self, node: &impl NodeTransform, modules: &ModuleStack) {
        let scale = match self.scale_space {
            Space::Local => node.local_scale(),
            Space::World => node.world_scale(),
        };
        self.node_scale = scale.extend(0.0);

        self.defines
            .set_bool(CC_USE_WORLD_SPACE, self.simulation_space == Space::World);
        let mode = self.render_mode();
        self.defines.set_int(CC_RENDER_MODE, mode.shader_index());

        self.frame_tile_vel_len_scale = Vec4::new(1.0, 1.0, 0.0, 0.0);
        if mode == RenderMode::StretchedBillboard {
            self.frame_tile_vel_len_scale.z = self.velocity_scale;
            self.frame_tile_vel_len_scale.w = self.length_scale;
        }
        let animation = &modules.texture_animation;
        if animation.enabled {
            self.frame_tile_vel_len_scale.x = animation.num_tiles_x as f32;
            self.frame_tile_vel_len_scale.y = animation.num_tiles_y as f32;
        }

        self.init_shader_uniforms(modules);
        self.material.recompile_shaders(&self.defines);
        self.frame = FrameHandles {
            ps_time: self.material.uniform_handle("u_psTime"),
            delta: self.material.uniform_handle("u_delta"),
            world_rot: self.material.uniform_handle("u_worldRot"),
        };
        if self.frame.ps_time.is_none() || self.frame.delta.is_none() || self.frame.world_rot.is_none() {
            warn!("material is missing per-frame particle uniforms");
        }
        debug!(
            render_mode = ?mode,
            features = self.defines.feature_bits(),
            "particle material updated"
        );
    }

    /// GPU-stage modules only drive the shader in GPU simulation mode;
    /// otherwise they were already applied to the packed state.
    fn shader_applies(&self, module: &dyn ParticleModule) -> bool {
        module.is_enabled()
            && (module.stage() == ModuleStage::Cpu || self.simulation_mode == SimulationMode::Gpu)
    }

    fn init_shader_uniforms(&mut self, modules: &ModuleStack) {
        set_named(&mut self.material, "scale", UniformValue::Vec4(self.node_scale));
        set_named(
            &mut self.material,
            "frameTile_velLenScale",
            UniformValue::Vec4(self.frame_tile_vel_len_scale),
        );

        for module in modules.iter() {
            let active = self.shader_applies(module);
            self.defines.set_bool(module.shader_define(), active);
            if !active {
                continue;
            }
            let Some(binding) = module.gpu_binding(SAMPLE_COUNT) else {
                continue;
            };
            match self.material.uniform_handle(binding.texture) {
                Some(handle) => self.material.bind_texture(handle, &binding.table),
                None => warn!(texture = binding.texture, "material has no such texture"),
            }
            set_named(
                &mut self.material,
                binding.mode_uniform,
                UniformValue::Int(binding.table.height() as i32),
            );
            if let Some((uniform, space)) = binding.space {
                set_named(&mut self.material, uniform, UniformValue::Int(space.as_uniform()));
            }
        }
    }

    fn update_shader_uniforms(&mut self, dt: f32, node: &impl NodeTransform) {
        if let Some(handle) = self.frame.ps_time {
            self.material.set_uniform(handle, UniformValue::Float(self.time));
        }
        if let Some(handle) = self.frame.delta {
            self.material.set_uniform(handle, UniformValue::Float(dt));
        }
        if let Some(handle) = self.frame.world_rot {
            let rotation = Vec4::from(node.world_rotation());
            self.material.set_uniform(handle, UniformValue::Vec4(rotation));
        }
    }

    /// Switch render mode, re-encoding live particles under the new layout.
    pub fn set_render_mode(
        &mut self,
        mode: RenderMode,
        mesh: Option<ParticleMesh>,
        node: &impl NodeTransform,
        modules: &ModuleStack,
    ) -> Result<(), PoolError> {
        if mode == self.render_mode() && mesh.is_none() {
            return Ok(());
        }
        self.pool.repack(mode, mesh)?;
        self.update_material_params(node, modules);
        Ok(())
    }

    /// Advance the system clock. Particles spawned afterwards carry the new time.
    pub fn begin_frame(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Reserve a free record, or `None` when the pool is full.
    pub fn free_particle(&mut self) -> Option<Slot<'_>> {
        self.pool.allocate()
    }

    /// Commit `particle` at the current time. Returns `false` when the pool is full.
    pub fn spawn(&mut self, particle: Particle) -> bool {
        let time = self.time;
        match self.pool.allocate() {
            Some(slot) => {
                slot.commit(particle, time);
                true
            }
            None => false,
        }
    }

    /// Run the module pass over live particles, drop expired ones and push
    /// per-frame uniforms. Returns the live count.
    pub fn update(
        &mut self,
        dt: f32,
        node: &impl NodeTransform,
        modules: &mut ModuleStack,
        gravity: f32,
    ) -> usize {
        modules.prepare_all(self.simulation_space, &node.world_matrix());
        let stack: &ModuleStack = modules;
        let mode = self.simulation_mode;
        self.pool.animate_live(|particle| stack.step(particle, dt, gravity, mode));
        self.pool.tick(self.time);
        self.update_shader_uniforms(dt, node);
        self.pool.live_count()
    }

    /// Buffer and live count for the GPU submission step.
    pub fn submit(&self) -> Submission<'_> {
        self.pool.submit()
    }

    /// Drop every live particle.
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Live particles.
    pub fn particle_count(&self) -> usize {
        self.pool.live_count()
    }

    /// Active render mode.
    pub fn render_mode(&self) -> RenderMode {
        self.pool.layout().mode()
    }

    /// System clock in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Underlying pool.
    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// Defines of the last material update.
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    /// Material.
    pub fn material(&self) -> &M {
        &self.material
    }

    /// Mutable material, e.g. to set camera state before drawing.
    pub fn material_mut(&mut self) -> &mut M {
        &mut self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::RecordingMaterial;
    use crate::node::Transform;
    use ember_core::{CurveRange, GradientRange};
    use glam::{Quat, Vec3};

    fn renderer(config: &ParticleSystemConfig) -> ParticleRenderer<RecordingMaterial> {
        ParticleRenderer::new(config, RecordingMaterial::new(), &Transform::default()).unwrap()
    }

    #[test]
    fn init_sets_render_mode_and_space_defines() {
        let config = ParticleSystemConfig {
            simulation_space: Space::World,
            render_mode: RenderMode::VerticalBillboard,
            ..ParticleSystemConfig::default()
        };
        let renderer = renderer(&config);
        let defines = renderer.material().defines();
        assert!(defines.is_enabled(CC_USE_WORLD_SPACE));
        assert_eq!(defines.int(CC_RENDER_MODE), 3);
        assert_eq!(renderer.material().recompile_count(), 1);
    }

    #[test]
    fn enabled_gpu_modules_bind_tables() {
        let mut config = ParticleSystemConfig::default();
        config.modules.color_over_lifetime.enabled = true;
        config.modules.color_over_lifetime.color = GradientRange::TwoColors {
            min: Vec4::ONE,
            max: Vec4::ZERO,
        };
        config.modules.force_over_lifetime.enabled = true;
        config.modules.force_over_lifetime.space = Space::World;
        let renderer = renderer(&config);
        let material = renderer.material();

        let color = material.texture("color_over_time_tex0").unwrap();
        assert_eq!((color.width(), color.height()), (SAMPLE_COUNT, 2));
        assert_eq!(material.uniform("u_color_mode"), Some(UniformValue::Int(2)));
        assert_eq!(material.uniform("u_force_space"), Some(UniformValue::Int(0)));
        assert!(material.defines().is_enabled("FORCE_OVER_TIME_MODULE_ENABLE"));
        assert!(material.texture("size_over_time_tex0").is_none());
    }

    #[test]
    fn cpu_simulation_keeps_gpu_module_defines_off() {
        let mut config = ParticleSystemConfig::default();
        config.simulation_mode = SimulationMode::Cpu;
        config.modules.size_over_lifetime.enabled = true;
        config.modules.limit_velocity.enabled = true;
        let renderer = renderer(&config);
        let defines = renderer.material().defines();
        assert!(!defines.is_enabled("SIZE_OVER_TIME_MODULE_ENABLE"));
        assert!(defines.is_enabled("LIMIT_VELOCITY_MODULE_ENABLE"));
        assert!(renderer.material().texture("size_over_time_tex0").is_none());
    }

    #[test]
    fn stretched_mode_carries_velocity_and_length_scale() {
        let mut config = ParticleSystemConfig {
            render_mode: RenderMode::StretchedBillboard,
            velocity_scale: 0.5,
            length_scale: 2.0,
            ..ParticleSystemConfig::default()
        };
        config.modules.texture_animation.enabled = true;
        config.modules.texture_animation.num_tiles_x = 4;
        config.modules.texture_animation.num_tiles_y = 2;
        let renderer = renderer(&config);
        assert_eq!(
            renderer.material().uniform("frameTile_velLenScale"),
            Some(UniformValue::Vec4(Vec4::new(4.0, 2.0, 0.5, 2.0)))
        );
    }

    #[test]
    fn update_pushes_frame_uniforms_and_expires() {
        let mut config = ParticleSystemConfig {
            capacity: 2,
            ..ParticleSystemConfig::default()
        };
        let node = Transform {
            rotation: Quat::from_rotation_y(0.5),
            ..Transform::default()
        };
        let mut renderer = ParticleRenderer::new(&config, RecordingMaterial::new(), &node).unwrap();
        assert!(renderer.spawn(Particle::with_lifetime(1.0)));
        assert!(renderer.spawn(Particle::with_lifetime(1.0)));
        assert!(!renderer.spawn(Particle::with_lifetime(1.0)));
        assert!(renderer.free_particle().is_none());

        renderer.begin_frame(1.5);
        let live = renderer.update(1.5, &node, &mut config.modules, 0.0);
        assert_eq!(live, 0);
        let material = renderer.material();
        assert_eq!(material.uniform("u_psTime"), Some(UniformValue::Float(1.5)));
        assert_eq!(material.uniform("u_delta"), Some(UniformValue::Float(1.5)));
        match material.uniform("u_worldRot") {
            Some(UniformValue::Vec4(rot)) => {
                assert!((rot - Vec4::from(Quat::from_rotation_y(0.5))).length() < 1e-5)
            }
            other => panic!("unexpected world rotation {other:?}"),
        }
    }

    #[test]
    fn limit_velocity_shapes_packed_direction() {
        let mut config = ParticleSystemConfig::default();
        config.modules.limit_velocity.enabled = true;
        config.modules.limit_velocity.limit = CurveRange::constant(5.0);
        let node = Transform::default();
        let mut renderer = ParticleRenderer::new(&config, RecordingMaterial::new(), &node).unwrap();
        let mut p = Particle::with_lifetime(10.0);
        p.velocity = Vec3::new(0.0, 6.0, 8.0);
        renderer.spawn(p);
        renderer.begin_frame(0.1);
        renderer.update(0.1, &node, &mut config.modules, 0.0);

        let submission = renderer.submit();
        let offsets = *submission.layout.offsets();
        let dir = Vec3::from_slice(&submission.buffer[offsets.direction..offsets.direction + 3]);
        assert!((dir.length() - 5.0).abs() < 1e-4);
        assert!((dir.normalize() - Vec3::new(0.0, 0.6, 0.8)).length() < 1e-5);
    }

    #[test]
    fn set_render_mode_repacks_and_recompiles() {
        let config = ParticleSystemConfig::default();
        let node = Transform::default();
        let mut renderer = ParticleRenderer::new(&config, RecordingMaterial::new(), &node).unwrap();
        renderer.spawn(Particle::with_lifetime(1.0));
        let stride = renderer.submit().layout.stride();

        renderer.set_render_mode(RenderMode::Billboard, None, &node, &config.modules).unwrap();
        assert_eq!(renderer.material().recompile_count(), 1);

        renderer.set_render_mode(RenderMode::Mesh, None, &node, &config.modules).unwrap();
        assert_eq!(renderer.submit().layout.stride(), stride + 10);
        assert_eq!(renderer.particle_count(), 1);
        assert_eq!(renderer.material().defines().int(CC_RENDER_MODE), 4);
        assert_eq!(renderer.material().recompile_count(), 2);
    }
}
