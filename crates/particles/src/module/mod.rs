//! Per-tick particle modules and the fixed-order stack that runs them.
//!
//! Modules compose sequentially: the velocity limit damps whatever velocity
//! force and velocity-over-lifetime produced before it, so declaration order
//! is part of the simulation result.

mod color;
mod force;
mod limit_velocity;
mod rotation;
mod size;
mod texture_animation;
mod velocity;

pub use color::ColorOverLifetime;
pub use force::ForceOverLifetime;
pub use limit_velocity::{dampen_beyond_limit, LimitVelocity};
pub use rotation::RotationOverLifetime;
pub use size::SizeOverLifetime;
pub use texture_animation::TextureAnimation;
pub use velocity::VelocityOverLifetime;

use ember_core::{SampleTable, Space};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::particle::Particle;
use crate::schema::PropertySchema;

/// Where a module's effect is evaluated when the system simulates on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStage {
    /// Always applied on the CPU mirror.
    Cpu,
    /// Packed into a sample table and evaluated by the shader.
    Gpu,
}

/// Which side owns over-lifetime evaluation for a system.
///
/// Position is integrated on the CPU from the effective velocity in both
/// modes; in GPU mode the shader adds the force and velocity curve offsets on
/// top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Every module animates on the CPU.
    Cpu,
    /// Only CPU-stage modules animate; the shader applies the GPU-stage
    /// modules from their sample tables.
    #[default]
    Gpu,
}

/// Texture + uniforms a GPU-stage module hands to the material.
#[derive(Debug, Clone)]
pub struct GpuBinding {
    /// Texture uniform name.
    pub texture: &'static str,
    /// Uniform receiving the table height.
    pub mode_uniform: &'static str,
    /// Optional space uniform and the module's space.
    pub space: Option<(&'static str, Space)>,
    /// Packed samples.
    pub table: SampleTable,
}

/// A swappable transform applied to every live particle each tick.
pub trait ParticleModule: std::fmt::Debug {
    /// Stable identifier, also used by [`ModuleStack::set_enabled`].
    fn name(&self) -> &'static str;

    /// Whether the module runs.
    fn is_enabled(&self) -> bool;

    /// Toggle the module.
    fn set_enabled(&mut self, enabled: bool);

    /// Shader feature flag mirroring [`ParticleModule::is_enabled`].
    fn shader_define(&self) -> &'static str;

    /// Where the module is evaluated in GPU simulation mode.
    fn stage(&self) -> ModuleStage;

    /// Editor-facing property description.
    fn schema(&self) -> &'static [PropertySchema];

    /// Per-tick preparation; returns whether a per-particle space transform is needed.
    fn prepare(&mut self, _space: Space, _world: &Mat4) -> bool {
        false
    }

    /// Mutate one particle.
    fn animate(&self, particle: &mut Particle, dt: f32);

    /// Sample table for shader-side evaluation. Configuration-time only.
    fn gpu_binding(&self, _sample_count: u32) -> Option<GpuBinding> {
        None
    }
}

const EARTH_GRAVITY: f32 = 9.8;

/// All module kinds of one particle system, in their fixed application order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleStack {
    /// Applied first.
    pub size_over_lifetime: SizeOverLifetime,
    /// Applied second.
    pub color_over_lifetime: ColorOverLifetime,
    /// Applied third.
    pub force_over_lifetime: ForceOverLifetime,
    /// Applied fourth.
    pub velocity_over_lifetime: VelocityOverLifetime,
    /// Applied fifth, on the combined velocity.
    pub limit_velocity: LimitVelocity,
    /// Applied sixth.
    pub rotation_over_lifetime: RotationOverLifetime,
    /// Applied last.
    pub texture_animation: TextureAnimation,
}

impl ModuleStack {
    /// Modules in application order.
    pub fn iter(&self) -> [&dyn ParticleModule; 7] {
        [
            &self.size_over_lifetime,
            &self.color_over_lifetime,
            &self.force_over_lifetime,
            &self.velocity_over_lifetime,
            &self.limit_velocity,
            &self.rotation_over_lifetime,
            &self.texture_animation,
        ]
    }

    /// Mutable modules in application order.
    pub fn iter_mut(&mut self) -> [&mut dyn ParticleModule; 7] {
        [
            &mut self.size_over_lifetime,
            &mut self.color_over_lifetime,
            &mut self.force_over_lifetime,
            &mut self.velocity_over_lifetime,
            &mut self.limit_velocity,
            &mut self.rotation_over_lifetime,
            &mut self.texture_animation,
        ]
    }

    /// Toggle a module by name. Returns `false` if no module has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        for module in self.iter_mut() {
            if module.name() == name {
                module.set_enabled(enabled);
                return true;
            }
        }
        false
    }

    /// `(define, enabled)` pairs for the shader compiler.
    pub fn feature_flags(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.iter()
            .into_iter()
            .map(|module| (module.shader_define(), module.is_enabled()))
    }

    /// Run every enabled module's preparation step. Must precede any [`ModuleStack::step`]
    /// in the same tick.
    pub fn prepare_all(&mut self, space: Space, world: &Mat4) {
        for module in self.iter_mut() {
            if module.is_enabled() {
                module.prepare(space, world);
            }
        }
    }

    /// Advance one live particle by `dt`.
    ///
    /// Decrements its remaining lifetime, applies gravity, rebuilds the
    /// effective velocity through the enabled modules and integrates position.
    pub fn step(&self, particle: &mut Particle, dt: f32, gravity: f32, mode: SimulationMode) {
        particle.remaining_lifetime -= dt;
        particle.animated_velocity = Vec3::ZERO;
        particle.velocity.y -= gravity * EARTH_GRAVITY * dt;
        particle.ultimate_velocity = particle.velocity;

        for module in self.iter() {
            if !module.is_enabled() {
                continue;
            }
            if mode == SimulationMode::Gpu && module.stage() == ModuleStage::Gpu {
                continue;
            }
            module.animate(particle, dt);
        }

        particle.position += particle.ultimate_velocity * dt;
    }
}
