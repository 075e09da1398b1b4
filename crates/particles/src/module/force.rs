use ember_core::{
    calculate_transform, pack_curve_range_xyz, pseudo_random, CurveRange, ModuleRandSeed, Space,
};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Accelerates particles by a per-axis force curve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceOverLifetime {
    /// Whether the module runs.
    pub enabled: bool,
    /// Force on X.
    pub x: CurveRange,
    /// Force on Y.
    pub y: CurveRange,
    /// Force on Z.
    pub z: CurveRange,
    /// Space the force is authored in.
    pub space: Space,
    #[serde(skip)]
    rotation: Option<Quat>,
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("x", PropertyKind::CurveRange, "constant(0)", 1, "Force on X"),
    PropertySchema::new("y", PropertyKind::CurveRange, "constant(0)", 2, "Force on Y"),
    PropertySchema::new("z", PropertyKind::CurveRange, "constant(0)", 3, "Force on Z"),
    PropertySchema::new("space", PropertyKind::Space, "local", 4, "Space the force is authored in"),
];

impl ParticleModule for ForceOverLifetime {
    fn name(&self) -> &'static str {
        "force_over_lifetime"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "FORCE_OVER_TIME_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Gpu
    }

    fn schema(&self) -> &'static [PropertySchema] {
        SCHEMA
    }

    fn prepare(&mut self, space: Space, world: &Mat4) -> bool {
        self.rotation = calculate_transform(space, self.space, world);
        self.rotation.is_some()
    }

    fn animate(&self, particle: &mut Particle, dt: f32) {
        let t = particle.normalized_progress();
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::FORCE));
        let mut force = Vec3::new(
            self.x.evaluate(t, rnd),
            self.y.evaluate(t, rnd),
            self.z.evaluate(t, rnd),
        );
        if let Some(rotation) = self.rotation {
            force = rotation * force;
        }
        particle.velocity += force * dt;
        particle.ultimate_velocity = particle.velocity + particle.animated_velocity;
    }

    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        Some(GpuBinding {
            texture: "force_over_time_tex0",
            mode_uniform: "u_force_mode",
            space: Some(("u_force_space", self.space)),
            table: pack_curve_range_xyz(sample_count, &self.x, &self.y, &self.z),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_accumulates_into_velocity() {
        let module = ForceOverLifetime {
            enabled: true,
            y: CurveRange::constant(10.0),
            ..ForceOverLifetime::default()
        };
        let mut p = Particle::with_lifetime(1.0);
        module.animate(&mut p, 0.5);
        module.animate(&mut p, 0.5);
        assert_eq!(p.velocity, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(p.ultimate_velocity, p.velocity);
    }

    #[test]
    fn binding_carries_space_uniform() {
        let module = ForceOverLifetime {
            space: Space::World,
            ..ForceOverLifetime::default()
        };
        let binding = module.gpu_binding(4).unwrap();
        assert_eq!(binding.space, Some(("u_force_space", Space::World)));
    }
}
