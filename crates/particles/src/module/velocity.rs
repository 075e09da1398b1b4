use ember_core::{
    calculate_transform, pack_curve_range_xyzw, pseudo_random, CurveRange, ModuleRandSeed, Space,
};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Adds an animated velocity on top of the base velocity and scales the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityOverLifetime {
    /// Whether the module runs.
    pub enabled: bool,
    /// Velocity on X.
    pub x: CurveRange,
    /// Velocity on Y.
    pub y: CurveRange,
    /// Velocity on Z.
    pub z: CurveRange,
    /// Multiplier on the combined velocity.
    pub speed_modifier: CurveRange,
    /// Space the velocity is authored in.
    pub space: Space,
    #[serde(skip)]
    rotation: Option<Quat>,
}

impl Default for VelocityOverLifetime {
    fn default() -> Self {
        Self {
            enabled: false,
            x: CurveRange::constant(0.0),
            y: CurveRange::constant(0.0),
            z: CurveRange::constant(0.0),
            speed_modifier: CurveRange::constant(1.0),
            space: Space::Local,
            rotation: None,
        }
    }
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("x", PropertyKind::CurveRange, "constant(0)", 1, "Velocity on X"),
    PropertySchema::new("y", PropertyKind::CurveRange, "constant(0)", 2, "Velocity on Y"),
    PropertySchema::new("z", PropertyKind::CurveRange, "constant(0)", 3, "Velocity on Z"),
    PropertySchema::new("speed_modifier", PropertyKind::CurveRange, "constant(1)", 4, "Speed multiplier"),
    PropertySchema::new("space", PropertyKind::Space, "local", 5, "Space the velocity is authored in"),
];

impl ParticleModule for VelocityOverLifetime {
    fn name(&self) -> &'static str {
        "velocity_over_lifetime"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "VELOCITY_OVER_TIME_MODULE_ENABLE"
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

    fn animate(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_progress();
        let seed = particle.random_seed;
        let mut velocity = Vec3::new(
            self.x.evaluate(t, pseudo_random(seed ^ ModuleRandSeed::VELOCITY_X)),
            self.y.evaluate(t, pseudo_random(seed ^ ModuleRandSeed::VELOCITY_Y)),
            self.z.evaluate(t, pseudo_random(seed ^ ModuleRandSeed::VELOCITY_Z)),
        );
        if let Some(rotation) = self.rotation {
            velocity = rotation * velocity;
        }
        particle.animated_velocity += velocity;
        let modifier = self
            .speed_modifier
            .evaluate(t, pseudo_random(seed.wrapping_add(ModuleRandSeed::VELOCITY_X)));
        particle.ultimate_velocity = (particle.velocity + particle.animated_velocity) * modifier;
    }

    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        Some(GpuBinding {
            texture: "velocity_over_time_tex0",
            mode_uniform: "u_velocity_mode",
            space: Some(("u_velocity_space", self.space)),
            table: pack_curve_range_xyzw(
                sample_count,
                &self.x,
                &self.y,
                &self.z,
                &self.speed_modifier,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_animated_velocity_and_scales() {
        let module = VelocityOverLifetime {
            enabled: true,
            x: CurveRange::constant(2.0),
            speed_modifier: CurveRange::constant(0.5),
            ..VelocityOverLifetime::default()
        };
        let mut p = Particle::with_lifetime(1.0);
        p.velocity = Vec3::new(0.0, 4.0, 0.0);
        module.animate(&mut p, 0.1);
        assert_eq!(p.animated_velocity, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(p.ultimate_velocity, Vec3::new(1.0, 2.0, 0.0));
        // base velocity is untouched
        assert_eq!(p.velocity, Vec3::new(0.0, 4.0, 0.0));
    }

    #[test]
    fn gpu_table_packs_speed_modifier_in_w() {
        let module = VelocityOverLifetime::default();
        let binding = module.gpu_binding(2).unwrap();
        assert_eq!(binding.table.get(1, 0).unwrap(), [0.0, 0.0, 0.0, 1.0]);
    }
}
