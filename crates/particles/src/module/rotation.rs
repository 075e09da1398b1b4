use ember_core::{pack_curve_range_xyz, pack_curve_range_z, pseudo_random, CurveRange, ModuleRandSeed};
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Spins particles by an angular velocity curve (radians per second).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationOverLifetime {
    /// Whether the module runs.
    pub enabled: bool,
    /// Rotate around all three axes instead of Z only.
    pub separate_axes: bool,
    /// Angular velocity around X.
    pub x: CurveRange,
    /// Angular velocity around Y.
    pub y: CurveRange,
    /// Angular velocity around Z.
    pub z: CurveRange,
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("separate_axes", PropertyKind::Bool, "false", 1, "Rotate around each axis independently"),
    PropertySchema::new("x", PropertyKind::CurveRange, "constant(0)", 2, "Angular velocity around X"),
    PropertySchema::new("y", PropertyKind::CurveRange, "constant(0)", 3, "Angular velocity around Y"),
    PropertySchema::new("z", PropertyKind::CurveRange, "constant(0)", 4, "Angular velocity around Z"),
];

impl ParticleModule for RotationOverLifetime {
    fn name(&self) -> &'static str {
        "rotation_over_lifetime"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "ROTATION_OVER_TIME_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Gpu
    }

    fn schema(&self) -> &'static [PropertySchema] {
        SCHEMA
    }

    fn animate(&self, particle: &mut Particle, dt: f32) {
        let t = particle.normalized_progress();
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::ROTATION));
        if self.separate_axes {
            particle.rotation.x += self.x.evaluate(t, rnd) * dt;
            particle.rotation.y += self.y.evaluate(t, rnd) * dt;
        }
        particle.rotation.z += self.z.evaluate(t, rnd) * dt;
    }

    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        let table = if self.separate_axes {
            pack_curve_range_xyz(sample_count, &self.x, &self.y, &self.z)
        } else {
            pack_curve_range_z(sample_count, &self.z)
        };
        Some(GpuBinding {
            texture: "rotation_over_time_tex0",
            mode_uniform: "u_rotation_mode",
            space: None,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn z_only_ignores_other_axes() {
        let module = RotationOverLifetime {
            enabled: true,
            x: CurveRange::constant(5.0),
            z: CurveRange::constant(2.0),
            ..RotationOverLifetime::default()
        };
        let mut p = Particle::with_lifetime(1.0);
        module.animate(&mut p, 0.5);
        assert_eq!(p.rotation, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn separate_axes_integrate_all_three() {
        let module = RotationOverLifetime {
            enabled: true,
            separate_axes: true,
            x: CurveRange::constant(1.0),
            y: CurveRange::constant(2.0),
            z: CurveRange::constant(3.0),
        };
        let mut p = Particle::with_lifetime(1.0);
        module.animate(&mut p, 1.0);
        assert_eq!(p.rotation, Vec3::new(1.0, 2.0, 3.0));
    }
}
