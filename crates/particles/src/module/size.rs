use ember_core::{
    pack_curve_range_n, pack_curve_range_xyz, pseudo_random, CurveRange, ModuleRandSeed,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Scales the spawn size by a curve over normalized lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeOverLifetime {
    /// Whether the module runs.
    pub enabled: bool,
    /// Use `x`/`y`/`z` instead of the uniform `size` curve.
    pub separate_axes: bool,
    /// Uniform size multiplier.
    pub size: CurveRange,
    /// X multiplier when axes are separated.
    pub x: CurveRange,
    /// Y multiplier when axes are separated.
    pub y: CurveRange,
    /// Z multiplier when axes are separated.
    pub z: CurveRange,
}

impl Default for SizeOverLifetime {
    fn default() -> Self {
        Self {
            enabled: false,
            separate_axes: false,
            size: CurveRange::constant(1.0),
            x: CurveRange::constant(1.0),
            y: CurveRange::constant(1.0),
            z: CurveRange::constant(1.0),
        }
    }
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("separate_axes", PropertyKind::Bool, "false", 1, "Scale each axis independently"),
    PropertySchema::new("size", PropertyKind::CurveRange, "constant(1)", 2, "Size multiplier over lifetime"),
    PropertySchema::new("x", PropertyKind::CurveRange, "constant(1)", 3, "X size multiplier"),
    PropertySchema::new("y", PropertyKind::CurveRange, "constant(1)", 4, "Y size multiplier"),
    PropertySchema::new("z", PropertyKind::CurveRange, "constant(1)", 5, "Z size multiplier"),
];

impl ParticleModule for SizeOverLifetime {
    fn name(&self) -> &'static str {
        "size_over_lifetime"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "SIZE_OVER_TIME_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Gpu
    }

    fn schema(&self) -> &'static [PropertySchema] {
        SCHEMA
    }

    fn animate(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_progress();
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::SIZE));
        let scale = if self.separate_axes {
            Vec3::new(
                self.x.evaluate(t, rnd),
                self.y.evaluate(t, rnd),
                self.z.evaluate(t, rnd),
            )
        } else {
            Vec3::splat(self.size.evaluate(t, rnd))
        };
        particle.size = particle.start_size * scale;
    }

    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        let table = if self.separate_axes {
            pack_curve_range_xyz(sample_count, &self.x, &self.y, &self.z)
        } else {
            pack_curve_range_n(sample_count, &self.size)
        };
        Some(GpuBinding {
            texture: "size_over_time_tex0",
            mode_uniform: "u_size_mode",
            space: None,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::AnimationCurve;

    #[test]
    fn shrinks_to_zero_over_life() {
        let module = SizeOverLifetime {
            enabled: true,
            size: CurveRange::curve(AnimationCurve::linear(1.0, 0.0)),
            ..SizeOverLifetime::default()
        };
        let mut p = Particle::with_lifetime(2.0);
        p.start_size = Vec3::splat(4.0);
        p.remaining_lifetime = 1.0;
        module.animate(&mut p, 0.0);
        assert!((p.size - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn binding_shape_follows_axis_mode() {
        let mut module = SizeOverLifetime::default();
        let uniform = module.gpu_binding(8).unwrap();
        assert_eq!(uniform.table.get(0, 0).unwrap(), [1.0, 1.0, 1.0, 0.0]);
        module.separate_axes = true;
        module.y = CurveRange::constant(2.0);
        let split = module.gpu_binding(8).unwrap();
        assert_eq!(split.table.get(0, 0).unwrap(), [1.0, 2.0, 1.0, 0.0]);
        assert_eq!(split.mode_uniform, "u_size_mode");
    }
}
