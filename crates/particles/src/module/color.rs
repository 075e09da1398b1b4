use ember_core::{pack_gradient_range, pseudo_random, GradientRange, ModuleRandSeed};
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Tints the spawn color by a gradient over normalized lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorOverLifetime {
    /// Whether the module runs.
    pub enabled: bool,
    /// Multiplier applied to the spawn color.
    pub color: GradientRange,
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("color", PropertyKind::GradientRange, "color(1,1,1,1)", 1, "Color multiplier over lifetime"),
];

impl ParticleModule for ColorOverLifetime {
    fn name(&self) -> &'static str {
        "color_over_lifetime"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "COLOR_OVER_TIME_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Gpu
    }

    fn schema(&self) -> &'static [PropertySchema] {
        SCHEMA
    }

    fn animate(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_progress();
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::COLOR));
        particle.color = particle.start_color * self.color.evaluate(t, rnd);
    }

    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        Some(GpuBinding {
            texture: "color_over_time_tex0",
            mode_uniform: "u_color_mode",
            space: None,
            table: pack_gradient_range(sample_count, &self.color),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::Gradient;
    use glam::Vec4;

    #[test]
    fn fades_alpha_over_life() {
        let module = ColorOverLifetime {
            enabled: true,
            color: GradientRange::Gradient {
                gradient: Gradient::linear(Vec4::ONE, Vec4::new(1.0, 1.0, 1.0, 0.0)),
            },
        };
        let mut p = Particle::with_lifetime(1.0);
        p.start_color = Vec4::new(0.5, 0.5, 0.5, 1.0);
        p.remaining_lifetime = 0.25;
        module.animate(&mut p, 0.0);
        assert!((p.color.w - 0.25).abs() < 1e-5);
        assert!((p.color.x - 0.5).abs() < 1e-5);
    }
}
