use ember_core::{pack_curve_range_xyz, pseudo_random, AnimationCurve, CurveRange, ModuleRandSeed};
use serde::{Deserialize, Serialize};

use super::{GpuBinding, ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Flip-book animation over a grid of texture tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureAnimation {
    /// Whether the module runs.
    pub enabled: bool,
    /// Tile columns in the sheet.
    pub num_tiles_x: u32,
    /// Tile rows in the sheet.
    pub num_tiles_y: u32,
    /// Normalized frame (0..1 over the sheet) over lifetime.
    pub frame_over_time: CurveRange,
    /// Frame offset, in frames.
    pub start_frame: CurveRange,
    /// How many times the sheet plays over one lifetime.
    pub cycle_count: u32,
}

impl Default for TextureAnimation {
    fn default() -> Self {
        Self {
            enabled: false,
            num_tiles_x: 1,
            num_tiles_y: 1,
            frame_over_time: CurveRange::curve(AnimationCurve::linear(0.0, 1.0)),
            start_frame: CurveRange::constant(0.0),
            cycle_count: 1,
        }
    }
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("num_tiles_x", PropertyKind::Int, "1", 1, "Tile columns"),
    PropertySchema::new("num_tiles_y", PropertyKind::Int, "1", 2, "Tile rows"),
    PropertySchema::new("frame_over_time", PropertyKind::CurveRange, "curve(0->1)", 3, "Normalized frame over lifetime")
        .with_range(0.0, 1.0),
    PropertySchema::new("start_frame", PropertyKind::CurveRange, "constant(0)", 4, "Frame offset"),
    PropertySchema::new("cycle_count", PropertyKind::Int, "1", 5, "Sheet plays per lifetime"),
];

impl TextureAnimation {
    /// Total frames in the sheet (at least one).
    pub fn total_frames(&self) -> u32 {
        self.num_tiles_x.saturating_mul(self.num_tiles_y).max(1)
    }
}

impl ParticleModule for TextureAnimation {
    fn name(&self) -> &'static str {
        "texture_animation"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "TEXTURE_ANIMATION_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Gpu
    }

    fn schema(&self) -> &'static [PropertySchema] {
        SCHEMA
    }

    fn animate(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_progress();
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::TEXTURE));
        let start = self.start_frame.evaluate(t, rnd) / self.total_frames() as f32;
        let frame = self.cycle_count as f32 * (self.frame_over_time.evaluate(t, rnd) + start);
        particle.frame_index = frame - frame.floor();
    }

    /// X holds the normalized frame, Y the start frame and Z the cycle count;
    /// the shader wraps `z * (x + y / frames)` into `[0, 1)`.
    fn gpu_binding(&self, sample_count: u32) -> Option<GpuBinding> {
        Some(GpuBinding {
            texture: "texture_animation_tex0",
            mode_uniform: "u_texture_animation_mode",
            space: None,
            table: pack_curve_range_xyz(
                sample_count,
                &self.frame_over_time,
                &self.start_frame,
                &CurveRange::constant(self.cycle_count as f32),
            ),
        })
    }
}
