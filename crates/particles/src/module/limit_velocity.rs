use ember_core::{calculate_transform, lerp, pseudo_random, CurveRange, ModuleRandSeed, Space};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{ModuleStage, ParticleModule};
use crate::particle::Particle;
use crate::schema::{PropertyKind, PropertySchema, ENABLE};

/// Move `|vel|` toward `limit` by `dampen` when it exceeds the limit, keeping the sign.
///
/// `dampen = 0` leaves the value alone, `dampen = 1` clamps exactly to `limit`.
pub fn dampen_beyond_limit(vel: f32, limit: f32, dampen: f32) -> f32 {
    let sign = if vel < 0.0 { -1.0 } else { 1.0 };
    let mut magnitude = vel.abs();
    if magnitude > limit {
        magnitude = lerp(magnitude, limit, dampen);
    }
    magnitude * sign
}

/// Damps particle speed that exceeds a limit curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitVelocity {
    /// Whether the module runs.
    pub enabled: bool,
    /// Per-axis limit on X when `separate_axes` is set.
    pub limit_x: CurveRange,
    /// Per-axis limit on Y when `separate_axes` is set.
    pub limit_y: CurveRange,
    /// Per-axis limit on Z when `separate_axes` is set.
    pub limit_z: CurveRange,
    /// Speed limit when axes are not separated.
    pub limit: CurveRange,
    /// Fraction of the excess removed each tick, in `[0, 1]`.
    pub dampen: f32,
    /// Clamp each axis independently instead of the speed.
    pub separate_axes: bool,
    /// Space the per-axis limits are authored in.
    pub space: Space,
    #[serde(skip)]
    rotation: Option<Quat>,
}

impl Default for LimitVelocity {
    fn default() -> Self {
        Self {
            enabled: false,
            limit_x: CurveRange::constant(1.0),
            limit_y: CurveRange::constant(1.0),
            limit_z: CurveRange::constant(1.0),
            limit: CurveRange::constant(1.0),
            dampen: 1.0,
            separate_axes: false,
            space: Space::Local,
            rotation: None,
        }
    }
}

const SCHEMA: &[PropertySchema] = &[
    ENABLE,
    PropertySchema::new("space", PropertyKind::Space, "local", 1, "Space the per-axis limits are authored in"),
    PropertySchema::new("separate_axes", PropertyKind::Bool, "false", 2, "Limit each axis independently"),
    PropertySchema::new("limit", PropertyKind::CurveRange, "constant(1)", 3, "Speed limit")
        .with_range(-1.0, 1.0),
    PropertySchema::new("limit_x", PropertyKind::CurveRange, "constant(1)", 4, "X axis speed limit")
        .with_range(-1.0, 1.0),
    PropertySchema::new("limit_y", PropertyKind::CurveRange, "constant(1)", 5, "Y axis speed limit")
        .with_range(-1.0, 1.0),
    PropertySchema::new("limit_z", PropertyKind::CurveRange, "constant(1)", 6, "Z axis speed limit")
        .with_range(-1.0, 1.0),
    PropertySchema::new("dampen", PropertyKind::Float, "1", 7, "Blend from current speed toward the limit")
        .with_range(0.0, 1.0),
];

impl ParticleModule for LimitVelocity {
    fn name(&self) -> &'static str {
        "limit_velocity"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shader_define(&self) -> &'static str {
        "LIMIT_VELOCITY_MODULE_ENABLE"
    }

    fn stage(&self) -> ModuleStage {
        ModuleStage::Cpu
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
        let rnd = pseudo_random(particle.random_seed.wrapping_add(ModuleRandSeed::LIMIT));
        let velocity = particle.ultimate_velocity;

        particle.ultimate_velocity = if self.separate_axes {
            let mut limit = Vec3::new(
                self.limit_x.evaluate(t, rnd),
                self.limit_y.evaluate(t, rnd),
                self.limit_z.evaluate(t, rnd),
            );
            if let Some(rotation) = self.rotation {
                // limits are magnitudes; rotation can flip component signs
                limit = (rotation * limit).abs();
            }
            Vec3::new(
                dampen_beyond_limit(velocity.x, limit.x, self.dampen),
                dampen_beyond_limit(velocity.y, limit.y, self.dampen),
                dampen_beyond_limit(velocity.z, limit.z, self.dampen),
            )
        } else {
            let speed = dampen_beyond_limit(velocity.length(), self.limit.evaluate(t, rnd), self.dampen);
            velocity.normalize_or_zero() * speed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(limit: f32, dampen: f32) -> LimitVelocity {
        LimitVelocity {
            enabled: true,
            limit: CurveRange::constant(limit),
            dampen,
            ..LimitVelocity::default()
        }
    }

    #[test]
    fn dampen_leaves_values_under_limit() {
        assert_eq!(dampen_beyond_limit(3.0, 5.0, 1.0), 3.0);
        assert_eq!(dampen_beyond_limit(-3.0, 5.0, 1.0), -3.0);
    }

    #[test]
    fn dampen_preserves_sign() {
        assert_eq!(dampen_beyond_limit(-10.0, 5.0, 1.0), -5.0);
        assert_eq!(dampen_beyond_limit(-10.0, 5.0, 0.5), -7.5);
    }

    #[test]
    fn uniform_hard_clamp_keeps_direction() {
        let module = uniform(5.0, 1.0);
        let mut p = Particle::with_lifetime(1.0);
        p.ultimate_velocity = Vec3::new(6.0, 8.0, 0.0);
        module.animate(&mut p, 0.016);
        assert!((p.ultimate_velocity.length() - 5.0).abs() < 1e-5);
        assert!((p.ultimate_velocity.normalize() - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn zero_velocity_stays_zero() {
        let module = uniform(0.0, 1.0);
        let mut p = Particle::with_lifetime(1.0);
        module.animate(&mut p, 0.016);
        assert_eq!(p.ultimate_velocity, Vec3::ZERO);
    }

    #[test]
    fn separate_axes_clamp_each_component() {
        let module = LimitVelocity {
            enabled: true,
            separate_axes: true,
            limit_x: CurveRange::constant(1.0),
            limit_y: CurveRange::constant(2.0),
            limit_z: CurveRange::constant(10.0),
            dampen: 1.0,
            ..LimitVelocity::default()
        };
        let mut p = Particle::with_lifetime(1.0);
        p.ultimate_velocity = Vec3::new(-4.0, 4.0, 4.0);
        module.animate(&mut p, 0.016);
        assert_eq!(p.ultimate_velocity, Vec3::new(-1.0, 2.0, 4.0));
    }

    #[test]
    fn prepare_reports_transform_need() {
        let mut module = uniform(1.0, 1.0);
        let world = Mat4::from_rotation_y(0.5);
        assert!(!module.prepare(Space::Local, &world));
        assert!(module.prepare(Space::World, &world));
    }

    #[test]
    fn rotated_limits_apply_in_simulation_space() {
        let mut module = LimitVelocity {
            enabled: true,
            separate_axes: true,
            limit_x: CurveRange::constant(1.0),
            limit_y: CurveRange::constant(100.0),
            limit_z: CurveRange::constant(100.0),
            dampen: 1.0,
            space: Space::Local,
            ..LimitVelocity::default()
        };
        // a quarter turn around Z maps the tight X limit onto the Y axis
        let world = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(module.prepare(Space::World, &world));
        let mut p = Particle::with_lifetime(1.0);
        p.ultimate_velocity = Vec3::new(0.0, 50.0, 0.0);
        module.animate(&mut p, 0.016);
        assert!((p.ultimate_velocity.y - 1.0).abs() < 1e-3);
        assert!(p.ultimate_velocity.x.abs() < 1e-3);
    }
}
