//! Scalar helpers, coordinate spaces and the per-particle pseudo-random function.

use glam::{Mat4, Quat};
use serde::{Deserialize, Serialize};

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Deterministic pseudo-random value in `[0, 1)` derived from `seed`.
///
/// Pure function of its input: the same particle seed plus module offset
/// always yields the same value, so simulations replay identically.
#[inline]
pub fn pseudo_random(seed: u32) -> f32 {
    let next = (u64::from(seed) * 9301 + 49297) % 233_280;
    next as f32 / 233_280.0
}

/// Offsets added to a particle's random seed before sampling, one per module,
/// so two modules never draw the same value for the same particle.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRandSeed;

impl ModuleRandSeed {
    /// Velocity limit module.
    pub const LIMIT: u32 = 23_541;
    /// Size over lifetime module.
    pub const SIZE: u32 = 39_825;
    /// Texture sheet animation module.
    pub const TEXTURE: u32 = 90_794;
    /// Color over lifetime module.
    pub const COLOR: u32 = 91_041;
    /// Force over lifetime module.
    pub const FORCE: u32 = 212_165;
    /// Rotation over lifetime module.
    pub const ROTATION: u32 = 125_292;
    /// Velocity over lifetime module, X axis.
    pub const VELOCITY_X: u32 = 197_866;
    /// Velocity over lifetime module, Y axis.
    pub const VELOCITY_Y: u32 = 156_497;
    /// Velocity over lifetime module, Z axis.
    pub const VELOCITY_Z: u32 = 984_136;
}

/// Coordinate space a simulation or module works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// World coordinates.
    World,
    /// Coordinates relative to the owning node.
    #[default]
    Local,
}

impl Space {
    /// Integer tag handed to shaders (`0` = world, `1` = local).
    pub fn as_uniform(self) -> i32 {
        match self {
            Space::World => 0,
            Space::Local => 1,
        }
    }
}

/// Rotation that takes module-space vectors into simulation space.
///
/// Returns `None` when both spaces match, in which case no per-particle
/// transform is needed this tick.
pub fn calculate_transform(system_space: Space, module_space: Space, world: &Mat4) -> Option<Quat> {
    if system_space == module_space {
        return None;
    }
    let matrix = match system_space {
        Space::World => *world,
        Space::Local => world.inverse(),
    };
    let (_, rotation, _) = matrix.to_scale_rotation_translation();
    Some(rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn pseudo_random_stays_in_unit_range() {
        for seed in [0u32, 1, 23_541, 233_279, u32::MAX] {
            let value = pseudo_random(seed);
            assert!((0.0..1.0).contains(&value), "seed {seed} gave {value}");
        }
    }

    #[test]
    fn pseudo_random_is_pure() {
        assert_eq!(pseudo_random(42), pseudo_random(42));
        assert_ne!(
            pseudo_random(42 + ModuleRandSeed::LIMIT),
            pseudo_random(42 + ModuleRandSeed::SIZE)
        );
    }

    #[test]
    fn matching_spaces_need_no_transform() {
        let world = Mat4::from_rotation_y(1.0);
        assert!(calculate_transform(Space::World, Space::World, &world).is_none());
        assert!(calculate_transform(Space::Local, Space::Local, &world).is_none());
    }

    #[test]
    fn local_simulation_uses_inverse_rotation() {
        let world = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let to_world = calculate_transform(Space::World, Space::Local, &world).unwrap();
        let to_local = calculate_transform(Space::Local, Space::World, &world).unwrap();
        let v = Vec3::X;
        let round_trip = to_local * (to_world * v);
        assert!((round_trip - v).length() < 1e-5);
        assert!(((to_world * v) - Vec3::Y).length() < 1e-5);
    }
}
