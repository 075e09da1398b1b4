use glam::{Mat4, Quat, Vec3};

/// Read-only view of the scene node a particle system is attached to.
pub trait NodeTransform {
    /// Local-to-world matrix.
    fn world_matrix(&self) -> Mat4;

    /// World rotation.
    fn world_rotation(&self) -> Quat;

    /// Scale relative to the parent.
    fn local_scale(&self) -> Vec3;

    /// Accumulated world scale.
    fn world_scale(&self) -> Vec3;
}

/// Standalone node: a local transform under an optional parent matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation relative to the parent.
    pub translation: Vec3,
    /// Rotation relative to the parent.
    pub rotation: Quat,
    /// Scale relative to the parent.
    pub scale: Vec3,
    /// Parent local-to-world matrix.
    pub parent: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    /// Root node at `translation`.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }
}

impl NodeTransform for Transform {
    fn world_matrix(&self) -> Mat4 {
        self.parent * Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    fn world_rotation(&self) -> Quat {
        let (_, rotation, _) = self.world_matrix().to_scale_rotation_translation();
        rotation
    }

    fn local_scale(&self) -> Vec3 {
        self.scale
    }

    fn world_scale(&self) -> Vec3 {
        let (scale, _, _) = self.world_matrix().to_scale_rotation_translation();
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_scale_includes_parent() {
        let node = Transform {
            scale: Vec3::splat(2.0),
            parent: Mat4::from_scale(Vec3::splat(3.0)),
            ..Transform::default()
        };
        assert_eq!(node.local_scale(), Vec3::splat(2.0));
        assert!((node.world_scale() - Vec3::splat(6.0)).length() < 1e-5);
    }
}
