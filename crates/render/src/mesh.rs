use glam::{Vec2, Vec3};
use thiserror::Error;

/// Invalid particle mesh data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    /// A mesh needs at least one vertex.
    #[error("particle mesh has no vertices")]
    Empty,
    /// Per-vertex arrays disagree in length.
    #[error("particle mesh attribute {attribute} has {found} entries, expected {expected}")]
    AttributeCount {
        /// Offending attribute.
        attribute: &'static str,
        /// Entries found.
        found: usize,
        /// Vertex count.
        expected: usize,
    },
    /// An index points past the vertex list.
    #[error("particle mesh index {index} out of range for {vertices} vertices")]
    IndexOutOfRange {
        /// Offending index.
        index: u32,
        /// Vertex count.
        vertices: usize,
    },
}

/// Geometry instanced per particle in mesh render mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    colors: Vec<[u8; 4]>,
    indices: Vec<u32>,
}

impl ParticleMesh {
    /// Validate and build a mesh.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        colors: Vec<[u8; 4]>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let expected = positions.len();
        if expected == 0 {
            return Err(MeshError::Empty);
        }
        for (attribute, found) in [
            ("normals", normals.len()),
            ("uvs", uvs.len()),
            ("colors", colors.len()),
        ] {
            if found != expected {
                return Err(MeshError::AttributeCount {
                    attribute,
                    found,
                    expected,
                });
            }
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= expected) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertices: expected,
            });
        }
        Ok(Self {
            positions,
            normals,
            uvs,
            colors,
            indices,
        })
    }

    /// Unit quad in the XY plane facing +Z.
    pub fn quad() -> Self {
        Self {
            positions: vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            uvs: QUAD_CORNERS.to_vec(),
            colors: vec![[255; 4]; 4],
            indices: QUAD_INDICES.to_vec(),
        }
    }

    /// Vertex count.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Vertex normals.
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Vertex uvs.
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    /// RGBA8 vertex colors.
    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    /// Triangle list indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl Default for ParticleMesh {
    fn default() -> Self {
        Self::quad()
    }
}

/// Billboard corner uvs: bottom-left, bottom-right, top-left, top-right.
pub(crate) const QUAD_CORNERS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
];

pub(crate) const QUAD_INDICES: [u32; 6] = [0, 1, 2, 3, 2, 1];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_valid() {
        let quad = ParticleMesh::quad();
        let rebuilt = ParticleMesh::new(
            quad.positions().to_vec(),
            quad.normals().to_vec(),
            quad.uvs().to_vec(),
            quad.colors().to_vec(),
            quad.indices().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, quad);
        assert_eq!(quad.vertex_count(), 4);
    }

    #[test]
    fn rejects_mismatched_attributes() {
        let err = ParticleMesh::new(
            vec![Vec3::ZERO; 3],
            vec![Vec3::Z; 2],
            vec![Vec2::ZERO; 3],
            vec![[0; 4]; 3],
            vec![0, 1, 2],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshError::AttributeCount {
                attribute: "normals",
                found: 2,
                expected: 3
            }
        );
    }

    #[test]
    fn rejects_bad_indices_and_empty_meshes() {
        assert_eq!(
            ParticleMesh::new(vec![], vec![], vec![], vec![], vec![]).unwrap_err(),
            MeshError::Empty
        );
        let err = ParticleMesh::new(
            vec![Vec3::ZERO],
            vec![Vec3::Z],
            vec![Vec2::ZERO],
            vec![[0; 4]],
            vec![0, 1],
        )
        .unwrap_err();
        assert_eq!(err, MeshError::IndexOutOfRange { index: 1, vertices: 1 });
    }
}
