//! Per-render-mode vertex attribute layouts.
//!
//! Every attribute occupies whole 4-byte slots of the interleaved vertex, so a
//! layout's stride is counted in `f32` slots. The base layout is six
//! attribute groups shared by all billboard modes; mesh mode appends four
//! more. Field positions inside the groups are fixed by the shader:
//!
//! | group | slots |
//! |---|---|
//! | `a_position_starttime` | position xyz, spawn time |
//! | `a_size_uv` | size xyz, corner u |
//! | `a_rotation_uv` | rotation xyz, corner v |
//! | `a_color` | rgba |
//! | `a_dir_life` | velocity xyz, lifetime |
//! | `a_rndSeed` | random seed |
//! | `a_texCoord` (mesh) | uv, frame index |
//! | `a_texCoord3` (mesh) | mesh position |
//! | `a_normal` (mesh) | mesh normal |
//! | `a_color1` (mesh) | packed RGBA8 mesh color |

use ember_particles::RenderMode;

/// Component format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// Four `f32`.
    Rgba32Float,
    /// Three `f32`.
    Rgb32Float,
    /// One `f32`.
    R32Float,
    /// Four normalized bytes packed into one slot.
    Rgba8Unorm,
}

impl VertexFormat {
    /// Number of 4-byte slots the format occupies.
    pub const fn slots(self) -> usize {
        match self {
            VertexFormat::Rgba32Float => 4,
            VertexFormat::Rgb32Float => 3,
            VertexFormat::R32Float | VertexFormat::Rgba8Unorm => 1,
        }
    }

    /// Size in bytes.
    pub const fn byte_size(self) -> usize {
        self.slots() * 4
    }
}

/// Named attribute of the particle vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader-facing name.
    pub name: &'static str,
    /// Component format.
    pub format: VertexFormat,
}

const fn attr(name: &'static str, format: VertexFormat) -> VertexAttribute {
    VertexAttribute { name, format }
}

/// Attribute names shared with the shader.
pub mod names {
    /// Position + spawn time.
    pub const POSITION_STARTTIME: &str = "a_position_starttime";
    /// Size + corner u.
    pub const SIZE_UV: &str = "a_size_uv";
    /// Rotation + corner v.
    pub const ROTATION_UV: &str = "a_rotation_uv";
    /// Color.
    pub const COLOR: &str = "a_color";
    /// Velocity + lifetime.
    pub const DIR_LIFE: &str = "a_dir_life";
    /// Random seed.
    pub const RANDOM_SEED: &str = "a_rndSeed";
    /// Mesh uv + frame index.
    pub const TEX_COORD: &str = "a_texCoord";
    /// Mesh vertex position.
    pub const TEX_COORD3: &str = "a_texCoord3";
    /// Mesh normal.
    pub const NORMAL: &str = "a_normal";
    /// Mesh vertex color.
    pub const COLOR1: &str = "a_color1";
}

const BASE_ATTRIBUTES: [VertexAttribute; 6] = [
    attr(names::POSITION_STARTTIME, VertexFormat::Rgba32Float),
    attr(names::SIZE_UV, VertexFormat::Rgba32Float),
    attr(names::ROTATION_UV, VertexFormat::Rgba32Float),
    attr(names::COLOR, VertexFormat::Rgba32Float),
    attr(names::DIR_LIFE, VertexFormat::Rgba32Float),
    attr(names::RANDOM_SEED, VertexFormat::R32Float),
];

const MESH_ATTRIBUTES: [VertexAttribute; 10] = [
    BASE_ATTRIBUTES[0],
    BASE_ATTRIBUTES[1],
    BASE_ATTRIBUTES[2],
    BASE_ATTRIBUTES[3],
    BASE_ATTRIBUTES[4],
    BASE_ATTRIBUTES[5],
    attr(names::TEX_COORD, VertexFormat::Rgb32Float),
    attr(names::TEX_COORD3, VertexFormat::Rgb32Float),
    attr(names::NORMAL, VertexFormat::Rgb32Float),
    attr(names::COLOR1, VertexFormat::Rgba8Unorm),
];

/// Slot offsets of the mesh-only fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshOffsets {
    /// uv (2 slots) then frame index.
    pub tex_coord: usize,
    /// Mesh vertex position (3 slots).
    pub mesh_position: usize,
    /// Mesh normal (3 slots).
    pub normal: usize,
    /// Packed RGBA8 color (1 slot).
    pub color: usize,
}

/// Slot offset of every particle field inside one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffsets {
    /// Position (3 slots).
    pub position: usize,
    /// Spawn time.
    pub start_time: usize,
    /// Size (3 slots).
    pub size: usize,
    /// Quad corner u.
    pub corner_u: usize,
    /// Euler rotation (3 slots).
    pub rotation: usize,
    /// Quad corner v.
    pub corner_v: usize,
    /// Color (4 slots).
    pub color: usize,
    /// Velocity (3 slots).
    pub direction: usize,
    /// Lifetime.
    pub lifetime: usize,
    /// Random seed.
    pub random_seed: usize,
    /// Present for mesh layouts only.
    pub mesh: Option<MeshOffsets>,
}

impl FieldOffsets {
    fn scan(attributes: &[VertexAttribute]) -> Self {
        let mut offsets = FieldOffsets {
            position: 0,
            start_time: 0,
            size: 0,
            corner_u: 0,
            rotation: 0,
            corner_v: 0,
            color: 0,
            direction: 0,
            lifetime: 0,
            random_seed: 0,
            mesh: None,
        };
        let mut mesh = MeshOffsets {
            tex_coord: 0,
            mesh_position: 0,
            normal: 0,
            color: 0,
        };
        let mut offset = 0;
        for attribute in attributes {
            match attribute.name {
                names::POSITION_STARTTIME => {
                    offsets.position = offset;
                    offsets.start_time = offset + 3;
                }
                names::SIZE_UV => {
                    offsets.size = offset;
                    offsets.corner_u = offset + 3;
                }
                names::ROTATION_UV => {
                    offsets.rotation = offset;
                    offsets.corner_v = offset + 3;
                }
                names::COLOR => offsets.color = offset,
                names::DIR_LIFE => {
                    offsets.direction = offset;
                    offsets.lifetime = offset + 3;
                }
                names::RANDOM_SEED => offsets.random_seed = offset,
                names::TEX_COORD => mesh.tex_coord = offset,
                names::TEX_COORD3 => mesh.mesh_position = offset,
                names::NORMAL => mesh.normal = offset,
                names::COLOR1 => {
                    mesh.color = offset;
                    offsets.mesh = Some(mesh);
                }
                _ => {}
            }
            offset += attribute.format.slots();
        }
        offsets
    }
}

/// Attribute list, stride and field offsets for one render mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    mode: RenderMode,
    attributes: &'static [VertexAttribute],
    stride: usize,
    offsets: FieldOffsets,
}

impl VertexLayout {
    /// Build the layout for `mode`. Every billboard flavour shares the base layout.
    pub fn for_mode(mode: RenderMode) -> Self {
        let attributes: &'static [VertexAttribute] = if mode.is_mesh() {
            &MESH_ATTRIBUTES
        } else {
            &BASE_ATTRIBUTES
        };
        Self {
            mode,
            attributes,
            stride: attributes.iter().map(|a| a.format.slots()).sum(),
            offsets: FieldOffsets::scan(attributes),
        }
    }

    /// Render mode the layout was built for.
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Ordered attributes.
    pub fn attributes(&self) -> &'static [VertexAttribute] {
        self.attributes
    }

    /// Slots per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes per vertex.
    pub fn byte_stride(&self) -> usize {
        self.stride * 4
    }

    /// Field offsets in slots.
    pub fn offsets(&self) -> &FieldOffsets {
        &self.offsets
    }

    /// Slots contributed by the mesh-only attribute group.
    pub fn mesh_extension_slots() -> usize {
        MESH_ATTRIBUTES[BASE_ATTRIBUTES.len()..]
            .iter()
            .map(|a| a.format.slots())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billboard_stride_is_21_slots() {
        let layout = VertexLayout::for_mode(RenderMode::Billboard);
        assert_eq!(layout.attributes().len(), 6);
        assert_eq!(layout.stride(), 21);
        assert_eq!(layout.byte_stride(), 84);
    }

    #[test]
    fn mesh_adds_extension_group() {
        let billboard = VertexLayout::for_mode(RenderMode::Billboard);
        let mesh = VertexLayout::for_mode(RenderMode::Mesh);
        assert_eq!(mesh.attributes().len(), 10);
        assert_eq!(VertexLayout::mesh_extension_slots(), 10);
        assert_eq!(mesh.stride(), billboard.stride() + 10);
    }

    #[test]
    fn base_offsets_follow_shader_convention() {
        let offsets = *VertexLayout::for_mode(RenderMode::StretchedBillboard).offsets();
        assert_eq!((offsets.position, offsets.start_time), (0, 3));
        assert_eq!((offsets.size, offsets.corner_u), (4, 7));
        assert_eq!((offsets.rotation, offsets.corner_v), (8, 11));
        assert_eq!(offsets.color, 12);
        assert_eq!((offsets.direction, offsets.lifetime), (16, 19));
        assert_eq!(offsets.random_seed, 20);
        assert_eq!(offsets.mesh, None);
    }

    #[test]
    fn mesh_offsets_follow_base_layout() {
        let mesh = VertexLayout::for_mode(RenderMode::Mesh).offsets().mesh.unwrap();
        assert_eq!(
            mesh,
            MeshOffsets {
                tex_coord: 21,
                mesh_position: 24,
                normal: 27,
                color: 30,
            }
        );
    }

    #[test]
    fn every_billboard_mode_shares_a_layout() {
        let base = VertexLayout::for_mode(RenderMode::Billboard);
        for mode in RenderMode::ALL.into_iter().filter(|m| !m.is_mesh()) {
            let layout = VertexLayout::for_mode(mode);
            assert_eq!(layout.stride(), base.stride());
            assert_eq!(layout.offsets(), base.offsets());
        }
    }
}
