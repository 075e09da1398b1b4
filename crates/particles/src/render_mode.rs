use serde::{Deserialize, Serialize};
use tracing::warn;

/// Geometry particles are drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RenderModeRepr", rename_all = "snake_case")]
pub enum RenderMode {
    /// Camera-facing quad.
    #[default]
    Billboard,
    /// Quad stretched along its velocity.
    StretchedBillboard,
    /// Quad lying in the XZ plane.
    HorizontalBillboard,
    /// Quad rotating only around the Y axis.
    VerticalBillboard,
    /// Instanced mesh per particle.
    Mesh,
}

impl RenderMode {
    /// Every mode in shader index order.
    pub const ALL: [RenderMode; 5] = [
        RenderMode::Billboard,
        RenderMode::StretchedBillboard,
        RenderMode::HorizontalBillboard,
        RenderMode::VerticalBillboard,
        RenderMode::Mesh,
    ];

    /// Integer written into the `CC_RENDER_MODE` shader define.
    pub fn shader_index(self) -> i32 {
        match self {
            RenderMode::Billboard => 0,
            RenderMode::StretchedBillboard => 1,
            RenderMode::HorizontalBillboard => 2,
            RenderMode::VerticalBillboard => 3,
            RenderMode::Mesh => 4,
        }
    }

    /// Parse a raw index, falling back to [`RenderMode::Billboard`] with a warning.
    pub fn from_index(index: i64) -> Self {
        match index {
            0 => RenderMode::Billboard,
            1 => RenderMode::StretchedBillboard,
            2 => RenderMode::HorizontalBillboard,
            3 => RenderMode::VerticalBillboard,
            4 => RenderMode::Mesh,
            other => {
                warn!(render_mode = other, "particle render mode not supported, using billboard");
                RenderMode::Billboard
            }
        }
    }

    /// Parse a config name, falling back to [`RenderMode::Billboard`] with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "billboard" => RenderMode::Billboard,
            "stretched_billboard" => RenderMode::StretchedBillboard,
            "horizontal_billboard" => RenderMode::HorizontalBillboard,
            "vertical_billboard" => RenderMode::VerticalBillboard,
            "mesh" => RenderMode::Mesh,
            _ => {
                warn!(render_mode = name, "particle render mode not supported, using billboard");
                RenderMode::Billboard
            }
        }
    }

    /// Whether the mode draws the attached mesh instead of a quad.
    pub fn is_mesh(self) -> bool {
        self == RenderMode::Mesh
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RenderModeRepr {
    Index(i64),
    Name(String),
}

impl From<RenderModeRepr> for RenderMode {
    fn from(repr: RenderModeRepr) -> Self {
        match repr {
            RenderModeRepr::Index(index) => RenderMode::from_index(index),
            RenderModeRepr::Name(name) => RenderMode::from_name(&name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_modes_fall_back_to_billboard() {
        assert_eq!(RenderMode::from_index(42), RenderMode::Billboard);
        assert_eq!(RenderMode::from_name("ribbon"), RenderMode::Billboard);
    }

    #[test]
    fn names_and_indices_round_trip() {
        for mode in RenderMode::ALL {
            assert_eq!(RenderMode::from_index(mode.shader_index() as i64), mode);
        }
        assert_eq!(RenderMode::from_name("Stretched-Billboard"), RenderMode::StretchedBillboard);
    }

    #[test]
    fn deserializes_from_name_or_index() {
        let by_name: RenderMode = serde_json::from_str("\"mesh\"").unwrap();
        let by_index: RenderMode = serde_json::from_str("3").unwrap();
        let unknown: RenderMode = serde_json::from_str("\"trail\"").unwrap();
        assert_eq!(by_name, RenderMode::Mesh);
        assert_eq!(by_index, RenderMode::VerticalBillboard);
        assert_eq!(unknown, RenderMode::Billboard);
    }
}
