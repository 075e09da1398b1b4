//! Static property descriptions for editor tooling.
//!
//! Every module publishes a `&'static [PropertySchema]` built at compile time;
//! tools list fields, types, defaults and UI hints from it without reflection.

use serde::Serialize;

/// Value type of a module property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// `bool`.
    Bool,
    /// `f32`.
    Float,
    /// `u32`.
    Int,
    /// [`ember_core::CurveRange`].
    CurveRange,
    /// [`ember_core::GradientRange`].
    GradientRange,
    /// [`ember_core::Space`].
    Space,
}

/// Description of one configurable module field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PropertySchema {
    /// Field name as it appears in config files.
    pub name: &'static str,
    /// Value type.
    pub kind: PropertyKind,
    /// Default rendered as config text.
    pub default: &'static str,
    /// Position in inspector listings.
    pub display_order: u32,
    /// Short help text.
    pub tooltip: &'static str,
    /// Suggested slider range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f32, f32)>,
}

impl PropertySchema {
    /// Schema entry without a slider range.
    pub const fn new(
        name: &'static str,
        kind: PropertyKind,
        default: &'static str,
        display_order: u32,
        tooltip: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            default,
            display_order,
            tooltip,
            range: None,
        }
    }

    /// Same entry with a slider range.
    pub const fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// Shared leading entry: every module can be toggled.
pub(crate) const ENABLE: PropertySchema = PropertySchema::new(
    "enabled",
    PropertyKind::Bool,
    "false",
    0,
    "Whether the module runs",
);
