//! The material capability the renderer drives, and an in-memory recorder.
//!
//! The renderer only looks uniforms and textures up by name; how they map to
//! bindings is the material's business.

use std::collections::BTreeMap;

use ember_core::SampleTable;
use glam::Vec4;
use tracing::warn;

/// Shader define: simulation runs in world space.
pub const CC_USE_WORLD_SPACE: &str = "CC_USE_WORLD_SPACE";
/// Shader define: [`ember_particles::RenderMode::shader_index`].
pub const CC_RENDER_MODE: &str = "CC_RENDER_MODE";

/// Module defines in bit order of [`ShaderDefines::feature_bits`].
pub const MODULE_DEFINES: [&str; 7] = [
    "SIZE_OVER_TIME_MODULE_ENABLE",
    "COLOR_OVER_TIME_MODULE_ENABLE",
    "FORCE_OVER_TIME_MODULE_ENABLE",
    "VELOCITY_OVER_TIME_MODULE_ENABLE",
    "LIMIT_VELOCITY_MODULE_ENABLE",
    "ROTATION_OVER_TIME_MODULE_ENABLE",
    "TEXTURE_ANIMATION_MODULE_ENABLE",
];

/// Opaque uniform or texture handle resolved by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniformHandle(pub u32);

/// Value written to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Scalar float.
    Float(f32),
    /// Scalar int.
    Int(i32),
    /// Four floats.
    Vec4(Vec4),
}

/// Value of one shader define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineValue {
    /// On/off flag.
    Bool(bool),
    /// Integer selector.
    Int(i32),
}

/// Feature flag map handed to [`Material::recompile_shaders`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    values: BTreeMap<&'static str, DefineValue>,
}

impl ShaderDefines {
    /// Set a flag.
    pub fn set_bool(&mut self, name: &'static str, value: bool) {
        self.values.insert(name, DefineValue::Bool(value));
    }

    /// Set an integer define.
    pub fn set_int(&mut self, name: &'static str, value: i32) {
        self.values.insert(name, DefineValue::Int(value));
    }

    /// Look a define up.
    pub fn get(&self, name: &str) -> Option<DefineValue> {
        self.values.get(name).copied()
    }

    /// Whether a flag is set to `true`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name) == Some(DefineValue::Bool(true))
    }

    /// Integer define, or zero.
    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(DefineValue::Int(value)) => value,
            _ => 0,
        }
    }

    /// Defines in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, DefineValue)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }

    /// Enabled module flags packed as bits in [`MODULE_DEFINES`] order.
    pub fn feature_bits(&self) -> u32 {
        MODULE_DEFINES
            .iter()
            .enumerate()
            .filter(|(_, name)| self.is_enabled(name))
            .fold(0, |bits, (bit, _)| bits | (1 << bit))
    }
}

/// Capability interface of the material/shader collaborator.
pub trait Material {
    /// Resolve a uniform or texture by name.
    fn uniform_handle(&self, name: &str) -> Option<UniformHandle>;

    /// Write a uniform value.
    fn set_uniform(&mut self, handle: UniformHandle, value: UniformValue);

    /// Bind a sample table to a texture uniform.
    fn bind_texture(&mut self, handle: UniformHandle, table: &SampleTable);

    /// Rebuild shader variants for `defines`.
    fn recompile_shaders(&mut self, defines: &ShaderDefines);
}

/// Every uniform name the particle shader declares.
pub const UNIFORM_NAMES: [&str; 19] = [
    "u_psTime",
    "u_delta",
    "u_worldRot",
    "scale",
    "frameTile_velLenScale",
    "u_size_mode",
    "u_color_mode",
    "u_force_mode",
    "u_velocity_mode",
    "u_rotation_mode",
    "u_texture_animation_mode",
    "u_force_space",
    "u_velocity_space",
    "size_over_time_tex0",
    "color_over_time_tex0",
    "force_over_time_tex0",
    "velocity_over_time_tex0",
    "rotation_over_time_tex0",
    "texture_animation_tex0",
];

/// Material that records every call in memory. Used by the headless driver
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingMaterial {
    uniforms: BTreeMap<&'static str, UniformValue>,
    textures: BTreeMap<&'static str, SampleTable>,
    defines: ShaderDefines,
    recompiles: u32,
}

impl RecordingMaterial {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn name_of(handle: UniformHandle) -> Option<&'static str> {
        UNIFORM_NAMES.get(handle.0 as usize).copied()
    }

    /// Last value written to `name`.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    /// Table bound to `name`.
    pub fn texture(&self, name: &str) -> Option<&SampleTable> {
        self.textures.get(name)
    }

    /// Defines of the last recompile.
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    /// Number of recompiles so far.
    pub fn recompile_count(&self) -> u32 {
        self.recompiles
    }
}

impl Material for RecordingMaterial {
    fn uniform_handle(&self, name: &str) -> Option<UniformHandle> {
        UNIFORM_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| UniformHandle(index as u32))
    }

    fn set_uniform(&mut self, handle: UniformHandle, value: UniformValue) {
        match Self::name_of(handle) {
            Some(name) => {
                self.uniforms.insert(name, value);
            }
            None => warn!(handle = handle.0, "unknown uniform handle"),
        }
    }

    fn bind_texture(&mut self, handle: UniformHandle, table: &SampleTable) {
        match Self::name_of(handle) {
            Some(name) => {
                self.textures.insert(name, table.clone());
            }
            None => warn!(handle = handle.0, "unknown texture handle"),
        }
    }

    fn recompile_shaders(&mut self, defines: &ShaderDefines) {
        self.defines = defines.clone();
        self.recompiles += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_bits_follow_module_order() {
        let mut defines = ShaderDefines::default();
        defines.set_bool("SIZE_OVER_TIME_MODULE_ENABLE", true);
        defines.set_bool("COLOR_OVER_TIME_MODULE_ENABLE", false);
        defines.set_bool("TEXTURE_ANIMATION_MODULE_ENABLE", true);
        defines.set_int(CC_RENDER_MODE, 4);
        assert_eq!(defines.feature_bits(), 0b100_0001);
        assert_eq!(defines.int(CC_RENDER_MODE), 4);
        assert!(!defines.is_enabled(CC_USE_WORLD_SPACE));
    }

    #[test]
    fn recorder_resolves_known_names_only() {
        let mut material = RecordingMaterial::new();
        let handle = material.uniform_handle("u_psTime").unwrap();
        material.set_uniform(handle, UniformValue::Float(2.5));
        assert_eq!(material.uniform("u_psTime"), Some(UniformValue::Float(2.5)));
        assert!(material.uniform_handle("u_missing").is_none());
    }

    #[test]
    fn recompile_snapshots_defines() {
        let mut material = RecordingMaterial::new();
        let mut defines = ShaderDefines::default();
        defines.set_bool(CC_USE_WORLD_SPACE, true);
        material.recompile_shaders(&defines);
        defines.set_bool(CC_USE_WORLD_SPACE, false);
        assert!(material.defines().is_enabled(CC_USE_WORLD_SPACE));
        assert_eq!(material.recompile_count(), 1);
    }
}
