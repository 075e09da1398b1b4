use std::{fs, path::Path};

use ember_core::Space;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::emitter::EmitterConfig;
use crate::module::{ModuleStack, SimulationMode};
use crate::render_mode::RenderMode;

/// Failure while loading a particle system configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse particle config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Parsed but violates a constraint.
    #[error("invalid particle config: {0}")]
    Invalid(String),
}

/// Full description of one particle system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    /// Maximum live particles; fixed for the lifetime of the system.
    pub capacity: u32,
    /// Space particles are simulated in.
    pub simulation_space: Space,
    /// Space the node scale is taken from.
    pub scale_space: Space,
    /// Geometry particles are drawn with.
    pub render_mode: RenderMode,
    /// Stretched billboards: stretch per unit of speed.
    pub velocity_scale: f32,
    /// Stretched billboards: stretch relative to size.
    pub length_scale: f32,
    /// Which side evaluates GPU-stage modules.
    pub simulation_mode: SimulationMode,
    /// Spawning.
    pub emitter: EmitterConfig,
    /// Per-tick modules.
    pub modules: ModuleStack,
}

impl Default for ParticleSystemConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            simulation_space: Space::Local,
            scale_space: Space::Local,
            render_mode: RenderMode::Billboard,
            velocity_scale: 1.0,
            length_scale: 1.0,
            simulation_mode: SimulationMode::Gpu,
            emitter: EmitterConfig::default(),
            modules: ModuleStack::default(),
        }
    }
}

impl ParticleSystemConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, returning every failure to the caller.
    pub fn load_strict(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path`, falling back to defaults on errors.
    pub fn load_lenient(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Particle config not found at {}. Using defaults",
                    path.display()
                );
                Self::default()
            }
            Err(err) => {
                warn!("Failed to load {}: {err}. Using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        let dampen = self.modules.limit_velocity.dampen;
        if !(0.0..=1.0).contains(&dampen) {
            return Err(ConfigError::Invalid(format!(
                "limit_velocity.dampen must be within [0, 1], got {dampen}"
            )));
        }
        if !(self.emitter.duration >= 0.0 && self.emitter.duration.is_finite()) {
            return Err(ConfigError::Invalid(
                "emitter.duration must be finite and not negative".into(),
            ));
        }
        let emitter = &self.emitter;
        for (name, range) in [
            ("rate_over_time", &emitter.rate_over_time),
            ("start_lifetime", &emitter.start_lifetime),
            ("start_speed", &emitter.start_speed),
            ("start_size", &emitter.start_size),
            ("start_rotation", &emitter.start_rotation),
        ] {
            if !range.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "emitter.{name} must be finite"
                )));
            }
        }
        let tiles = &self.modules.texture_animation;
        if tiles.num_tiles_x.checked_mul(tiles.num_tiles_y).is_none() {
            return Err(ConfigError::Invalid(format!(
                "texture_animation tile grid {}x{} is too large",
                tiles.num_tiles_x, tiles.num_tiles_y
            )));
        }
        Ok(())
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::CurveRange;

    #[test]
    fn empty_document_is_default() {
        let config = ParticleSystemConfig::from_toml_str("").unwrap();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.render_mode, RenderMode::Billboard);
        assert!(!config.modules.limit_velocity.enabled);
    }

    #[test]
    fn parses_modules_and_render_mode() {
        let text = r#"
capacity = 64
simulation_space = "world"
render_mode = "mesh"

[modules.limit_velocity]
enabled = true
dampen = 0.5
limit = { mode = "constant", value = 5.0 }
"#;
        let config = ParticleSystemConfig::from_toml_str(text).unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.simulation_space, Space::World);
        assert_eq!(config.render_mode, RenderMode::Mesh);
        let limit = &config.modules.limit_velocity;
        assert!(limit.enabled);
        assert_eq!(limit.dampen, 0.5);
        assert_eq!(limit.limit, CurveRange::constant(5.0));
    }

    #[test]
    fn unknown_render_mode_falls_back() {
        let config = ParticleSystemConfig::from_toml_str("render_mode = \"trail\"").unwrap();
        assert_eq!(config.render_mode, RenderMode::Billboard);
    }

    #[test]
    fn rejects_zero_capacity_and_bad_dampen() {
        assert!(matches!(
            ParticleSystemConfig::from_toml_str("capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ParticleSystemConfig::from_toml_str("[modules.limit_velocity]\ndampen = -0.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ParticleSystemConfig::from_toml_str("capacity = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_infinite_start_lifetime() {
        let text = r#"
[emitter]
start_lifetime = { mode = "constant", value = inf }
"#;
        let err = ParticleSystemConfig::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("start_lifetime"));
    }

    #[test]
    fn rejects_overflowing_tile_grid() {
        let text = "[modules.texture_animation]\nnum_tiles_x = 4294967295\nnum_tiles_y = 2";
        assert!(matches!(
            ParticleSystemConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn lenient_load_of_missing_file_uses_defaults() {
        let config = ParticleSystemConfig::load_lenient(Path::new("does/not/exist.toml"));
        assert_eq!(config.capacity, ParticleSystemConfig::default().capacity);
    }

    #[test]
    fn toml_round_trip_keeps_capacity() {
        let mut config = ParticleSystemConfig::default();
        config.capacity = 12;
        let text = config.to_toml_string().unwrap();
        assert_eq!(ParticleSystemConfig::from_toml_str(&text).unwrap().capacity, 12);
    }
}
