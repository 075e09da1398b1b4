use anyhow::{Context, Result};
use ember_particles::ParticleSystemConfig;
use std::path::Path;

pub const DEFAULT_PARTICLES_PATH: &str = "config/particles.toml";

/// Load the particle system config.
///
/// An explicit path must load cleanly; the default path falls back to
/// built-in defaults with a warning.
pub fn load_particle_config(path: Option<&Path>) -> Result<ParticleSystemConfig> {
    match path {
        Some(path) => ParticleSystemConfig::load_strict(path)
            .with_context(|| format!("failed to load particle config from {}", path.display())),
        None => Ok(ParticleSystemConfig::load_lenient(Path::new(
            DEFAULT_PARTICLES_PATH,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_PARTICLES_PATH);
        let config = load_particle_config(Some(&path)).expect("shipped config loads");
        assert!(config.modules.limit_velocity.enabled);
        assert_eq!(config.capacity, 512);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_particle_config(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
