#![warn(missing_docs)]
//! Particle records, the per-tick modules that animate them, the emitter that
//! spawns them and the serializable system configuration.

mod config;
mod emitter;
pub mod module;
mod particle;
mod render_mode;
mod schema;

pub use config::{ConfigError, ParticleSystemConfig};
pub use emitter::{Emitter, EmitterConfig, EmitterShape};
pub use module::{
    dampen_beyond_limit, ColorOverLifetime, ForceOverLifetime, GpuBinding, LimitVelocity,
    ModuleStack, ModuleStage, ParticleModule, RotationOverLifetime, SimulationMode,
    SizeOverLifetime, TextureAnimation, VelocityOverLifetime,
};
pub use particle::Particle;
pub use render_mode::RenderMode;
pub use schema::{PropertyKind, PropertySchema};
