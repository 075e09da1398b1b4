#![warn(missing_docs)]
//! Particle rendering: the pooled vertex buffer, the material-driving
//! renderer, the per-system tick loop and the wgpu glue that draws it.

mod gpu;
mod layout;
mod material;
mod mesh;
mod node;
mod pool;
mod renderer;
mod system;

pub use gpu::{
    request_headless_device, upload_sample_table, vertex_format, GpuError, GpuParticleBuffers,
    GpuVertexLayout, ParticlePipeline, ParticleUniforms, WgpuMaterial,
};
pub use layout::{names, FieldOffsets, MeshOffsets, VertexAttribute, VertexFormat, VertexLayout};
pub use material::{
    DefineValue, Material, RecordingMaterial, ShaderDefines, UniformHandle, UniformValue,
    CC_RENDER_MODE, CC_USE_WORLD_SPACE, MODULE_DEFINES, UNIFORM_NAMES,
};
pub use mesh::{MeshError, ParticleMesh};
pub use node::{NodeTransform, Transform};
pub use pool::{ParticlePool, PoolError, Slot, Submission};
pub use renderer::{ParticleRenderer, SAMPLE_COUNT};
pub use system::{ParticleSystem, TickStats};
