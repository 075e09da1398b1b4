//! Fixed-capacity particle pool and its interleaved vertex buffer.
//!
//! Live particles occupy records `[0, live_count)` of the buffer. A record is
//! one particle's vertices (four quad corners for billboards, one per mesh
//! vertex in mesh mode), each `layout.stride()` slots wide. Expired records
//! are replaced by the last live record, so particle order is not stable.
//!
//! A CPU mirror of every live [`Particle`] is kept alongside the buffer; it is
//! what CPU-stage modules mutate and what a render mode change re-encodes.
//! Nothing in [`ParticlePool::allocate`], [`Slot::commit`],
//! [`ParticlePool::animate_live`], [`ParticlePool::tick`] or
//! [`ParticlePool::submit`] allocates.

use ember_particles::{Particle, RenderMode};
use thiserror::Error;
use tracing::debug;

use crate::layout::VertexLayout;
use crate::mesh::{ParticleMesh, QUAD_CORNERS, QUAD_INDICES};

/// `pseudo_random` only depends on the seed modulo this, and every value
/// below it is exact in an `f32`.
const SEED_PERIOD: u32 = 233_280;

/// Pool geometry that cannot be indexed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Index values for the full capacity would not fit in `u32`.
    #[error("{capacity} particles of {vertices} vertices exceed the u32 index range")]
    IndexRange {
        /// Requested capacity.
        capacity: usize,
        /// Vertices per particle record.
        vertices: usize,
    },
}

fn check_index_range(capacity: usize, vertices: usize) -> Result<(), PoolError> {
    let fits = (capacity as u64)
        .checked_mul(vertices as u64)
        .is_some_and(|total| total <= u64::from(u32::MAX) + 1);
    if fits {
        Ok(())
    } else {
        Err(PoolError::IndexRange { capacity, vertices })
    }
}

/// Particle storage for one system.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    capacity: usize,
    live: usize,
    layout: VertexLayout,
    mesh: ParticleMesh,
    record_len: usize,
    generation: u64,
    data: Vec<f32>,
    indices: Vec<u32>,
    particles: Vec<Particle>,
}

/// Read-only view handed to the GPU submission step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Submission<'a> {
    /// Whole vertex buffer; only the first `live_count` records are valid.
    pub buffer: &'a [f32],
    /// Index buffer for the full capacity.
    pub indices: &'a [u32],
    /// Live particles.
    pub live_count: usize,
    /// Layout the buffer is encoded with.
    pub layout: &'a VertexLayout,
    /// Vertices per particle record.
    pub vertices_per_particle: usize,
    /// Indices per particle.
    pub indices_per_particle: usize,
}

impl<'a> Submission<'a> {
    /// Vertices of live particles.
    pub fn vertex_count(&self) -> usize {
        self.live_count * self.vertices_per_particle
    }

    /// Indices covering live particles.
    pub fn index_count(&self) -> usize {
        self.live_count * self.indices_per_particle
    }

    /// Slots of live records.
    pub fn live_vertices(&self) -> &'a [f32] {
        &self.buffer[..self.vertex_count() * self.layout.stride()]
    }

    /// Bytes of live records, ready for upload.
    pub fn live_vertex_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.live_vertices())
    }

    /// Indices of live particles.
    pub fn live_indices(&self) -> &'a [u32] {
        &self.indices[..self.index_count()]
    }
}

/// A free record reserved by [`ParticlePool::allocate`].
#[derive(Debug)]
pub struct Slot<'a> {
    pool: &'a mut ParticlePool,
}

impl Slot<'_> {
    /// Record index the particle will occupy.
    pub fn index(&self) -> usize {
        self.pool.live
    }

    /// Write `particle` spawned at `time` into the record and make it live.
    pub fn commit(self, mut particle: Particle, time: f32) {
        let pool = self.pool;
        let index = pool.live;
        particle.spawn_time = time;
        pool.particles[index] = particle;
        pool.encode(index);
        pool.live += 1;
    }
}

impl ParticlePool {
    /// Pool for `capacity` particles. `mesh` is used in mesh mode; a unit
    /// quad stands in when none is given.
    pub fn new(
        capacity: usize,
        mode: RenderMode,
        mesh: Option<ParticleMesh>,
    ) -> Result<Self, PoolError> {
        let mut pool = Self {
            capacity,
            live: 0,
            layout: VertexLayout::for_mode(mode),
            mesh: mesh.unwrap_or_default(),
            record_len: 0,
            generation: 0,
            data: Vec::new(),
            indices: Vec::new(),
            particles: Vec::new(),
        };
        check_index_range(capacity, pool.vertices_per_particle())?;
        pool.particles = vec![Particle::default(); capacity];
        pool.rebuild();
        Ok(pool)
    }

    /// Maximum live particles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live particles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Current layout.
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Slots per particle record.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Bumped whenever the vertex or index buffers are rebuilt; GPU copies
    /// made under an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Vertices per particle.
    pub fn vertices_per_particle(&self) -> usize {
        if self.layout.mode().is_mesh() {
            self.mesh.vertex_count()
        } else {
            QUAD_CORNERS.len()
        }
    }

    fn indices_per_particle(&self) -> usize {
        if self.layout.mode().is_mesh() {
            self.mesh.indices().len()
        } else {
            QUAD_INDICES.len()
        }
    }

    /// Mirror of live particles.
    pub fn particles(&self) -> &[Particle] {
        &self.particles[..self.live]
    }

    /// Reserve the next free record, or `None` when the pool is full.
    pub fn allocate(&mut self) -> Option<Slot<'_>> {
        if self.live >= self.capacity {
            return None;
        }
        Some(Slot { pool: self })
    }

    /// Let `f` mutate every live particle, then re-encode their records.
    pub fn animate_live(&mut self, mut f: impl FnMut(&mut Particle)) {
        for particle in &mut self.particles[..self.live] {
            f(particle);
        }
        for index in 0..self.live {
            self.encode(index);
        }
    }

    /// Remove every particle older than its lifetime at `now`.
    ///
    /// Returns the number removed. The expired record is overwritten by the
    /// last live one and the same index is examined again.
    pub fn tick(&mut self, now: f32) -> usize {
        let offsets = *self.layout.offsets();
        let len = self.record_len;
        let mut removed = 0;
        let mut index = 0;
        while index < self.live {
            let base = index * len;
            let start_time = self.data[base + offsets.start_time];
            let lifetime = self.data[base + offsets.lifetime];
            if now - start_time > lifetime {
                let last = self.live - 1;
                if index != last {
                    self.data.copy_within(last * len..(last + 1) * len, base);
                    self.particles[index] = self.particles[last];
                }
                self.live -= 1;
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Switch layouts and re-encode every live particle under the new one.
    ///
    /// Grows the buffer when the new records are longer; not a per-frame path.
    /// On error the pool keeps its current layout and mesh.
    pub fn repack(&mut self, mode: RenderMode, mesh: Option<ParticleMesh>) -> Result<(), PoolError> {
        let vertices = if !mode.is_mesh() {
            QUAD_CORNERS.len()
        } else if let Some(mesh) = &mesh {
            mesh.vertex_count()
        } else {
            self.mesh.vertex_count()
        };
        check_index_range(self.capacity, vertices)?;

        self.layout = VertexLayout::for_mode(mode);
        if let Some(mesh) = mesh {
            self.mesh = mesh;
        }
        self.rebuild();
        for index in 0..self.live {
            self.encode(index);
        }
        debug!(
            render_mode = ?mode,
            stride = self.layout.stride(),
            live = self.live,
            "particle pool repacked"
        );
        Ok(())
    }

    /// Drop every live particle.
    pub fn clear(&mut self) {
        self.live = 0;
    }

    /// Current buffer and live count.
    pub fn submit(&self) -> Submission<'_> {
        Submission {
            buffer: &self.data,
            indices: &self.indices,
            live_count: self.live,
            layout: &self.layout,
            vertices_per_particle: self.vertices_per_particle(),
            indices_per_particle: self.indices_per_particle(),
        }
    }

    fn rebuild(&mut self) {
        self.generation += 1;
        let vertices = self.vertices_per_particle();
        self.record_len = self.layout.stride() * vertices;
        self.data.clear();
        self.data.resize(self.capacity * self.record_len, 0.0);

        let template: &[u32] = if self.layout.mode().is_mesh() {
            self.mesh.indices()
        } else {
            &QUAD_INDICES
        };
        self.indices.clear();
        self.indices.reserve(self.capacity * template.len());
        for particle in 0..self.capacity {
            let first = (particle * vertices) as u32;
            self.indices.extend(template.iter().map(|i| first + i));
        }
    }

    fn encode(&mut self, index: usize) {
        let particle = &self.particles[index];
        let stride = self.layout.stride();
        let offsets = self.layout.offsets();
        let is_mesh = self.layout.mode().is_mesh();
        let vertices = self.vertices_per_particle();
        let record = &mut self.data[index * self.record_len..(index + 1) * self.record_len];
        let seed = (particle.random_seed % SEED_PERIOD) as f32;

        for (vertex, out) in record.chunks_exact_mut(stride).take(vertices).enumerate() {
            let corner = if is_mesh {
                self.mesh.uvs()[vertex]
            } else {
                QUAD_CORNERS[vertex]
            };
            out[offsets.position..offsets.position + 3].copy_from_slice(&particle.position.to_array());
            out[offsets.start_time] = particle.spawn_time;
            out[offsets.size..offsets.size + 3].copy_from_slice(&particle.size.to_array());
            out[offsets.corner_u] = corner.x;
            out[offsets.rotation..offsets.rotation + 3].copy_from_slice(&particle.rotation.to_array());
            out[offsets.corner_v] = corner.y;
            out[offsets.color..offsets.color + 4].copy_from_slice(&particle.color.to_array());
            out[offsets.direction..offsets.direction + 3]
                .copy_from_slice(&particle.ultimate_velocity.to_array());
            out[offsets.lifetime] = particle.start_lifetime;
            out[offsets.random_seed] = seed;

            if let Some(mesh) = offsets.mesh {
                out[mesh.tex_coord] = corner.x;
                out[mesh.tex_coord + 1] = corner.y;
                out[mesh.tex_coord + 2] = particle.frame_index;
                out[mesh.mesh_position..mesh.mesh_position + 3]
                    .copy_from_slice(&self.mesh.positions()[vertex].to_array());
                out[mesh.normal..mesh.normal + 3]
                    .copy_from_slice(&self.mesh.normals()[vertex].to_array());
                out[mesh.color] = f32::from_bits(u32::from_le_bytes(self.mesh.colors()[vertex]));
            }
        }
    }
}
