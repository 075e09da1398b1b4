use ember_core::{scoped_rng, SimTick};
use ember_particles::{ConfigError, Emitter, ParticleSystemConfig, RenderMode};
use tracing::info;

use crate::material::Material;
use crate::mesh::ParticleMesh;
use crate::node::NodeTransform;
use crate::pool::{PoolError, Submission};
use crate::renderer::ParticleRenderer;

/// Outcome of one [`ParticleSystem::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Tick that just ran.
    pub tick: SimTick,
    /// Particles spawned this tick.
    pub spawned: u32,
    /// Particles that expired this tick.
    pub expired: usize,
    /// Live particles after the tick.
    pub live: usize,
}

/// Emitter, modules and renderer of one particle system.
///
/// Randomness is derived per tick from `(run_seed, system_id, tick)`, so a
/// run replays identically for the same seed and step sequence.
#[derive(Debug)]
pub struct ParticleSystem<M: Material> {
    config: ParticleSystemConfig,
    emitter: Emitter,
    renderer: ParticleRenderer<M>,
    run_seed: u64,
    system_id: u64,
    tick: SimTick,
}

impl<M: Material> ParticleSystem<M> {
    /// Validate `config` and set up the renderer.
    pub fn new(
        config: ParticleSystemConfig,
        material: M,
        node: &impl NodeTransform,
        run_seed: u64,
        system_id: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let renderer = ParticleRenderer::new(&config, material, node)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        info!(
            system_id,
            capacity = config.capacity,
            render_mode = ?config.render_mode,
            simulation_mode = ?config.simulation_mode,
            "particle system created"
        );
        Ok(Self {
            emitter: Emitter::new(config.emitter.clone()),
            config,
            renderer,
            run_seed,
            system_id,
            tick: SimTick::ZERO,
        })
    }

    /// Advance by `dt`: emit, animate, expire.
    pub fn tick(&mut self, dt: f32, node: &impl NodeTransform) -> TickStats {
        let tick = self.tick;
        let mut rng = scoped_rng(self.run_seed, self.system_id, tick);
        self.renderer.begin_frame(dt);
        let now = self.renderer.time();
        let world = node.world_matrix();

        let renderer = &mut self.renderer;
        let spawned = self.emitter.emit(
            dt,
            now,
            &mut rng,
            &world,
            self.config.simulation_space,
            |particle| renderer.spawn(particle),
        );
        let before = renderer.particle_count();
        let live = renderer.update(
            dt,
            node,
            &mut self.config.modules,
            self.config.emitter.gravity_modifier,
        );

        self.tick = tick.advance(1);
        TickStats {
            tick,
            spawned,
            expired: before - live,
            live,
        }
    }

    /// Toggle a module by name and rebuild the material. Returns `false` for
    /// unknown names.
    pub fn set_module_enabled(&mut self, name: &str, enabled: bool, node: &impl NodeTransform) -> bool {
        if !self.config.modules.set_enabled(name, enabled) {
            return false;
        }
        self.renderer.update_material_params(node, &self.config.modules);
        true
    }

    /// Switch render mode, keeping live particles.
    pub fn set_render_mode(
        &mut self,
        mode: RenderMode,
        mesh: Option<ParticleMesh>,
        node: &impl NodeTransform,
    ) -> Result<(), PoolError> {
        self.renderer
            .set_render_mode(mode, mesh, node, &self.config.modules)?;
        self.config.render_mode = mode;
        Ok(())
    }

    /// Drop live particles and rewind the emitter.
    pub fn clear(&mut self) {
        self.renderer.clear();
        self.emitter.reset();
    }

    /// GPU handoff.
    pub fn submit(&self) -> Submission<'_> {
        self.renderer.submit()
    }

    /// Live particles.
    pub fn particle_count(&self) -> usize {
        self.renderer.particle_count()
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> SimTick {
        self.tick
    }

    /// Current configuration.
    pub fn config(&self) -> &ParticleSystemConfig {
        &self.config
    }

    /// Renderer.
    pub fn renderer(&self) -> &ParticleRenderer<M> {
        &self.renderer
    }

    /// Mutable renderer.
    pub fn renderer_mut(&mut self) -> &mut ParticleRenderer<M> {
        &mut self.renderer
    }
}
