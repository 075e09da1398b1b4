//! Fixed-step headless driver shared by the CPU-only and GPU runs.

use anyhow::Result;
use ember_core::SimTick;
use ember_render::{Material, NodeTransform, ParticleSystem};
use ember_testkit::{EventRecord, JsonlSink, ParticleMetrics, RenderMetrics};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct HeadlessConfig {
    pub ticks: u64,
    pub dt: f32,
    pub events: Option<PathBuf>,
}

pub struct RunSummary {
    pub particles: ParticleMetrics,
    pub elapsed: Duration,
}

/// Step `system` `cfg.ticks` times, calling `after_tick` after each step.
pub fn run<M: Material>(
    system: &mut ParticleSystem<M>,
    node: &impl NodeTransform,
    cfg: &HeadlessConfig,
    mut after_tick: impl FnMut(&mut ParticleSystem<M>) -> Result<()>,
) -> Result<RunSummary> {
    let mut sink = cfg.events.as_ref().map(JsonlSink::create).transpose()?;
    let capacity = system.config().capacity as usize;
    let mut metrics = ParticleMetrics {
        capacity,
        ..ParticleMetrics::default()
    };

    let started = Instant::now();
    for _ in 0..cfg.ticks {
        let stats = system.tick(cfg.dt, node);
        after_tick(system)?;

        metrics.ticks += 1;
        metrics.total_spawned += stats.spawned as usize;
        metrics.total_expired += stats.expired;
        metrics.peak_live = metrics.peak_live.max(stats.live);
        if stats.live == capacity {
            metrics.saturated_ticks += 1;
        }

        if let Some(sink) = sink.as_mut() {
            if stats.spawned > 0 {
                write_event(sink, stats.tick, "spawn", &stats.spawned.to_string())?;
            }
            if stats.expired > 0 {
                write_event(sink, stats.tick, "expire", &stats.expired.to_string())?;
            }
        }
    }
    let elapsed = started.elapsed();
    metrics.final_live = system.particle_count();

    if let Some(sink) = sink {
        debug!(events = sink.written(), "event log complete");
        sink.finish()?;
    }
    info!(
        ticks = metrics.ticks,
        spawned = metrics.total_spawned,
        expired = metrics.total_expired,
        live = metrics.final_live,
        "headless run finished"
    );
    Ok(RunSummary {
        particles: metrics,
        elapsed,
    })
}

fn write_event(sink: &mut JsonlSink, tick: SimTick, kind: &str, payload: &str) -> Result<()> {
    sink.write(&EventRecord {
        tick,
        kind,
        payload,
    })
}

/// Snapshot of what the last tick submitted.
pub fn render_metrics<M: Material>(system: &ParticleSystem<M>, shader_recompiles: u32) -> RenderMetrics {
    let submission = system.submit();
    RenderMetrics {
        render_mode: format!("{:?}", system.renderer().render_mode()),
        stride_slots: submission.layout.stride(),
        vertices: submission.vertex_count(),
        indices: submission.index_count(),
        vertex_bytes: submission.live_vertex_bytes().len(),
        shader_recompiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::CurveRange;
    use ember_particles::ParticleSystemConfig;
    use ember_render::{RecordingMaterial, Transform};

    fn system(capacity: u32) -> ParticleSystem<RecordingMaterial> {
        let mut config = ParticleSystemConfig {
            capacity,
            ..ParticleSystemConfig::default()
        };
        config.emitter.rate_over_time = CurveRange::constant(20.0);
        config.emitter.start_lifetime = CurveRange::constant(0.5);
        ParticleSystem::new(config, RecordingMaterial::new(), &Transform::default(), 1, 0)
            .expect("valid config")
    }

    #[test]
    fn counts_balance_over_a_run() {
        let mut system = system(64);
        let cfg = HeadlessConfig {
            ticks: 60,
            dt: 0.05,
            events: None,
        };
        let mut calls = 0;
        let summary = run(&mut system, &Transform::default(), &cfg, |_| {
            calls += 1;
            Ok(())
        })
        .unwrap();

        let p = summary.particles;
        assert_eq!(calls, 60);
        assert_eq!(p.ticks, 60);
        assert_eq!(p.total_spawned - p.total_expired, p.final_live);
        assert!(p.peak_live <= p.capacity);
        assert!(p.total_expired > 0);
    }

    #[test]
    fn small_pool_reports_saturation() {
        let mut system = system(2);
        let cfg = HeadlessConfig {
            ticks: 10,
            dt: 0.05,
            events: None,
        };
        let summary = run(&mut system, &Transform::default(), &cfg, |_| Ok(())).unwrap();
        assert!(summary.particles.saturated_ticks > 0);
        assert_eq!(summary.particles.peak_live, 2);
    }

    #[test]
    fn render_metrics_follow_submission() {
        let mut system = system(16);
        system.tick(0.1, &Transform::default());
        let metrics = render_metrics(&system, 1);
        assert_eq!(metrics.stride_slots, 21);
        assert_eq!(metrics.vertices, system.particle_count() * 4);
        assert_eq!(metrics.indices, system.particle_count() * 6);
        assert_eq!(metrics.vertex_bytes, metrics.vertices * 21 * 4);
    }
}
