//! ember - headless GPU particle simulation driver
//!
//! Loads a particle system config, steps it at a fixed rate and reports what
//! the renderer would submit each frame.

mod config;
mod headless;
mod offscreen;

use anyhow::{Context, Result};
use clap::Parser;
use ember_particles::{ModuleStage, ParticleSystemConfig, PropertySchema, RenderMode};
use ember_render::{ParticleSystem, RecordingMaterial, Transform};
use ember_testkit::{MetricsReportBuilder, MetricsSink, TestExecutionMetrics, TestResult};
use glam::Vec3;
use headless::{HeadlessConfig, RunSummary};
use offscreen::OffscreenTarget;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless particle system driver", long_about = None)]
struct Args {
    /// Particle system config (TOML); defaults to config/particles.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of fixed steps to simulate
    #[arg(long, default_value_t = 300)]
    ticks: u64,

    /// Step length in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Run seed for deterministic emission
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Override the configured render mode (billboard, stretched_billboard, ...)
    #[arg(long)]
    render_mode: Option<String>,

    /// Write a metrics report (JSON) to this path
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Write per-tick spawn/expire events (JSONL) to this path
    #[arg(long)]
    events: Option<PathBuf>,

    /// Print every module's property schema as JSON and exit
    #[arg(long)]
    describe_modules: bool,

    /// Draw every tick into an off-screen wgpu target
    #[arg(long)]
    gpu: bool,
}

#[derive(Serialize)]
struct ModuleDescription {
    name: &'static str,
    shader_define: &'static str,
    gpu_stage: bool,
    properties: &'static [PropertySchema],
}

fn main() -> Result<()> {
    // WARN by default, override with RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    info!("Starting ember v{}", env!("CARGO_PKG_VERSION"));

    let mut particle_config = config::load_particle_config(args.config.as_deref())?;
    if args.describe_modules {
        return describe_modules(&particle_config);
    }
    if let Some(name) = args.render_mode.as_deref() {
        particle_config.render_mode = RenderMode::from_name(name);
    }

    let cfg = HeadlessConfig {
        ticks: args.ticks,
        dt: args.dt,
        events: args.events.clone(),
    };
    let node = Transform::default();

    let (summary, render) = if args.gpu {
        let mut target = OffscreenTarget::new(640, 480)?;
        let mut system =
            ParticleSystem::new(particle_config, target.material(), &node, args.seed, 0)
                .context("invalid particle config")?;
        OffscreenTarget::look_at(&mut system, Vec3::new(0.0, 4.0, 12.0), Vec3::new(0.0, 3.0, 0.0), 640.0 / 480.0);
        let summary = headless::run(&mut system, &node, &cfg, |system| {
            target.render(system);
            Ok(())
        })?;
        let render = headless::render_metrics(&system, 0);
        (summary, render)
    } else {
        let mut system =
            ParticleSystem::new(particle_config, RecordingMaterial::new(), &node, args.seed, 0)
                .context("invalid particle config")?;
        let summary = headless::run(&mut system, &node, &cfg, |_| Ok(()))?;
        let recompiles = system.renderer().material().recompile_count();
        let render = headless::render_metrics(&system, recompiles);
        (summary, render)
    };

    if let Some(path) = args.metrics.as_ref() {
        write_metrics(path, summary, render)?;
    }
    Ok(())
}

fn describe_modules(config: &ParticleSystemConfig) -> Result<()> {
    let modules: Vec<_> = config
        .modules
        .iter()
        .into_iter()
        .map(|module| ModuleDescription {
            name: module.name(),
            shader_define: module.shader_define(),
            gpu_stage: module.stage() == ModuleStage::Gpu,
            properties: module.schema(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&modules)?);
    Ok(())
}

fn write_metrics(
    path: &std::path::Path,
    summary: RunSummary,
    render: ember_testkit::RenderMetrics,
) -> Result<()> {
    let ticks = summary.particles.ticks.max(1) as f64;
    let report = MetricsReportBuilder::new("ember_headless")
        .result(TestResult::Pass)
        .particles(summary.particles)
        .rendering(render)
        .execution(TestExecutionMetrics {
            duration_seconds: summary.elapsed.as_secs_f64(),
            avg_tick_time_us: Some(summary.elapsed.as_secs_f64() * 1e6 / ticks),
        })
        .build();
    MetricsSink::create(path)?.write(&report)?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}
