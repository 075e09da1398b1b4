//! Spawning: emission rate, start values and emitter shapes.

use std::f32::consts::TAU;

use ember_core::{CurveRange, GradientRange, Space};
use glam::{Mat4, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::particle::Particle;

/// Volume particles are spawned from. Directions point along +Y unless the
/// shape is radial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterShape {
    /// Origin, emitting straight up.
    Point,
    /// Inside a sphere, emitting outward.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// Inside the upper half of a sphere, emitting outward.
    Hemisphere {
        /// Hemisphere radius.
        radius: f32,
    },
    /// Base disk of a cone opening upward.
    Cone {
        /// Half-angle in degrees.
        angle: f32,
        /// Base radius.
        radius: f32,
    },
    /// Inside an axis-aligned box, emitting straight up.
    Box {
        /// Half size on each axis.
        half_extents: Vec3,
    },
}

impl Default for EmitterShape {
    fn default() -> Self {
        EmitterShape::Cone {
            angle: 25.0,
            radius: 1.0,
        }
    }
}

fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let phi: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

impl EmitterShape {
    /// Sample a local spawn position and unit direction.
    pub fn sample(&self, rng: &mut impl Rng) -> (Vec3, Vec3) {
        match *self {
            EmitterShape::Point => (Vec3::ZERO, Vec3::Y),
            EmitterShape::Sphere { radius } => {
                let dir = random_unit_vector(rng);
                (dir * radius * rng.gen::<f32>().cbrt(), dir)
            }
            EmitterShape::Hemisphere { radius } => {
                let mut dir = random_unit_vector(rng);
                dir.y = dir.y.abs();
                (dir * radius * rng.gen::<f32>().cbrt(), dir)
            }
            EmitterShape::Cone { angle, radius } => {
                let phi: f32 = rng.gen_range(0.0..TAU);
                let frac = rng.gen::<f32>().sqrt();
                let tilt = angle.to_radians() * frac;
                let position = Vec3::new(phi.cos(), 0.0, phi.sin()) * radius * frac;
                let dir = Vec3::new(phi.cos() * tilt.sin(), tilt.cos(), phi.sin() * tilt.sin());
                (position, dir)
            }
            EmitterShape::Box { half_extents } => {
                let unit = Vec3::new(
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                );
                (unit * half_extents, Vec3::Y)
            }
        }
    }
}

/// Emission settings and start values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Particles per second over the loop.
    pub rate_over_time: CurveRange,
    /// Loop length in seconds.
    pub duration: f32,
    /// Restart after `duration`.
    pub looping: bool,
    /// Lifetime in seconds.
    pub start_lifetime: CurveRange,
    /// Initial speed along the shape direction.
    pub start_speed: CurveRange,
    /// Uniform initial size.
    pub start_size: CurveRange,
    /// Initial rotation around the view axis, radians.
    pub start_rotation: CurveRange,
    /// Initial color.
    pub start_color: GradientRange,
    /// Spawn volume.
    pub shape: EmitterShape,
    /// Scale of 9.8 m/s² applied downward.
    pub gravity_modifier: f32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            rate_over_time: CurveRange::constant(10.0),
            duration: 5.0,
            looping: true,
            start_lifetime: CurveRange::constant(5.0),
            start_speed: CurveRange::constant(5.0),
            start_size: CurveRange::constant(1.0),
            start_rotation: CurveRange::constant(0.0),
            start_color: GradientRange::default(),
            shape: EmitterShape::default(),
            gravity_modifier: 0.0,
        }
    }
}

/// Stateful emission clock for one system.
#[derive(Debug, Clone)]
pub struct Emitter {
    config: EmitterConfig,
    elapsed: f32,
    accumulator: f32,
}

impl Emitter {
    /// New emitter at time zero.
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            elapsed: 0.0,
            accumulator: 0.0,
        }
    }

    /// Emission settings.
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Non-looping emitter past its duration.
    pub fn is_finished(&self) -> bool {
        !self.config.looping && self.elapsed >= self.config.duration
    }

    /// Rewind to time zero.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.accumulator = 0.0;
    }

    fn loop_progress(&self) -> f32 {
        if self.config.duration <= 0.0 {
            return 0.0;
        }
        (self.elapsed % self.config.duration) / self.config.duration
    }

    /// Advance the emission clock by `dt` and hand every new particle to `spawn`.
    ///
    /// `spawn` returns `false` when the pool is exhausted; emission stops for
    /// this tick and the backlog is dropped. Returns the number spawned.
    pub fn emit(
        &mut self,
        dt: f32,
        now: f32,
        rng: &mut impl Rng,
        world: &Mat4,
        space: Space,
        mut spawn: impl FnMut(Particle) -> bool,
    ) -> u32 {
        if self.is_finished() {
            return 0;
        }
        let t = self.loop_progress();
        let rate = self.config.rate_over_time.evaluate(t, rng.gen());
        self.accumulator += rate.max(0.0) * dt;
        self.elapsed += dt;

        let mut spawned = 0;
        while self.accumulator >= 1.0 {
            self.accumulator -= 1.0;
            let particle = self.spawn_one(t, now, rng, world, space);
            if !spawn(particle) {
                self.accumulator = self.accumulator.fract();
                break;
            }
            spawned += 1;
        }
        spawned
    }

    fn spawn_one(
        &self,
        t: f32,
        now: f32,
        rng: &mut impl Rng,
        world: &Mat4,
        space: Space,
    ) -> Particle {
        let (mut position, mut direction) = self.config.shape.sample(rng);
        if space == Space::World {
            position = world.transform_point3(position);
            direction = world.transform_vector3(direction).normalize_or_zero();
        }
        let lifetime = self.config.start_lifetime.evaluate(t, rng.gen());
        let speed = self.config.start_speed.evaluate(t, rng.gen());
        let size = Vec3::splat(self.config.start_size.evaluate(t, rng.gen()));
        let color = self.config.start_color.evaluate(t, rng.gen());

        let mut particle = Particle::with_lifetime(lifetime);
        particle.position = position;
        particle.velocity = direction * speed;
        particle.ultimate_velocity = particle.velocity;
        particle.rotation.z = self.config.start_rotation.evaluate(t, rng.gen());
        particle.start_size = size;
        particle.size = size;
        particle.start_color = color;
        particle.color = color;
        particle.random_seed = rng.gen();
        particle.spawn_time = now;
        particle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn emitter(rate: f32) -> Emitter {
        Emitter::new(EmitterConfig {
            rate_over_time: CurveRange::constant(rate),
            shape: EmitterShape::Point,
            ..EmitterConfig::default()
        })
    }

    #[test]
    fn fractional_emission_accumulates() {
        let mut emitter = emitter(10.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut total = 0;
        for step in 0..10 {
            total += emitter.emit(0.05, step as f32 * 0.05, &mut rng, &Mat4::IDENTITY, Space::Local, |_| true);
        }
        assert_eq!(total, 5);
    }

    #[test]
    fn exhausted_pool_stops_emission_silently() {
        let mut emitter = emitter(100.0);
        let mut rng = StdRng::seed_from_u64(2);
        let mut accepted = 0;
        let spawned = emitter.emit(1.0, 0.0, &mut rng, &Mat4::IDENTITY, Space::Local, |_| {
            accepted += 1;
            accepted <= 3
        });
        assert_eq!(spawned, 3);
        // the rejected backlog does not burst next tick
        let next = emitter.emit(0.0, 1.0, &mut rng, &Mat4::IDENTITY, Space::Local, |_| true);
        assert_eq!(next, 0);
    }

    #[test]
    fn non_looping_emitter_finishes() {
        let mut emitter = Emitter::new(EmitterConfig {
            looping: false,
            duration: 1.0,
            ..EmitterConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        emitter.emit(1.0, 0.0, &mut rng, &Mat4::IDENTITY, Space::Local, |_| true);
        assert!(emitter.is_finished());
        assert_eq!(
            emitter.emit(1.0, 1.0, &mut rng, &Mat4::IDENTITY, Space::Local, |_| true),
            0
        );
    }

    #[test]
    fn world_space_spawns_at_node_position() {
        let mut emitter = emitter(1.0);
        let mut rng = StdRng::seed_from_u64(4);
        let world = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let mut spawned = Vec::new();
        emitter.emit(1.0, 2.0, &mut rng, &world, Space::World, |p| {
            spawned.push(p);
            true
        });
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].position, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(spawned[0].spawn_time, 2.0);
        assert_eq!(spawned[0].velocity, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn shapes_stay_inside_their_volume() {
        let mut rng = StdRng::seed_from_u64(5);
        let sphere = EmitterShape::Sphere { radius: 2.0 };
        let hemi = EmitterShape::Hemisphere { radius: 1.0 };
        let cone = EmitterShape::Cone { angle: 30.0, radius: 1.0 };
        for _ in 0..100 {
            let (p, d) = sphere.sample(&mut rng);
            assert!(p.length() <= 2.0 + 1e-4);
            assert!((d.length() - 1.0).abs() < 1e-4);
            let (_, d) = hemi.sample(&mut rng);
            assert!(d.y >= 0.0);
            let (p, d) = cone.sample(&mut rng);
            assert_eq!(p.y, 0.0);
            assert!(d.angle_between(Vec3::Y) <= 30f32.to_radians() + 1e-4);
        }
    }
}
