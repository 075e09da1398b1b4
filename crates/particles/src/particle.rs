use glam::{Vec3, Vec4};

/// Transient state of one simulated particle.
///
/// Lives in the pool's CPU mirror while alive; modules mutate it in place
/// during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Current position (simulation space).
    pub position: Vec3,
    /// Base velocity set at spawn and modified by forces.
    pub velocity: Vec3,
    /// Velocity contributed by velocity-over-lifetime this tick.
    pub animated_velocity: Vec3,
    /// Effective velocity for this tick after every module ran.
    pub ultimate_velocity: Vec3,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    /// Size at spawn.
    pub start_size: Vec3,
    /// Current size.
    pub size: Vec3,
    /// Color at spawn.
    pub start_color: Vec4,
    /// Current color.
    pub color: Vec4,
    /// Per-particle seed for module randomness.
    pub random_seed: u32,
    /// Seconds of life left.
    pub remaining_lifetime: f32,
    /// Total lifetime in seconds.
    pub start_lifetime: f32,
    /// System time at which the particle was committed to the pool.
    pub spawn_time: f32,
    /// Normalized texture sheet frame in `[0, 1)`.
    pub frame_index: f32,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            animated_velocity: Vec3::ZERO,
            ultimate_velocity: Vec3::ZERO,
            rotation: Vec3::ZERO,
            start_size: Vec3::ONE,
            size: Vec3::ONE,
            start_color: Vec4::ONE,
            color: Vec4::ONE,
            random_seed: 0,
            remaining_lifetime: 0.0,
            start_lifetime: 0.0,
            spawn_time: 0.0,
            frame_index: 0.0,
        }
    }
}

impl Particle {
    /// Fresh particle with `lifetime` seconds to live.
    pub fn with_lifetime(lifetime: f32) -> Self {
        Self {
            remaining_lifetime: lifetime,
            start_lifetime: lifetime,
            ..Self::default()
        }
    }

    /// `1 - remaining / start` clamped to `[0, 1]`; an unbounded lifetime stays at 0.
    pub fn normalized_progress(&self) -> f32 {
        if self.start_lifetime <= 0.0 {
            return 1.0;
        }
        let progress = 1.0 - self.remaining_lifetime / self.start_lifetime;
        if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        }
    }

    /// True once more than `start_lifetime` seconds passed since spawn.
    pub fn is_expired_at(&self, now: f32) -> bool {
        now - self.spawn_time > self.start_lifetime
    }
}
