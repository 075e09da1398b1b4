//! Color gradients and the ranged wrapper used by color modules.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// RGB key on a [`Gradient`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorKey {
    /// Normalized time.
    pub time: f32,
    /// Linear RGB color.
    pub color: Vec3,
}

/// Alpha key on a [`Gradient`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaKey {
    /// Normalized time.
    pub time: f32,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

/// How a gradient moves between keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientMode {
    /// Interpolate linearly.
    #[default]
    Blend,
    /// Hold the next key's value over the whole segment.
    Fixed,
}

/// Color and alpha keys evaluated independently and combined into RGBA.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    /// Color keys sorted by time.
    pub color_keys: Vec<ColorKey>,
    /// Alpha keys sorted by time.
    pub alpha_keys: Vec<AlphaKey>,
    /// Interpolation mode.
    pub mode: GradientMode,
}

impl Gradient {
    /// Two-key gradient from `start` to `end`, including alpha.
    pub fn linear(start: Vec4, end: Vec4) -> Self {
        Self {
            color_keys: vec![
                ColorKey {
                    time: 0.0,
                    color: start.truncate(),
                },
                ColorKey {
                    time: 1.0,
                    color: end.truncate(),
                },
            ],
            alpha_keys: vec![
                AlphaKey {
                    time: 0.0,
                    alpha: start.w,
                },
                AlphaKey {
                    time: 1.0,
                    alpha: end.w,
                },
            ],
            mode: GradientMode::Blend,
        }
    }

    /// RGBA at `time`. Missing color keys read as white, missing alpha as opaque.
    pub fn evaluate(&self, time: f32) -> Vec4 {
        let rgb = sample_keys(
            &self.color_keys,
            time,
            self.mode,
            |key| key.time,
            |key| key.color,
            Vec3::ONE,
            |a, b, t| a.lerp(b, t),
        );
        let alpha = sample_keys(
            &self.alpha_keys,
            time,
            self.mode,
            |key| key.time,
            |key| key.alpha,
            1.0,
            crate::math::lerp,
        );
        rgb.extend(alpha)
    }
}

fn sample_keys<K, V: Copy>(
    keys: &[K],
    time: f32,
    mode: GradientMode,
    time_of: impl Fn(&K) -> f32,
    value_of: impl Fn(&K) -> V,
    fallback: V,
    mix: impl Fn(V, V, f32) -> V,
) -> V {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return fallback;
    };
    if time <= time_of(first) {
        return value_of(first);
    }
    if time >= time_of(last) {
        return value_of(last);
    }
    for pair in keys.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let (t0, t1) = (time_of(prev), time_of(next));
        if time >= t0 && time < t1 {
            if mode == GradientMode::Fixed {
                return value_of(next);
            }
            let span = t1 - t0;
            if span <= f32::EPSILON {
                return value_of(next);
            }
            return mix(value_of(prev), value_of(next), (time - t0) / span);
        }
    }
    value_of(last)
}

/// A color parameter that may be fixed, a gradient, or randomized per particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GradientRange {
    /// One color everywhere.
    Color {
        /// RGBA color.
        color: Vec4,
    },
    /// Gradient over normalized lifetime.
    Gradient {
        /// The gradient.
        gradient: Gradient,
    },
    /// Random blend of two colors.
    TwoColors {
        /// First color.
        min: Vec4,
        /// Second color.
        max: Vec4,
    },
    /// Random blend of two gradients.
    TwoGradients {
        /// First gradient.
        min: Gradient,
        /// Second gradient.
        max: Gradient,
    },
    /// Gradient sampled at the random ratio instead of time.
    RandomColor {
        /// Palette to pick from.
        gradient: Gradient,
    },
}

impl Default for GradientRange {
    fn default() -> Self {
        Self::Color { color: Vec4::ONE }
    }
}

impl GradientRange {
    /// Evaluate at normalized `time` with random ratio `rnd`.
    pub fn evaluate(&self, time: f32, rnd: f32) -> Vec4 {
        match self {
            GradientRange::Color { color } => *color,
            GradientRange::Gradient { gradient } => gradient.evaluate(time),
            GradientRange::TwoColors { min, max } => min.lerp(*max, rnd),
            GradientRange::TwoGradients { min, max } => {
                min.evaluate(time).lerp(max.evaluate(time), rnd)
            }
            GradientRange::RandomColor { gradient } => gradient.evaluate(rnd),
        }
    }

    /// Number of sample rows needed when packed for the GPU.
    pub fn branch_count(&self) -> u32 {
        match self {
            GradientRange::TwoColors { .. } | GradientRange::TwoGradients { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_gradient_interpolates_color_and_alpha() {
        let gradient = Gradient::linear(Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 0.0));
        let mid = gradient.evaluate(0.5);
        assert!((mid - Vec4::new(0.5, 0.0, 0.5, 0.5)).length() < 1e-5);
        assert_eq!(gradient.evaluate(-3.0), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(gradient.evaluate(3.0), Vec4::new(0.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn fixed_gradient_holds_next_key() {
        let mut gradient = Gradient::linear(Vec4::ZERO, Vec4::ONE);
        gradient.mode = GradientMode::Fixed;
        assert_eq!(gradient.evaluate(0.25), Vec4::ONE);
    }

    #[test]
    fn empty_gradient_is_opaque_white() {
        assert_eq!(Gradient::default().evaluate(0.4), Vec4::ONE);
    }

    #[test]
    fn random_color_uses_ratio_not_time() {
        let range = GradientRange::RandomColor {
            gradient: Gradient::linear(Vec4::ZERO, Vec4::ONE),
        };
        let a = range.evaluate(0.0, 0.75);
        let b = range.evaluate(1.0, 0.75);
        assert_eq!(a, b);
        assert!((a.x - 0.75).abs() < 1e-5);
    }

    #[test]
    fn two_color_range_has_two_branches() {
        let range = GradientRange::TwoColors {
            min: Vec4::ZERO,
            max: Vec4::splat(2.0),
        };
        assert_eq!(range.branch_count(), 2);
        assert_eq!(range.evaluate(0.3, 0.5), Vec4::ONE);
    }
}
