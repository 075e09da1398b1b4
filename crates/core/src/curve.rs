//! Keyframed animation curves and the ranged wrapper modules are configured with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::lerp;

/// Errors raised when building a curve from authored keys.
#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    /// A curve needs at least one key.
    #[error("animation curve has no keyframes")]
    Empty,
    /// Keys must be sorted by time.
    #[error("keyframe {index} at t={time} is earlier than the previous key")]
    Unsorted {
        /// Index of the offending key.
        index: usize,
        /// Its time.
        time: f32,
    },
    /// NaN or infinite time/value/tangent.
    #[error("keyframe {index} contains a non-finite component")]
    NonFinite {
        /// Index of the offending key.
        index: usize,
    },
}

/// One key on an [`AnimationCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Normalized time, usually in `[0, 1]`.
    pub time: f32,
    /// Curve value at `time`.
    pub value: f32,
    /// Incoming slope.
    #[serde(default)]
    pub in_tangent: f32,
    /// Outgoing slope.
    #[serde(default)]
    pub out_tangent: f32,
}

impl Keyframe {
    /// Key with flat tangents.
    pub fn flat(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }
}

/// Cubic Hermite curve over sorted keyframes.
///
/// Times before the first key or after the last key clamp to that key's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct AnimationCurve {
    keys: Vec<Keyframe>,
}

impl AnimationCurve {
    /// Build a curve, validating key order.
    pub fn new(keys: Vec<Keyframe>) -> Result<Self, CurveError> {
        if keys.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, key) in keys.iter().enumerate() {
            if !(key.time.is_finite()
                && key.value.is_finite()
                && key.in_tangent.is_finite()
                && key.out_tangent.is_finite())
            {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 && key.time < keys[index - 1].time {
                return Err(CurveError::Unsorted {
                    index,
                    time: key.time,
                });
            }
        }
        Ok(Self { keys })
    }

    /// Flat curve with a single key.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe::flat(0.0, value)],
        }
    }

    /// Straight line from `(0, start)` to `(1, end)`.
    pub fn linear(start: f32, end: f32) -> Self {
        let slope = end - start;
        Self {
            keys: vec![
                Keyframe {
                    time: 0.0,
                    value: start,
                    in_tangent: slope,
                    out_tangent: slope,
                },
                Keyframe {
                    time: 1.0,
                    value: end,
                    in_tangent: slope,
                    out_tangent: slope,
                },
            ],
        }
    }

    /// Keys in time order.
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Sample the curve at `time`.
    pub fn evaluate(&self, time: f32) -> f32 {
        let first = self.keys[0];
        if time.is_nan() || time <= first.time || self.keys.len() == 1 {
            return first.value;
        }
        let last = self.keys[self.keys.len() - 1];
        if time >= last.time {
            return last.value;
        }

        // First key strictly after `time`; exists and is > 0 for non-NaN time.
        let right = self.keys.partition_point(|key| key.time <= time).max(1);
        let k0 = self.keys[right - 1];
        let k1 = self.keys[right];
        hermite(k0, k1, time)
    }
}

impl TryFrom<Vec<Keyframe>> for AnimationCurve {
    type Error = CurveError;

    fn try_from(keys: Vec<Keyframe>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<AnimationCurve> for Vec<Keyframe> {
    fn from(curve: AnimationCurve) -> Self {
        curve.keys
    }
}

fn hermite(k0: Keyframe, k1: Keyframe, time: f32) -> f32 {
    let span = k1.time - k0.time;
    if span <= f32::EPSILON {
        return k1.value;
    }
    let s = (time - k0.time) / span;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * k0.value + h10 * span * k0.out_tangent + h01 * k1.value + h11 * span * k1.in_tangent
}

/// A scalar parameter that may be constant, curved or randomized per particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CurveRange {
    /// Same value for every particle at every time.
    Constant {
        /// The value.
        value: f32,
    },
    /// `curve(t) * multiplier`.
    Curve {
        /// Curve over normalized lifetime.
        curve: AnimationCurve,
        /// Scale applied to the curve.
        #[serde(default = "one")]
        multiplier: f32,
    },
    /// Random blend between two curves, scaled.
    TwoCurves {
        /// Lower curve.
        min: AnimationCurve,
        /// Upper curve.
        max: AnimationCurve,
        /// Scale applied after blending.
        #[serde(default = "one")]
        multiplier: f32,
    },
    /// Random blend between two constants.
    TwoConstants {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
}

fn one() -> f32 {
    1.0
}

impl Default for CurveRange {
    fn default() -> Self {
        Self::Constant { value: 0.0 }
    }
}

impl CurveRange {
    /// Constant range.
    pub fn constant(value: f32) -> Self {
        Self::Constant { value }
    }

    /// Curve range with unit multiplier.
    pub fn curve(curve: AnimationCurve) -> Self {
        Self::Curve {
            curve,
            multiplier: 1.0,
        }
    }

    /// Random constant between `min` and `max`.
    pub fn between(min: f32, max: f32) -> Self {
        Self::TwoConstants { min, max }
    }

    /// Evaluate at normalized `time` using the particle's random ratio `rnd`.
    ///
    /// Deterministic in `(time, rnd)`.
    pub fn evaluate(&self, time: f32, rnd: f32) -> f32 {
        match self {
            CurveRange::Constant { value } => *value,
            CurveRange::Curve { curve, multiplier } => curve.evaluate(time) * multiplier,
            CurveRange::TwoCurves {
                min,
                max,
                multiplier,
            } => lerp(min.evaluate(time), max.evaluate(time), rnd) * multiplier,
            CurveRange::TwoConstants { min, max } => lerp(*min, *max, rnd),
        }
    }

    /// Whether every constant, key value and multiplier is finite.
    pub fn is_finite(&self) -> bool {
        let keys_finite = |curve: &AnimationCurve| {
            curve
                .keys
                .iter()
                .all(|key| key.value.is_finite() && key.in_tangent.is_finite() && key.out_tangent.is_finite())
        };
        match self {
            CurveRange::Constant { value } => value.is_finite(),
            CurveRange::Curve { curve, multiplier } => multiplier.is_finite() && keys_finite(curve),
            CurveRange::TwoCurves {
                min,
                max,
                multiplier,
            } => multiplier.is_finite() && keys_finite(min) && keys_finite(max),
            CurveRange::TwoConstants { min, max } => min.is_finite() && max.is_finite(),
        }
    }

    /// Number of sample rows the range needs when packed for the GPU.
    pub fn branch_count(&self) -> u32 {
        match self {
            CurveRange::TwoCurves { .. } | CurveRange::TwoConstants { .. } => 2,
            CurveRange::Constant { .. } | CurveRange::Curve { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsorted_keys() {
        let err = AnimationCurve::new(vec![Keyframe::flat(0.5, 1.0), Keyframe::flat(0.2, 0.0)])
            .unwrap_err();
        assert_eq!(
            err,
            CurveError::Unsorted {
                index: 1,
                time: 0.2
            }
        );
        assert_eq!(AnimationCurve::new(Vec::new()).unwrap_err(), CurveError::Empty);
    }

    #[test]
    fn linear_curve_hits_endpoints_and_midpoint() {
        let curve = AnimationCurve::linear(2.0, 4.0);
        assert_eq!(curve.evaluate(0.0), 2.0);
        assert_eq!(curve.evaluate(1.0), 4.0);
        assert!((curve.evaluate(0.5) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn evaluation_clamps_outside_key_range() {
        let curve = AnimationCurve::new(vec![Keyframe::flat(0.2, 1.0), Keyframe::flat(0.8, 3.0)])
            .unwrap();
        assert_eq!(curve.evaluate(-1.0), 1.0);
        assert_eq!(curve.evaluate(2.0), 3.0);
    }

    #[test]
    fn nan_time_yields_first_key() {
        let curve = AnimationCurve::linear(2.0, 4.0);
        assert_eq!(curve.evaluate(f32::NAN), 2.0);
        assert_eq!(CurveRange::curve(AnimationCurve::linear(0.0, 1.0)).evaluate(f32::NAN, 0.0), 0.0);
    }

    #[test]
    fn finiteness_covers_every_mode() {
        assert!(CurveRange::constant(1.0).is_finite());
        assert!(!CurveRange::constant(f32::INFINITY).is_finite());
        assert!(!CurveRange::between(0.0, f32::NAN).is_finite());
        assert!(!CurveRange::Curve {
            curve: AnimationCurve::linear(0.0, 1.0),
            multiplier: f32::INFINITY,
        }
        .is_finite());
    }

    #[test]
    fn coincident_keys_take_the_right_value() {
        let curve = AnimationCurve::new(vec![
            Keyframe::flat(0.0, 0.0),
            Keyframe::flat(0.5, 1.0),
            Keyframe::flat(0.5, 5.0),
            Keyframe::flat(1.0, 5.0),
        ])
        .unwrap();
        assert_eq!(curve.evaluate(0.5), 5.0);
        assert!(curve.evaluate(0.75).is_finite());
    }

    #[test]
    fn range_modes_blend_by_random_ratio() {
        assert_eq!(CurveRange::constant(5.0).evaluate(0.3, 0.9), 5.0);
        assert_eq!(CurveRange::between(0.0, 10.0).evaluate(0.0, 0.25), 2.5);

        let two = CurveRange::TwoCurves {
            min: AnimationCurve::constant(1.0),
            max: AnimationCurve::constant(3.0),
            multiplier: 2.0,
        };
        assert_eq!(two.evaluate(0.5, 0.5), 4.0);
        assert_eq!(two.branch_count(), 2);
        assert_eq!(CurveRange::constant(1.0).branch_count(), 1);
    }

    #[test]
    fn curve_range_deserializes_from_tagged_config() {
        let range: CurveRange = serde_json::from_str(
            r#"{"mode":"curve","curve":[{"time":0.0,"value":1.0},{"time":1.0,"value":0.0}]}"#,
        )
        .unwrap();
        assert_eq!(range.evaluate(0.0, 0.0), 1.0);
        assert_eq!(range.evaluate(1.0, 0.0), 0.0);

        let bad = serde_json::from_str::<CurveRange>(r#"{"mode":"curve","curve":[]}"#);
        assert!(bad.is_err());
    }
}
