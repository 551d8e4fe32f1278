//! Animation curves.
//!
//! Every curve is a pure function of elapsed scene time `t` (seconds).
//! Nothing is integrated frame to frame, so evaluating the same curve at
//! the same `t` always returns the same value and a scene can be rewound
//! to any instant.

use serde::{Deserialize, Serialize};

/// Linear interpolation between `a` and `b` by weight `w`.
pub fn lerp(a: f64, b: f64, w: f64) -> f64 {
    a + (b - a) * w
}

/// Trigonometric argument `t * freq + offset`.
///
/// The offset is how groups of identical entities are staggered so they do
/// not animate in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Angular frequency (radians per second)
    pub freq: f64,
    /// Phase offset (radians)
    pub offset: f64,
}

impl Phase {
    pub const fn new(freq: f64, offset: f64) -> Self {
        Self { freq, offset }
    }

    /// Phase for the `index`-th member of a group, offset by `index * step`.
    pub fn staggered(freq: f64, index: usize, step: f64) -> Self {
        Self::new(freq, index as f64 * step)
    }

    /// Returns the argument at time `t`.
    pub fn at(&self, t: f64) -> f64 {
        t * self.freq + self.offset
    }

    /// Returns `sin(t * freq + offset)`.
    pub fn sin(&self, t: f64) -> f64 {
        self.at(t).sin()
    }
}

/// Scalar animation curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum Curve {
    /// Fixed value.
    Constant { value: f64 },

    /// `base + t * rate`. Continuous spin of an assembly.
    Linear { base: f64, rate: f64 },

    /// `center + sin(phase) * amplitude`. Emissive pulsing, hovering, banking.
    Wave { center: f64, amplitude: f64, phase: Phase },

    /// `lerp(min, max, (sin(phase) + 1) / 2)`. Joint sweeps.
    Bounded { min: f64, max: f64, phase: Phase },

    /// `min + |sin(phase)| * (max - min)`. Connection flicker.
    Rectified { min: f64, max: f64, phase: Phase },

    /// `hot` while `sin(phase) > threshold`, `cool` otherwise.
    Bistable {
        phase: Phase,
        threshold: f64,
        hot: f64,
        cool: f64,
    },

    /// Runs `open` while `sin(gate) > threshold`, holds `closed` otherwise.
    Gated {
        gate: Phase,
        threshold: f64,
        open: Box<Curve>,
        closed: f64,
    },
}

impl Curve {
    pub fn constant(value: f64) -> Self {
        Curve::Constant { value }
    }

    pub fn linear(base: f64, rate: f64) -> Self {
        Curve::Linear { base, rate }
    }

    pub fn wave(center: f64, amplitude: f64, phase: Phase) -> Self {
        Curve::Wave { center, amplitude, phase }
    }

    /// Bounded oscillation. The bounds are reordered if given backwards.
    pub fn bounded(min: f64, max: f64, phase: Phase) -> Self {
        Curve::Bounded {
            min: min.min(max),
            max: max.max(min),
            phase,
        }
    }

    /// Rectified flicker. The bounds are reordered if given backwards.
    pub fn rectified(min: f64, max: f64, phase: Phase) -> Self {
        Curve::Rectified {
            min: min.min(max),
            max: max.max(min),
            phase,
        }
    }

    pub fn bistable(phase: Phase, threshold: f64, hot: f64, cool: f64) -> Self {
        Curve::Bistable { phase, threshold, hot, cool }
    }

    pub fn gated(gate: Phase, threshold: f64, open: Curve, closed: f64) -> Self {
        Curve::Gated {
            gate,
            threshold,
            open: Box::new(open),
            closed,
        }
    }

    /// Evaluates the curve at elapsed time `t`.
    pub fn sample(&self, t: f64) -> f64 {
        match self {
            Curve::Constant { value } => *value,
            Curve::Linear { base, rate } => base + t * rate,
            Curve::Wave { center, amplitude, phase } => center + phase.sin(t) * amplitude,
            Curve::Bounded { min, max, phase } => {
                let w = (phase.sin(t) + 1.0) / 2.0;
                // Rounding in lerp can step one ulp past the bounds
                lerp(*min, *max, w).clamp(*min, *max)
            }
            Curve::Rectified { min, max, phase } => {
                (min + phase.sin(t).abs() * (max - min)).clamp(*min, *max)
            }
            Curve::Bistable { phase, threshold, hot, cool } => {
                if phase.sin(t) > *threshold {
                    *hot
                } else {
                    *cool
                }
            }
            Curve::Gated { gate, threshold, open, closed } => {
                if gate.sin(t) > *threshold {
                    open.sample(t)
                } else {
                    *closed
                }
            }
        }
    }

    /// Closed range the curve can produce, or `None` if it is unbounded.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            Curve::Constant { value } => Some((*value, *value)),
            Curve::Linear { base, rate } => {
                if *rate == 0.0 {
                    Some((*base, *base))
                } else {
                    None
                }
            }
            Curve::Wave { center, amplitude, .. } => {
                Some((center - amplitude.abs(), center + amplitude.abs()))
            }
            Curve::Bounded { min, max, .. } | Curve::Rectified { min, max, .. } => {
                Some((*min, *max))
            }
            Curve::Bistable { hot, cool, .. } => Some((hot.min(*cool), hot.max(*cool))),
            Curve::Gated { open, closed, .. } => open
                .range()
                .map(|(lo, hi)| (lo.min(*closed), hi.max(*closed))),
        }
    }

    /// Returns true if the value changes over time.
    pub fn is_animated(&self) -> bool {
        match self {
            Curve::Constant { .. } => false,
            Curve::Linear { rate, .. } => *rate != 0.0,
            _ => true,
        }
    }
}
