//! Easing functions for animated property values.
//!
//! An easing function maps linear progress (0.0 to 1.0) onto the progress
//! actually applied to an interpolation. Every curve is defined once as an
//! ease-in function; the ease-out and ease-in-out variants are derived from
//! it by reflection.

use std::f32::consts::PI;

use crate::value::PropertyValue;

/// The shape of an easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EasingCurve {
    /// `t^2`.
    Quadratic,
    /// `t^3`.
    Cubic,
    /// `t^4`.
    Quartic,
    /// Quarter sine wave.
    Sine,
    /// Quarter circle.
    Circular,
    /// Pulls back slightly before moving forward.
    Back,
    /// Bounces against the start before settling.
    Bounce,
    /// Oscillates with growing amplitude.
    Elastic,
}

impl EasingCurve {
    fn ease_in(self, t: f32) -> f32 {
        match self {
            Self::Quadratic => t * t,
            Self::Cubic => t * t * t,
            Self::Quartic => t.powi(4),
            Self::Sine => 1.0 - ((t * PI) / 2.0).cos(),
            Self::Circular => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Self::Back => {
                const OVERSHOOT: f32 = 1.701_58;
                t * t * ((OVERSHOOT + 1.0) * t - OVERSHOOT)
            }
            Self::Bounce => 1.0 - bounce_out(1.0 - t),
            Self::Elastic => {
                if t == 0.0 || t == 1.0 {
                    t
                } else {
                    let period = (2.0 * PI) / 3.0;
                    -(2.0f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * period).sin()
                }
            }
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;

    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984_375
    }
}

/// An easing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Easing {
    /// No easing.
    #[default]
    Linear,
    /// Starts slow, accelerates.
    In(EasingCurve),
    /// Starts fast, decelerates.
    Out(EasingCurve),
    /// Slow at both ends.
    InOut(EasingCurve),
}

impl Easing {
    /// Quadratic ease-in.
    pub const EASE_IN: Self = Self::In(EasingCurve::Quadratic);
    /// Quadratic ease-out.
    pub const EASE_OUT: Self = Self::Out(EasingCurve::Quadratic);
    /// Quadratic ease-in-out.
    pub const EASE_IN_OUT: Self = Self::InOut(EasingCurve::Quadratic);

    /// Apply the easing function to `t`, which is clamped to 0.0..=1.0.
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::In(curve) => curve.ease_in(t),
            Self::Out(curve) => 1.0 - curve.ease_in(1.0 - t),
            Self::InOut(curve) => {
                if t < 0.5 {
                    curve.ease_in(2.0 * t) / 2.0
                } else {
                    1.0 - curve.ease_in(2.0 - 2.0 * t) / 2.0
                }
            }
        }
    }
}

/// Apply an easing function to a progress value.
///
/// ```
/// use horizon_presentation::animation::{ease, Easing};
///
/// assert_eq!(ease(Easing::Linear, 0.5), 0.5);
/// assert!(ease(Easing::EASE_IN, 0.5) < 0.5);
/// assert!(ease(Easing::EASE_OUT, 0.5) > 0.5);
/// ```
#[inline]
pub fn ease(easing: Easing, t: f32) -> f32 {
    easing.apply(t)
}

/// Interpolate between two property values with an easing function.
pub fn interpolate_eased<T: PropertyValue>(easing: Easing, from: &T, to: &T, t: f32) -> T {
    from.interpolate(to, ease(easing, t))
}
