//! Token interpolation for animated theme transitions.

use atrium_core::EasingCurve;

use crate::color::Rgba;
use crate::tokens::TokenMap;

/// Maps linear progress in `[0, 1]` onto the curve. Endpoints are exact.
pub fn ease(curve: EasingCurve, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    match curve {
        EasingCurve::Linear => t,
        EasingCurve::EaseIn => t * t * t,
        EasingCurve::EaseOut => 1.0 - (1.0 - t).powi(3),
        EasingCurve::EaseInOut => {
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            }
        }
    }
}

/// Interpolates two token maps.
///
/// Colors present on both sides are mixed and written in the target's
/// syntax. Any other value keeps the `from` side until `progress` reaches
/// 1. At `progress <= 0` the result is `from`, at `progress >= 1` it is
/// `to`, both verbatim.
pub fn interpolate(from: &TokenMap, to: &TokenMap, progress: f64) -> TokenMap {
    if progress <= 0.0 {
        return from.clone();
    }
    if progress >= 1.0 {
        return to.clone();
    }

    let mut frame = TokenMap::new();
    for (name, target) in to {
        let value = match from.get(name) {
            Some(start) => blend(start, target, progress),
            None => target.clone(),
        };
        frame.insert(name.clone(), value);
    }
    for (name, start) in from {
        frame.entry(name.clone()).or_insert_with(|| start.clone());
    }
    frame
}

fn blend(start: &str, target: &str, progress: f64) -> String {
    match (Rgba::parse(start), Rgba::parse_with_format(target)) {
        (Some(a), Some((b, format))) => a.lerp(&b, progress).format(format),
        _ => start.to_string(),
    }
}

/// A running transition between two flattened token maps.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    from: TokenMap,
    to: TokenMap,
    generation: u64,
    step: u32,
    steps: u32,
    curve: EasingCurve,
}

impl AnimationState {
    pub fn new(from: TokenMap, to: TokenMap, generation: u64, steps: u32, curve: EasingCurve) -> Self {
        Self {
            from,
            to,
            generation,
            step: 0,
            steps: steps.max(1),
            curve,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        f64::from(self.step) / f64::from(self.steps)
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    pub fn target(&self) -> &TokenMap {
        &self.to
    }

    /// Tokens for the current step.
    pub fn frame(&self) -> TokenMap {
        interpolate(&self.from, &self.to, ease(self.curve, self.progress()))
    }

    /// Moves one step forward and returns the new frame.
    pub fn advance(&mut self) -> TokenMap {
        self.step = (self.step + 1).min(self.steps);
        self.frame()
    }
}
