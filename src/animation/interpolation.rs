use crate::core::constants::CAMERA_FIELD_OF_VIEW;
use serde::{Deserialize, Serialize};

/// Easing curves for transition time fractions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingFunction {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    /// Caller supplied curve; not serializable
    #[serde(skip)]
    Custom(fn(f64) -> f64),
}

impl PartialEq for EasingFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EasingFunction::Custom(a), EasingFunction::Custom(b)) => std::ptr::fn_addr_eq(*a, *b),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl EasingFunction {
    /// Apply the easing function to a normalized time value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingFunction::Linear => t,
            EasingFunction::EaseInQuad => t * t,
            // (2 - t) * t
            EasingFunction::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            EasingFunction::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            EasingFunction::EaseInCubic => t * t * t,
            EasingFunction::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            EasingFunction::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            EasingFunction::Custom(curve) => curve(t),
        }
    }
}

/// Interpolators usable as a transition's `interp`
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two f64 values
    pub fn linear(start: f64, end: f64, t: f64) -> f64 {
        start + (end - start) * t
    }

    /// Element-wise linear interpolation of a transition vector
    pub fn linear4(start: &[f64; 4], end: &[f64; 4], t: f64) -> [f64; 4] {
        let mut result = [0.0; 4];
        for (idx, value) in result.iter_mut().enumerate() {
            *value = Self::linear(start[idx], end[idx], t);
        }
        result
    }
}

/// Distance from a camera to the map plane at which `zoom` fills a
/// `width` x `height` display.
///
/// Halving the height is one zoom level, so height is proportional to
/// `2^-zoom`.
pub fn zoom_to_height(zoom: f64, width: f64, height: f64) -> f64 {
    let half = width.max(height) / 2.0;
    half / (CAMERA_FIELD_OF_VIEW / 2.0).tan() * 2f64.powf(-zoom)
}

/// Inverse of [`zoom_to_height`].
pub fn height_to_zoom(distance: f64, width: f64, height: f64) -> f64 {
    let half = width.max(height) / 2.0;
    -(distance * (CAMERA_FIELD_OF_VIEW / 2.0).tan() / half).log2()
}
