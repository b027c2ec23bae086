//! Configuration for maps and their interactors
//!
//! Map options describe the initial view and its limits. Interactor options
//! tune how input turns into navigation; they can be written out in full or
//! taken from an [`InteractionProfile`] preset.

use crate::animation::interpolation::EasingFunction;
use crate::core::bounds::BoundsUpdate;
use crate::core::constants::{
    DEFAULT_GCS, DEFAULT_HEIGHT, DEFAULT_INGCS, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_WIDTH,
    DEFAULT_ZOOM, DEFAULT_ZOOM_DEBOUNCE,
};
use crate::core::geo::{Point, Size};
use crate::core::projection::Crs;
use crate::input::actions::{ActionBindingConfig, NavAction};
use crate::input::events::MouseButtons;
use crate::input::keyboard::{default_key_bindings, KeyBinding};
use crate::rendering::camera::ProjectionType;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Initial state and limits of a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    pub size: Size,
    /// Map projection
    pub gcs: Crs,
    /// Interface projection for coordinates passed in and out
    pub ingcs: Crs,
    /// Initial center in `ingcs`; the origin of `ingcs` when unset
    pub center: Option<Point>,
    pub zoom: f64,
    pub rotation: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Outer limit for panning, in `ingcs`. Missing edges cover the world.
    pub max_bounds: BoundsUpdate,
    /// Map units per pixel at zoom 0; derived from the max bounds when unset
    pub units_per_pixel: Option<f64>,
    pub clamp_bounds_x: bool,
    pub clamp_bounds_y: bool,
    pub clamp_zoom: bool,
    pub discrete_zoom: bool,
    pub allow_rotation: bool,
    /// World origin in the map projection
    pub origin: Point,
    pub camera: ProjectionType,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            size: Size::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            gcs: Crs::parse(DEFAULT_GCS).unwrap_or(Crs::WebMercator),
            ingcs: Crs::parse(DEFAULT_INGCS).unwrap_or(Crs::Geographic),
            center: None,
            zoom: DEFAULT_ZOOM,
            rotation: 0.0,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            max_bounds: BoundsUpdate::default(),
            units_per_pixel: None,
            clamp_bounds_x: false,
            clamp_bounds_y: true,
            clamp_zoom: true,
            discrete_zoom: false,
            allow_rotation: true,
            origin: Point::default(),
            camera: ProjectionType::Parallel,
        }
    }
}

impl MapOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumOptions {
    pub enabled: bool,
    /// Display pixels per ms
    pub max_speed: f64,
    pub min_speed: f64,
    /// A pointer resting this long (ms) before release carries no momentum
    pub stop_time: f64,
    /// Exponential decay per ms
    pub drag: f64,
    /// Gestures that continue with momentum
    pub actions: Vec<NavAction>,
}

impl Default for MomentumOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_speed: 2.5,
            min_speed: 0.01,
            stop_time: 250.0,
            drag: 0.01,
            actions: vec![NavAction::Pan, NavAction::Zoom],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringOptions {
    pub enabled: bool,
    pub spring_constant: f64,
}

impl Default for SpringOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            spring_constant: 0.00005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickOptions {
    pub enabled: bool,
    /// Buttons that can produce clicks
    pub buttons: MouseButtons,
    /// A press longer than this (ms) is not a click; 0 disables the limit
    pub duration: f64,
    /// Moving the pointer between press and release cancels the click
    pub cancel_on_move: bool,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            buttons: MouseButtons {
                left: true,
                right: true,
                middle: true,
            },
            duration: 0.0,
            cancel_on_move: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomAnimationOptions {
    pub enabled: bool,
    /// ms
    pub duration: f64,
    pub ease: EasingFunction,
}

impl Default for ZoomAnimationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: 500.0,
            ease: EasingFunction::EaseOutQuad,
        }
    }
}

/// Dead zones of the touch zoom-rotate gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomRotateOptions {
    /// Radians of twist before rotation starts
    pub min_rotation: f64,
    /// Rotation steps against the current direction smaller than this
    /// (radians) are ignored
    pub reverse_rotation: f64,
    /// Zoom levels of pinch before zooming starts
    pub min_zoom: f64,
    /// Pixels of drag before panning starts
    pub min_pan: f64,
}

impl Default for ZoomRotateOptions {
    fn default() -> Self {
        Self {
            min_rotation: 5f64.to_radians(),
            reverse_rotation: 4f64.to_radians(),
            min_zoom: 0.05,
            min_pan: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardOptions {
    pub enabled: bool,
    pub bindings: Vec<KeyBinding>,
    /// Zoom change per factor
    pub zoom_steps: [f64; 3],
    /// Pan pixels for factors 0 and 1; factor 2 pans half the viewport
    pub pan_steps: [f64; 2],
    /// Degrees per factor
    pub rotate_steps: [f64; 3],
}

impl Default for KeyboardOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            bindings: default_key_bindings(),
            zoom_steps: [0.05, 0.25, 1.0],
            pan_steps: [1.0, 10.0],
            rotate_steps: [1.0, 5.0, 90.0],
        }
    }
}

/// How an interactor turns input into navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractorOptions {
    /// Minimum ms between handled pointer moves and wheel actions; 0 handles
    /// every event
    pub throttle: f64,
    /// Quiet period (ms) before accumulated discrete zoom is applied
    pub zoom_debounce: f64,
    pub momentum: MomentumOptions,
    pub spring: SpringOptions,
    pub click: ClickOptions,
    pub zoom_animation: ZoomAnimationOptions,
    pub wheel_scale_x: f64,
    pub wheel_scale_y: f64,
    /// Zoom levels per 120 px of drag or wheel
    pub zoom_scale: f64,
    /// Radians per wheel line when rotating
    pub rotate_wheel_scale: f64,
    pub zoom_rotate: ZoomRotateOptions,
    pub keyboard: KeyboardOptions,
    /// Action bindings; the built-in list when unset
    pub actions: Option<Vec<ActionBindingConfig>>,
}

impl Default for InteractorOptions {
    fn default() -> Self {
        Self {
            throttle: 30.0,
            zoom_debounce: DEFAULT_ZOOM_DEBOUNCE,
            momentum: MomentumOptions::default(),
            spring: SpringOptions::default(),
            click: ClickOptions::default(),
            zoom_animation: ZoomAnimationOptions::default(),
            wheel_scale_x: 1.0,
            wheel_scale_y: 1.0,
            zoom_scale: 1.0,
            rotate_wheel_scale: 6f64.to_radians(),
            zoom_rotate: ZoomRotateOptions::default(),
            keyboard: KeyboardOptions::default(),
            actions: None,
        }
    }
}

impl InteractorOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Interaction presets
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionProfile {
    /// Mouse, wheel and keyboard
    Desktop,
    /// Touch screens: no pointer throttling, longer glide, quicker zoom
    Touch,
    /// No navigation; clicks and pointer moves are still reported
    Static,
    Custom(InteractorOptions),
}

impl InteractionProfile {
    pub fn resolve(&self) -> InteractorOptions {
        match self {
            Self::Desktop => InteractorOptions::default(),
            Self::Touch => InteractorOptions {
                throttle: 0.0,
                momentum: MomentumOptions {
                    max_speed: 5.0,
                    stop_time: 150.0,
                    drag: 0.005,
                    ..MomentumOptions::default()
                },
                zoom_animation: ZoomAnimationOptions {
                    duration: 300.0,
                    ..ZoomAnimationOptions::default()
                },
                keyboard: KeyboardOptions {
                    enabled: false,
                    ..KeyboardOptions::default()
                },
                ..InteractorOptions::default()
            },
            Self::Static => InteractorOptions {
                momentum: MomentumOptions {
                    enabled: false,
                    ..MomentumOptions::default()
                },
                zoom_animation: ZoomAnimationOptions {
                    enabled: false,
                    ..ZoomAnimationOptions::default()
                },
                keyboard: KeyboardOptions {
                    enabled: false,
                    ..KeyboardOptions::default()
                },
                actions: Some(Vec::new()),
                ..InteractorOptions::default()
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for InteractionProfile {
    fn default() -> Self {
        Self::Desktop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_options_from_json() {
        let options = MapOptions::from_json(
            r#"{
                "size": {"width": 800, "height": 600},
                "center": {"x": -75.0, "y": 42.0},
                "zoom": 6,
                "gcs": "EPSG:3857",
                "ingcs": "WGS84",
                "max_bounds": {"left": -100, "right": -50, "bottom": null, "top": null},
                "discrete_zoom": true,
                "camera": "perspective"
            }"#,
        )
        .unwrap();
        assert_eq!(options.size, Size::new(800.0, 600.0));
        assert_eq!(options.center, Some(Point::new(-75.0, 42.0)));
        assert_eq!(options.ingcs, Crs::Geographic);
        assert_eq!(options.max_bounds.left, Some(-100.0));
        assert!(options.discrete_zoom);
        assert_eq!(options.camera, ProjectionType::Perspective);
        // defaults fill the rest
        assert_eq!(options.max_zoom, DEFAULT_MAX_ZOOM);
        assert!(options.clamp_bounds_y);
    }

    #[test]
    fn test_map_options_rejects_bad_json() {
        assert!(MapOptions::from_json("{\"gcs\": \"EPSG:1\"}").is_err());
        assert!(MapOptions::from_json("not json").is_err());
    }

    #[test]
    fn test_map_options_json_round_trip() {
        let options = MapOptions {
            zoom: 3.0,
            ..MapOptions::default()
        };
        let json = options.to_json().unwrap();
        assert_eq!(MapOptions::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_interactor_defaults() {
        let options = InteractorOptions::default();
        assert_eq!(options.throttle, 30.0);
        assert_eq!(options.momentum.actions, vec![NavAction::Pan, NavAction::Zoom]);
        assert_eq!(options.zoom_animation.ease, EasingFunction::EaseOutQuad);
        assert!((options.rotate_wheel_scale - 6.0 * std::f64::consts::PI / 180.0).abs() < 1e-12);
        assert!(options.actions.is_none());
    }

    #[test]
    fn test_interactor_options_partial_json() {
        let options = InteractorOptions::from_json(
            r#"{"momentum": {"enabled": false}, "actions": [{"action": "pan", "input": "left"}]}"#,
        )
        .unwrap();
        assert!(!options.momentum.enabled);
        assert_eq!(options.momentum.drag, 0.01);
        assert_eq!(options.actions.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_profiles() {
        assert_eq!(InteractionProfile::default().resolve(), InteractorOptions::default());
        let static_options = InteractionProfile::Static.resolve();
        assert_eq!(static_options.actions, Some(Vec::new()));
        assert!(!static_options.momentum.enabled);
        assert_eq!(InteractionProfile::Touch.resolve().throttle, 0.0);
        let custom = InteractorOptions {
            zoom_scale: 2.0,
            ..InteractorOptions::default()
        };
        assert_eq!(InteractionProfile::Custom(custom.clone()).resolve(), custom);
    }
}
