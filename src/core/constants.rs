//! Engine-wide defaults and magic numbers.
//! Keeping them in a single place makes it easier to tweak navigation behaviour.

use std::f64::consts::PI;

/// Semi-major axis of the WGS84 ellipsoid, used by Web Mercator.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_6;

/// Default map projection.
pub const DEFAULT_GCS: &str = "EPSG:3857";

/// Default interface projection used for coordinates passed in and out.
pub const DEFAULT_INGCS: &str = "EPSG:4326";

/// Pixels spanned by the max bounds at zoom 0 when `units_per_pixel` is not given.
pub const ZOOM_ZERO_PIXELS: f64 = 256.0;

pub const DEFAULT_ZOOM: f64 = 4.0;
pub const DEFAULT_MIN_ZOOM: f64 = 0.0;
pub const DEFAULT_MAX_ZOOM: f64 = 16.0;

pub const DEFAULT_WIDTH: f64 = 512.0;
pub const DEFAULT_HEIGHT: f64 = 512.0;

/// Zoom values are rounded to this precision before clamping.
pub const ZOOM_PRECISION: f64 = 1e6;

/// Rotations closer than this to a multiple of 2π snap to zero.
pub const ROTATION_SNAP: f64 = 0.00001;

/// Below this |sin| - |cos| difference the pre-rotation size of rotated
/// bounds is approximated from the viewport aspect ratio.
pub const DIAGONAL_ROTATION_TOLERANCE: f64 = 0.0005;

/// Default transition duration in milliseconds.
pub const DEFAULT_TRANSITION_DURATION: f64 = 1000.0;

/// Field of view used to turn zoom levels into camera heights.
pub const CAMERA_FIELD_OF_VIEW: f64 = 30.0 * PI / 180.0;

/// Mouse wheel units per "line".
pub const WHEEL_LINE_UNITS: f64 = 120.0;

/// Pixels per line for line-mode wheel deltas.
pub const WHEEL_LINE_HEIGHT: f64 = 40.0;

/// Default debounce interval for discrete zoom accumulation (ms).
pub const DEFAULT_ZOOM_DEBOUNCE: f64 = 400.0;

/// Frame interval assumed when a momentum frame reports no elapsed time (ms).
pub const MOMENTUM_FALLBACK_DT: f64 = 30.0;

/// Maximum number of emitted events retained for polling.
pub const MAX_QUEUED_EVENTS: usize = 1024;
