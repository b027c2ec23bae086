//! Viewport state controller.
//!
//! Owns center, zoom, rotation, size and the clamp policy of one map and
//! keeps the [`Camera`] in sync with them. Every mutator runs through the same
//! pipeline: fix the requested value, derive the visible bounds, clamp them
//! against the max bounds, hand them to the camera and record an event.

use crate::core::{
    bounds::{Bounds, BoundsUpdate},
    config::MapOptions,
    constants::{DIAGONAL_ROTATION_TOLERANCE, ROTATION_SNAP, ZOOM_PRECISION, ZOOM_ZERO_PIXELS},
    geo::{Point, Size},
    projection::{affine_forward, affine_inverse, transform_point, transform_points, Crs},
};
use crate::input::events::{MapEvent, ViewState};
use crate::rendering::camera::{Camera, ProjectionType};
use crate::{MapError, Result};
use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;

/// How strictly panning is held inside the max bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClampMode {
    /// Keep the view inside the max bounds
    #[default]
    Full,
    /// Only undo the part of a pan that would move the view further out of
    /// bounds than it already was
    Limited,
    /// Let the max bounds slide up to the center of the view; used when
    /// recentring around an explicit zoom or rotation origin
    Relaxed,
}

/// Which rotations the viewport accepts
#[derive(Clone, Default)]
pub enum RotationPolicy {
    #[default]
    Free,
    /// Rotation is always zero
    Locked,
    /// Every requested rotation is passed through the function first
    Constrained(Rc<dyn Fn(f64) -> f64>),
}

impl fmt::Debug for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationPolicy::Free => f.write_str("Free"),
            RotationPolicy::Locked => f.write_str("Locked"),
            RotationPolicy::Constrained(_) => f.write_str("Constrained(..)"),
        }
    }
}

impl From<bool> for RotationPolicy {
    fn from(allow: bool) -> Self {
        if allow {
            RotationPolicy::Free
        } else {
            RotationPolicy::Locked
        }
    }
}

impl RotationPolicy {
    /// Restrict rotation to the result of `constraint`
    pub fn constrained<F>(constraint: F) -> Self
    where
        F: Fn(f64) -> f64 + 'static,
    {
        RotationPolicy::Constrained(Rc::new(constraint))
    }

    pub fn allows_rotation(&self) -> bool {
        !matches!(self, RotationPolicy::Locked)
    }
}

/// Valid zoom levels.
///
/// `orig_min` is the configured minimum; `min` may be raised above it so the
/// max bounds always fill the viewport when zoom clamping is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub orig_min: f64,
}

/// A display point and the map GCS coordinate that should stay under it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub display: Point,
    pub geo: Point,
}

/// Visible bounds in the map GCS plus the size they had before rotation
#[derive(Debug, Clone, Copy)]
struct Frame {
    bounds: Bounds,
    unrotated: Size,
}

/// Pan amount a `Limited` clamp may undo
#[derive(Debug, Clone, Copy)]
struct PanLimit {
    delta: Point,
    unit: f64,
}

/// The viewport of a single map
pub struct Viewport {
    size: Size,
    gcs: Crs,
    ingcs: Crs,
    origin: Point,
    /// Center in world coordinates
    center: Point,
    zoom: f64,
    rotation: f64,
    zoom_range: ZoomRange,
    /// Max bounds in the map GCS
    max_bounds: Bounds,
    /// Map GCS units per pixel at zoom 0
    units_per_pixel: f64,
    clamp_bounds_x: bool,
    clamp_bounds_y: bool,
    clamp_zoom: bool,
    discrete_zoom: bool,
    allow_rotation: RotationPolicy,
    camera: Camera,
    events: Vec<MapEvent>,
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("size", &self.size)
            .field("gcs", &self.gcs)
            .field("ingcs", &self.ingcs)
            .field("center", &self.center)
            .field("zoom", &self.zoom)
            .field("rotation", &self.rotation)
            .field("zoom_range", &self.zoom_range)
            .field("max_bounds", &self.max_bounds)
            .finish()
    }
}

impl Default for Viewport {
    fn default() -> Self {
        let options = MapOptions::default();
        Self::build(&options)
    }
}

impl Viewport {
    /// Create a viewport from map options.
    ///
    /// Fails when the size is not positive.
    pub fn new(options: &MapOptions) -> Result<Self> {
        if !options.size.is_positive() {
            return Err(MapError::InvalidViewport(format!(
                "{}x{}",
                options.size.width, options.size.height
            )));
        }
        if let Some(units) = options.units_per_pixel {
            if !(units.is_finite() && units > 0.0) {
                return Err(MapError::InvalidViewport(format!(
                    "units per pixel must be positive, got {units}"
                )));
            }
        }
        Ok(Self::build(options))
    }

    fn build(options: &MapOptions) -> Self {
        let gcs = options.gcs;
        let ingcs = options.ingcs;
        let max_bounds = initial_max_bounds(&options.max_bounds, ingcs, gcs);
        let units_per_pixel = options
            .units_per_pixel
            .unwrap_or((max_bounds.right - max_bounds.left) / ZOOM_ZERO_PIXELS);

        let mut viewport = Self {
            size: options.size,
            gcs,
            ingcs,
            origin: options.origin,
            center: Point::default(),
            zoom: options.zoom,
            rotation: options.rotation,
            zoom_range: ZoomRange {
                min: options.min_zoom,
                max: options.max_zoom,
                orig_min: options.min_zoom,
            },
            max_bounds,
            units_per_pixel,
            clamp_bounds_x: options.clamp_bounds_x,
            clamp_bounds_y: options.clamp_bounds_y,
            clamp_zoom: options.clamp_zoom,
            discrete_zoom: options.discrete_zoom,
            allow_rotation: RotationPolicy::from(options.allow_rotation),
            camera: Camera::new(options.camera, options.size),
            events: Vec::new(),
        };
        viewport.rotation = viewport.fix_rotation(viewport.rotation, false, false);
        viewport.reset_minimum_zoom();
        viewport.zoom = viewport.fix_zoom(viewport.zoom, false);
        viewport.set_center(options.center.unwrap_or_default(), None);
        viewport.events.clear();
        viewport
    }

    // ---------------------------------------------------------------------
    // getters
    // ---------------------------------------------------------------------

    pub fn size(&self) -> Size {
        self.size
    }

    /// Map projection
    pub fn gcs(&self) -> Crs {
        self.gcs
    }

    /// Interface projection used when no CRS is given
    pub fn ingcs(&self) -> Crs {
        self.ingcs
    }

    pub fn set_ingcs(&mut self, ingcs: Crs) {
        self.ingcs = ingcs;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Clockwise rotation in radians
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Center in `crs` (interface GCS when `None`)
    pub fn center(&self, crs: Option<Crs>) -> Point {
        self.world_to_gcs(self.center, crs)
    }

    /// Center in world coordinates
    pub fn world_center(&self) -> Point {
        self.center
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom_range
    }

    pub fn clamp_bounds_x(&self) -> bool {
        self.clamp_bounds_x
    }

    pub fn clamp_bounds_y(&self) -> bool {
        self.clamp_bounds_y
    }

    pub fn clamp_zoom(&self) -> bool {
        self.clamp_zoom
    }

    pub fn discrete_zoom(&self) -> bool {
        self.discrete_zoom
    }

    pub fn allow_rotation(&self) -> &RotationPolicy {
        &self.allow_rotation
    }

    /// World origin in the map GCS
    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Center, zoom and rotation as reported in events
    pub fn view_state(&self) -> ViewState {
        ViewState {
            center: self.center(None),
            zoom: self.zoom,
            rotation: self.rotation,
        }
    }

    /// Map GCS units per display pixel at `zoom`
    pub fn units_per_pixel(&self, zoom: f64) -> f64 {
        2f64.powf(-zoom) * self.units_per_pixel
    }

    /// Size of the unrotated area that encloses the rotated viewport
    pub fn rotated_size(&self) -> Size {
        if self.rotation == 0.0 {
            return self.size;
        }
        Bounds::rotated_around(Point::default(), self.size, self.rotation).size()
    }

    /// Events recorded since the last call, oldest first
    pub fn take_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------------
    // conversions
    // ---------------------------------------------------------------------

    fn resolve(&self, crs: Option<Crs>) -> Crs {
        crs.unwrap_or(self.ingcs)
    }

    pub fn gcs_to_world(&self, point: Point, crs: Option<Crs>) -> Point {
        transform_point(self.resolve(crs), self.gcs, point).subtract(&self.origin)
    }

    pub fn world_to_gcs(&self, point: Point, crs: Option<Crs>) -> Point {
        transform_point(self.gcs, self.resolve(crs), point.add(&self.origin))
    }

    /// Convert many points to world coordinates, preserving order
    pub fn gcs_to_world_all(&self, points: &[Point], crs: Option<Crs>) -> Vec<Point> {
        let projected = transform_points(self.resolve(crs), self.gcs, points);
        affine_forward(self.origin, Point::new(1.0, 1.0), &projected)
    }

    /// Convert many world points to `crs`, preserving order
    pub fn world_to_gcs_all(&self, points: &[Point], crs: Option<Crs>) -> Vec<Point> {
        let shifted = affine_inverse(self.origin, Point::new(1.0, 1.0), points);
        transform_points(self.gcs, self.resolve(crs), &shifted)
    }

    pub fn gcs_to_display(&self, point: Point, crs: Option<Crs>) -> Point {
        self.camera.world_to_display(self.gcs_to_world(point, crs))
    }

    pub fn display_to_gcs(&self, point: Point, crs: Option<Crs>) -> Point {
        self.world_to_gcs(self.camera.display_to_world(point), crs)
    }

    pub fn world_to_display(&self, point: Point) -> Point {
        self.camera.world_to_display(point)
    }

    pub fn display_to_world(&self, point: Point) -> Point {
        self.camera.display_to_world(point)
    }

    /// Anchor keeping the map location currently under `display` in place
    pub fn anchor_at(&self, display: Point) -> Anchor {
        Anchor {
            display,
            geo: self.display_to_gcs(display, Some(self.gcs)),
        }
    }

    // ---------------------------------------------------------------------
    // fixing values
    // ---------------------------------------------------------------------

    /// Nearest valid zoom level for the current settings
    pub fn fix_zoom(&self, zoom: f64, ignore_discrete: bool) -> f64 {
        let mut zoom = (zoom * ZOOM_PRECISION).round() / ZOOM_PRECISION;
        zoom = zoom.min(self.zoom_range.max).max(self.zoom_range.min);
        if self.discrete_zoom && !ignore_discrete {
            zoom = zoom.round();
            if zoom < self.zoom_range.min {
                zoom = self.zoom_range.min.ceil();
            }
        }
        zoom
    }

    /// Valid rotation for the current policy.
    ///
    /// Unless `no_range_limit` is set the result is in `[0, 2π)`, and values
    /// within a hair of a full turn snap to zero.
    pub fn fix_rotation(&self, rotation: f64, ignore_constraint: bool, no_range_limit: bool) -> f64 {
        let mut rotation = match &self.allow_rotation {
            RotationPolicy::Locked => return 0.0,
            RotationPolicy::Constrained(constraint) if !ignore_constraint => constraint(rotation),
            _ => rotation,
        };
        if !no_range_limit {
            let range = 2.0 * PI;
            rotation = rotation % range + if rotation >= 0.0 { 0.0 } else { range };
            if rotation.abs().min((rotation - range).abs()) < ROTATION_SNAP {
                rotation = 0.0;
            }
        }
        rotation
    }

    /// Scale factors growing `bounds` to the viewport aspect ratio
    fn camera_scaling(&self, bounds: &Bounds) -> (f64, f64) {
        let aspect_bounds = (bounds.width() / bounds.height()).abs();
        let aspect_viewport = self.size.aspect();
        if aspect_bounds > aspect_viewport {
            (1.0, aspect_bounds / aspect_viewport)
        } else {
            (aspect_viewport / aspect_bounds, 1.0)
        }
    }

    /// Zoom at which `bounds` (map GCS) exactly fit the viewport
    fn calculate_zoom(&self, bounds: &Bounds, rotation: f64) -> f64 {
        let bounds = bounds.rotate(rotation);
        let (sclx, scly) = self.camera_scaling(&bounds);
        if scly > sclx {
            -(bounds.width().abs() * sclx / (self.size.width * self.units_per_pixel)).log2()
        } else {
            -(bounds.height().abs() * scly / (self.size.height * self.units_per_pixel)).log2()
        }
    }

    fn reset_minimum_zoom(&mut self) {
        self.zoom_range.min = if self.clamp_zoom {
            self.zoom_range
                .orig_min
                .max(self.calculate_zoom(&self.max_bounds, self.rotation))
        } else {
            self.zoom_range.orig_min
        };
    }

    /// Clamp `bounds` (map GCS) against the max bounds.
    ///
    /// Returns the adjusted bounds and whether anything moved. Nothing
    /// happens when neither axis is clamped.
    fn fix_bounds(
        &self,
        bounds: Bounds,
        unrotated: Option<Size>,
        rotation: f64,
        limit: Option<PanLimit>,
        relaxed: bool,
    ) -> (Bounds, bool) {
        if !self.clamp_bounds_x && !self.clamp_bounds_y {
            return (bounds, false);
        }
        let mut max = self.max_bounds;
        if rotation != 0.0 {
            // grow the max bounds by as much as the rotation grew the view so
            // every corner of the unrotated max bounds stays reachable
            let bw = bounds.width().abs();
            let bh = bounds.height().abs();
            let absin = rotation.sin().abs();
            let abcos = rotation.cos().abs();
            let (ow, oh) = match unrotated {
                Some(size) if size.is_positive() => (size.width, size.height),
                _ if (absin - abcos).abs() < DIAGONAL_ROTATION_TOLERANCE => {
                    // The inverse below is singular at 45°. Approximate the
                    // pre-rotation size with the viewport aspect ratio.
                    let aspect = self.size.aspect().abs();
                    let fac = (1.0 + aspect * aspect).sqrt();
                    let ow = bw.max(bh) / fac;
                    (ow, ow * aspect)
                }
                _ => {
                    let det = abcos * abcos - absin * absin;
                    ((abcos * bw - absin * bh) / det, (abcos * bh - absin * bw) / det)
                }
            };
            let bdx = bw - (abcos * ow).max(absin * oh);
            let bdy = bh - (abcos * oh).max(absin * ow);
            max = Bounds::new(max.left - bdx, max.bottom - bdy, max.right + bdx, max.top + bdy);
        }
        if relaxed {
            let half_width = bounds.width() / 2.0;
            let half_height = bounds.height() / 2.0;
            max = Bounds::new(
                max.left - half_width,
                max.bottom - half_height,
                max.right + half_width,
                max.top + half_height,
            );
        }

        let mut fixed = bounds;
        let mut changed = false;
        if self.clamp_bounds_x {
            let dx = if bounds.width() > max.width() {
                max.left - (bounds.width() - max.width()) / 2.0 - bounds.left
            } else if bounds.left < max.left {
                max.left - bounds.left
            } else if bounds.right > max.right {
                max.right - bounds.right
            } else {
                0.0
            };
            if let Some(dx) = limited_shift(dx, limit.map(|l| (l.delta.x, l.unit))) {
                fixed = fixed.translated(dx, 0.0);
                changed = true;
            }
        }
        if self.clamp_bounds_y {
            let dy = if bounds.height() > max.height() {
                max.bottom - (bounds.height() - max.height()) / 2.0 - bounds.bottom
            } else if bounds.top > max.top {
                max.top - bounds.top
            } else if bounds.bottom < max.bottom {
                max.bottom - bounds.bottom
            } else {
                0.0
            };
            // display y grows downwards
            if let Some(dy) = limited_shift(dy, limit.map(|l| (-l.delta.y, l.unit))) {
                fixed = fixed.translated(0.0, dy);
                changed = true;
            }
        }
        (fixed, changed)
    }

    fn frame_from_zoom_and_center(
        &self,
        zoom: f64,
        center: Point,
        rotation: f64,
        ignore_discrete: bool,
        relaxed: bool,
    ) -> Frame {
        let zoom = self.fix_zoom(zoom, ignore_discrete);
        let units = self.units_per_pixel(zoom);
        let size = Size::new(self.size.width * units, self.size.height * units);
        let center = center.add(&self.origin);
        let bounds = if rotation != 0.0 {
            Bounds::rotated_around(center, size, rotation)
        } else {
            Bounds::from_center_and_size(center, size)
        };
        let (bounds, _) = self.fix_bounds(bounds, Some(size), rotation, None, relaxed);
        Frame {
            bounds,
            unrotated: size,
        }
    }

    /// Push a frame to the camera and read the resulting center back
    fn camera_bounds(&mut self, frame: Frame, rotation: f64) {
        self.camera.set_rotation(rotation);
        let world = frame.bounds.translated(-self.origin.x, -self.origin.y);
        if rotation != 0.0 && frame.unrotated.is_positive() {
            self.camera
                .view_from_center_size_rotation(world.center(), frame.unrotated, rotation);
        } else {
            self.camera.set_bounds(&world);
        }
        self.center = self.camera.bounds().center();
    }

    fn emit(&mut self, event: MapEvent) {
        self.events.push(event);
    }

    // ---------------------------------------------------------------------
    // navigation
    // ---------------------------------------------------------------------

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom_to(zoom, None, false);
    }

    /// Zoom in place, keeping the location under `display` fixed
    pub fn zoom_around(&mut self, zoom: f64, display: Point) {
        let anchor = self.anchor_at(display);
        self.zoom_to(zoom, Some(anchor), false);
    }

    /// Set the zoom level.
    ///
    /// With an `origin` the view is shifted afterwards so `origin.geo` is
    /// displayed at `origin.display` again, and clamping is relaxed for that
    /// shift.
    pub fn zoom_to(&mut self, zoom: f64, origin: Option<Anchor>, ignore_discrete: bool) {
        let zoom = self.fix_zoom(zoom, ignore_discrete);
        if zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        let frame = self.frame_from_zoom_and_center(
            zoom,
            self.center,
            self.rotation,
            ignore_discrete,
            origin.is_some(),
        );
        self.camera_bounds(frame, self.rotation);
        self.emit(MapEvent::Zoom {
            zoom,
            screen_position: origin.map(|anchor| anchor.display),
            view: self.view_state(),
        });

        match origin {
            Some(anchor) => {
                let shifted = self.gcs_to_display(anchor.geo, Some(self.gcs));
                self.pan_with(anchor.display.subtract(&shifted), ignore_discrete, ClampMode::Relaxed);
            }
            None => self.pan_with(Point::default(), ignore_discrete, ClampMode::Full),
        }
    }

    /// Pan by display pixels with full clamping
    pub fn pan(&mut self, delta: Point) {
        self.pan_with(delta, false, ClampMode::Full);
    }

    /// Pan by display pixels.
    ///
    /// The pan event reports the delta that was actually applied after
    /// clamping.
    pub fn pan_with(&mut self, delta: Point, ignore_discrete: bool, mode: ClampMode) {
        let unit = self.units_per_pixel(self.zoom);
        if delta.x != 0.0 || delta.y != 0.0 {
            let (sin, cos) = self.rotation.sin_cos();
            self.camera.pan(Point::new(
                (delta.x * cos + delta.y * sin) * unit,
                (delta.x * sin - delta.y * cos) * unit,
            ));
        }

        let mut screen_delta = delta;
        let world = self.camera.bounds();
        let limit = match mode {
            ClampMode::Limited => Some(PanLimit { delta, unit }),
            _ => None,
        };
        let (fixed, changed) = self.fix_bounds(
            world.translated(self.origin.x, self.origin.y),
            None,
            self.rotation,
            limit,
            mode == ClampMode::Relaxed,
        );
        if changed {
            let corner = Point::new(world.left, world.top);
            let before = self.camera.world_to_display(corner);
            let frame = self.frame_from_zoom_and_center(
                self.zoom,
                fixed.center().subtract(&self.origin),
                self.rotation,
                ignore_discrete,
                true,
            );
            self.camera_bounds(frame, self.rotation);
            let after = self.camera.world_to_display(corner);
            screen_delta = screen_delta.add(&after.subtract(&before));
        }

        self.center = self.camera.display_to_world(self.size.center());
        self.emit(MapEvent::Pan {
            screen_delta,
            view: self.view_state(),
        });
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotate_to(rotation, None, false);
    }

    /// Set the rotation, optionally about `origin`.
    ///
    /// Rotating can change the minimum zoom, so the zoom is re-validated
    /// afterwards.
    pub fn rotate_to(&mut self, rotation: f64, origin: Option<Anchor>, ignore_constraint: bool) {
        let rotation = self.fix_rotation(rotation, ignore_constraint, false);
        if rotation == self.rotation {
            return;
        }
        self.rotation = rotation;
        let frame =
            self.frame_from_zoom_and_center(self.zoom, self.center, rotation, ignore_constraint, true);
        self.camera_bounds(frame, rotation);
        self.emit(MapEvent::Rotate {
            rotation,
            screen_position: origin.map(|anchor| anchor.display),
            view: self.view_state(),
        });

        let delta = match origin {
            Some(anchor) => anchor
                .display
                .subtract(&self.gcs_to_display(anchor.geo, Some(self.gcs))),
            None => Point::default(),
        };
        self.pan_with(delta, false, ClampMode::Relaxed);
        self.reset_minimum_zoom();
        self.zoom_to(self.zoom, None, ignore_constraint);
    }

    /// Center the view on `point` given in `crs`
    pub fn set_center(&mut self, point: Point, crs: Option<Crs>) {
        self.center_with(point, crs, false, ClampMode::Full);
    }

    pub fn center_with(&mut self, point: Point, crs: Option<Crs>, ignore_discrete: bool, mode: ClampMode) {
        let center = self.gcs_to_world(point, crs);
        let frame = self.frame_from_zoom_and_center(
            self.zoom,
            center,
            self.rotation,
            ignore_discrete,
            mode == ClampMode::Relaxed,
        );
        self.camera_bounds(frame, self.rotation);
        self.emit(MapEvent::Pan {
            screen_delta: Point::default(),
            view: self.view_state(),
        });
    }

    /// Center the view on a world coordinate without clamping.
    pub(crate) fn set_world_center(&mut self, center: Point) {
        self.center = center;
    }

    // ---------------------------------------------------------------------
    // bounds
    // ---------------------------------------------------------------------

    /// Visible bounds in `crs`
    pub fn bounds(&self, crs: Option<Crs>) -> Bounds {
        let frame = self.frame_from_zoom_and_center(self.zoom, self.center, self.rotation, true, false);
        self.bounds_to_crs(frame.bounds, crs)
    }

    /// Fit the view to `bounds` given in `crs`
    pub fn set_bounds(&mut self, bounds: Bounds, crs: Option<Crs>) -> Result<()> {
        let bounds = self.bounds_to_gcs(bounds, crs);
        validate_bounds(&bounds)?;
        let (bounds, _) = self.fix_bounds(bounds, None, self.rotation, None, false);
        let (zoom, center) = self.zoom_and_center_from_bounds(bounds, self.rotation, Some(self.gcs))?;
        self.zoom_to(zoom, None, false);
        self.set_center(center, Some(self.gcs));
        Ok(())
    }

    /// Zoom and center that make `bounds` fill the viewport at `rotation`.
    ///
    /// Both `bounds` and the returned center are in `crs`.
    pub fn zoom_and_center_from_bounds(
        &self,
        bounds: Bounds,
        rotation: f64,
        crs: Option<Crs>,
    ) -> Result<(f64, Point)> {
        let bounds = self.bounds_to_gcs(bounds, crs);
        validate_bounds(&bounds)?;
        let zoom = self.fix_zoom(self.calculate_zoom(&bounds, rotation), false);
        let (bounds, _) = self.fix_bounds(bounds, None, rotation, None, false);
        let center = transform_point(self.gcs, self.resolve(crs), bounds.center());
        Ok((zoom, center))
    }

    /// Bounds shown at `zoom` around `center`, both in `crs`.
    ///
    /// The result may not have the requested center when clamping applies.
    pub fn bounds_from_zoom_and_center(
        &self,
        zoom: f64,
        center: Point,
        rotation: f64,
        crs: Option<Crs>,
        ignore_discrete: bool,
        relaxed: bool,
    ) -> Bounds {
        let center = self.gcs_to_world(center, crs);
        let frame = self.frame_from_zoom_and_center(zoom, center, rotation, ignore_discrete, relaxed);
        self.bounds_to_crs(frame.bounds, crs)
    }

    fn bounds_to_gcs(&self, bounds: Bounds, crs: Option<Crs>) -> Bounds {
        let source = self.resolve(crs);
        if source == self.gcs {
            return bounds;
        }
        let upper_left = transform_point(source, self.gcs, Point::new(bounds.left, bounds.top));
        let lower_right = transform_point(source, self.gcs, Point::new(bounds.right, bounds.bottom));
        Bounds::new(upper_left.x, lower_right.y, lower_right.x, upper_left.y)
    }

    fn bounds_to_crs(&self, bounds: Bounds, crs: Option<Crs>) -> Bounds {
        let target = self.resolve(crs);
        if target == self.gcs {
            return bounds;
        }
        let upper_left = transform_point(self.gcs, target, Point::new(bounds.left, bounds.top));
        let lower_right = transform_point(self.gcs, target, Point::new(bounds.right, bounds.bottom));
        Bounds::new(upper_left.x, lower_right.y, lower_right.x, upper_left.y)
    }

    /// Max bounds converted edge by edge to `crs`
    pub fn max_bounds(&self, crs: Option<Crs>) -> Bounds {
        let target = self.resolve(crs);
        let max = self.max_bounds;
        Bounds::new(
            transform_point(self.gcs, target, Point::new(max.left, 0.0)).x,
            transform_point(self.gcs, target, Point::new(0.0, max.bottom)).y,
            transform_point(self.gcs, target, Point::new(max.right, 0.0)).x,
            transform_point(self.gcs, target, Point::new(0.0, max.top)).y,
        )
    }

    /// Replace some or all edges of the max bounds
    pub fn set_max_bounds(&mut self, update: BoundsUpdate, crs: Option<Crs>) {
        let source = self.resolve(crs);
        let cx = (update.left.unwrap_or(0.0) + update.right.unwrap_or(0.0)) / 2.0;
        let cy = (update.bottom.unwrap_or(0.0) + update.top.unwrap_or(0.0)) / 2.0;
        if let Some(left) = update.left {
            self.max_bounds.left = transform_point(source, self.gcs, Point::new(left, cy)).x;
        }
        if let Some(right) = update.right {
            self.max_bounds.right = transform_point(source, self.gcs, Point::new(right, cy)).x;
        }
        if let Some(bottom) = update.bottom {
            self.max_bounds.bottom = transform_point(source, self.gcs, Point::new(cx, bottom)).y;
        }
        if let Some(top) = update.top {
            self.max_bounds.top = transform_point(source, self.gcs, Point::new(cx, top)).y;
        }
        self.reset_minimum_zoom();
        self.zoom_to(self.zoom, None, false);
        self.pan(Point::default());
    }

    // ---------------------------------------------------------------------
    // settings
    // ---------------------------------------------------------------------

    /// Change the zoom range; `None` keeps the current limit
    pub fn set_zoom_range(&mut self, min: Option<f64>, max: Option<f64>, refresh: bool) {
        if let Some(max) = max {
            self.zoom_range.max = max;
        }
        if let Some(min) = min {
            self.zoom_range.min = min;
            self.zoom_range.orig_min = min;
        }
        self.reset_minimum_zoom();
        if refresh {
            self.zoom_to(self.zoom, None, false);
        }
    }

    pub fn set_clamp_bounds_x(&mut self, clamp: bool) {
        if clamp != self.clamp_bounds_x {
            self.clamp_bounds_x = clamp;
            self.pan(Point::default());
        }
    }

    pub fn set_clamp_bounds_y(&mut self, clamp: bool) {
        if clamp != self.clamp_bounds_y {
            self.clamp_bounds_y = clamp;
            self.pan(Point::default());
        }
    }

    pub fn set_clamp_zoom(&mut self, clamp: bool) {
        if clamp != self.clamp_zoom {
            self.clamp_zoom = clamp;
            self.reset_minimum_zoom();
            self.zoom_to(self.zoom, None, false);
        }
    }

    pub fn set_discrete_zoom(&mut self, discrete: bool) {
        if discrete != self.discrete_zoom {
            self.discrete_zoom = discrete;
            if discrete {
                self.zoom_to(self.zoom.round(), None, false);
            }
        }
    }

    /// Replace the rotation policy and re-validate the current rotation
    pub fn set_allow_rotation(&mut self, policy: RotationPolicy) {
        self.allow_rotation = policy;
        self.rotate_to(self.rotation, None, false);
    }

    /// Resize the viewport, keeping the same location at its center
    pub fn set_size(&mut self, size: Size) {
        let old_center = self.center(None);
        if size.width > 0.0 {
            self.size.width = size.width;
        }
        if size.height > 0.0 {
            self.size.height = size.height;
        }
        self.reset_minimum_zoom();
        let zoom = self.fix_zoom(self.zoom, false);
        if zoom != self.zoom {
            self.zoom_to(zoom, None, false);
        }
        if let Err(err) = self.camera.set_viewport(self.size) {
            log::warn!(target: "mapview", "camera rejected viewport: {err}");
        }
        self.set_center(old_center, None);
        self.emit(MapEvent::Resize { size: self.size });
    }

    /// Change the map projection, keeping the center location
    pub fn set_gcs(&mut self, gcs: Crs) {
        if gcs == self.gcs {
            return;
        }
        let old_center = self.center(None);
        let old_gcs = self.gcs;
        let max = self.max_bounds;
        let upper_left = transform_point(old_gcs, gcs, Point::new(max.left, max.top));
        let lower_right = transform_point(old_gcs, gcs, Point::new(max.right, max.bottom));
        self.max_bounds = Bounds::new(upper_left.x, lower_right.y, lower_right.x, upper_left.y);
        self.origin = transform_point(old_gcs, gcs, self.origin);
        self.gcs = gcs;
        self.reset_minimum_zoom();
        let zoom = self.fix_zoom(self.zoom, false);
        if zoom != self.zoom {
            self.zoom_to(zoom, None, false);
        }
        self.set_center(old_center, None);
    }

    /// Move the world origin, keeping the view where it is
    pub fn set_origin(&mut self, origin: Point) {
        let center = self.center(Some(self.gcs));
        self.origin = origin;
        self.center_with(center, Some(self.gcs), true, ClampMode::Full);
    }

    /// Override the scale so that `units` map units span one pixel at `zoom`
    pub fn set_units_per_pixel(&mut self, zoom: f64, units: f64) {
        if !(units.is_finite() && units > 0.0) {
            log::warn!(target: "mapview", "ignoring non-positive units per pixel {units}");
            return;
        }
        log::warn!(
            target: "mapview",
            "overriding units per pixel {} with {}",
            self.units_per_pixel,
            2f64.powf(zoom) * units
        );
        let center = self.center(None);
        self.units_per_pixel = 2f64.powf(zoom) * units;
        self.reset_minimum_zoom();
        self.zoom = self.fix_zoom(self.zoom, false);
        self.set_center(center, None);
    }

    /// Switch between perspective and parallel projection
    pub fn set_projection(&mut self, projection: ProjectionType) {
        self.camera.set_projection(projection);
    }
}

/// Shift to apply for a `Limited` clamp, or the whole shift without a limit
fn limited_shift(shift: f64, limit: Option<(f64, f64)>) -> Option<f64> {
    if shift == 0.0 {
        return None;
    }
    match limit {
        None => Some(shift),
        Some((delta, _)) if delta * shift <= 0.0 => None,
        Some((delta, unit)) => {
            let cap = (delta * unit).abs();
            Some(if shift.abs() > cap { cap * shift.signum() } else { shift })
        }
    }
}

fn validate_bounds(bounds: &Bounds) -> Result<()> {
    if !bounds.is_valid() {
        return Err(MapError::InvalidBounds(format!(
            "left {} bottom {} right {} top {}",
            bounds.left, bounds.bottom, bounds.right, bounds.top
        )));
    }
    Ok(())
}

/// Max bounds in the map GCS.
///
/// Missing horizontal edges default to ±180 in the interface GCS; missing
/// vertical edges copy the horizontal ones so the world is square.
fn initial_max_bounds(update: &BoundsUpdate, ingcs: Crs, gcs: Crs) -> Bounds {
    let cx = (update.left.unwrap_or(0.0) + update.right.unwrap_or(0.0)) / 2.0;
    let cy = (update.bottom.unwrap_or(0.0) + update.top.unwrap_or(0.0)) / 2.0;
    let left = transform_point(ingcs, gcs, Point::new(update.left.unwrap_or(-180.0), cy)).x;
    let right = transform_point(ingcs, gcs, Point::new(update.right.unwrap_or(180.0), cy)).x;
    let top = update
        .top
        .map_or(right, |top| transform_point(ingcs, gcs, Point::new(cx, top)).y);
    let bottom = update
        .bottom
        .map_or(left, |bottom| transform_point(ingcs, gcs, Point::new(cx, bottom)).y);
    Bounds::new(left, bottom, right, top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn viewport() -> Viewport {
        Viewport::default()
    }

    fn unclamped() -> Viewport {
        let options = MapOptions {
            clamp_bounds_x: false,
            clamp_bounds_y: false,
            ..MapOptions::default()
        };
        Viewport::new(&options).unwrap()
    }

    #[test]
    fn test_default_state() {
        let vp = viewport();
        assert_eq!(vp.zoom(), 4.0);
        assert_eq!(vp.rotation(), 0.0);
        assert!(vp.center(None).approx_eq(&Point::new(0.0, 0.0), 1e-9));
        // a square world spanning 256 px at zoom 0 fills 512 px at zoom 1
        assert!((vp.zoom_range().min - 1.0).abs() < 1e-9);
        assert_eq!(vp.zoom_range().orig_min, 0.0);
        let max = vp.max_bounds(Some(Crs::WebMercator));
        assert!((max.width() - max.height()).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let options = MapOptions {
            size: Size::new(0.0, 100.0),
            ..MapOptions::default()
        };
        assert!(matches!(Viewport::new(&options), Err(MapError::InvalidViewport(_))));
    }

    #[test]
    fn test_zoom_clamp_idempotence() {
        let mut vp = viewport();
        for value in [-3.0, 0.5, 1.0, 2.25, 7.123_456_789, 16.0, 40.0] {
            vp.set_zoom(value);
            let range = vp.zoom_range();
            let expected = ((value * 1e6_f64).round() / 1e6).clamp(range.min, range.max);
            assert!((vp.zoom() - expected).abs() < 1e-12, "{value}");
        }

        vp.set_discrete_zoom(true);
        for value in [2.4, 2.6, 9.5, -1.0] {
            vp.set_zoom(value);
            let range = vp.zoom_range();
            let expected = value.clamp(range.min, range.max).round().max(range.min.ceil());
            assert_eq!(vp.zoom(), expected);
        }
    }

    #[test]
    fn test_rotation_normalization() {
        let mut vp = viewport();
        for theta in [0.3, -0.3, 4.0 * PI + 0.1, -7.0] {
            vp.set_rotation(theta);
            let first = vp.rotation();
            assert!((0.0..2.0 * PI).contains(&first));
            vp.set_rotation(theta + 2.0 * PI);
            assert!((vp.rotation() - first).abs() < 1e-9);
        }
        vp.set_rotation(2.0 * PI - 1e-7);
        assert_eq!(vp.rotation(), 0.0);
    }

    #[test]
    fn test_locked_and_constrained_rotation() {
        let mut vp = viewport();
        vp.set_rotation(1.0);
        vp.set_allow_rotation(RotationPolicy::Locked);
        assert_eq!(vp.rotation(), 0.0);
        vp.set_rotation(1.0);
        assert_eq!(vp.rotation(), 0.0);

        let quarter = PI / 2.0;
        vp.set_allow_rotation(RotationPolicy::constrained(move |r| (r / quarter).round() * quarter));
        vp.set_rotation(1.4);
        assert!((vp.rotation() - quarter).abs() < 1e-12);
        vp.rotate_to(1.4, None, true);
        assert!((vp.rotation() - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_transform() {
        let mut vp = viewport();
        vp.set_zoom(6.5);
        vp.set_rotation(0.7);
        for pixel in [Point::new(0.0, 0.0), Point::new(100.0, 412.0), Point::new(512.0, 512.0)] {
            let back = vp.world_to_display(vp.display_to_world(pixel));
            assert!(back.approx_eq(&pixel, 1e-6));
            let geo = vp.display_to_gcs(pixel, None);
            assert!(vp.gcs_to_display(geo, None).approx_eq(&pixel, 1e-6));
        }
    }

    #[test]
    fn test_bulk_conversions_match_scalar() {
        let mut vp = viewport();
        vp.set_origin(Point::new(1000.0, -2000.0));
        let points = vec![Point::new(1.0, 2.0), Point::new(-30.0, 45.0)];
        let world = vp.gcs_to_world_all(&points, None);
        for (p, w) in points.iter().zip(world.iter()) {
            assert!(vp.gcs_to_world(*p, None).approx_eq(w, 1e-9));
        }
        let back = vp.world_to_gcs_all(&world, None);
        for (p, b) in points.iter().zip(back.iter()) {
            assert!(p.approx_eq(b, 1e-9));
        }
    }

    #[test]
    fn test_origin_keeps_view() {
        let mut vp = viewport();
        vp.set_center(Point::new(10.0, 20.0), None);
        let before = vp.bounds(None);
        vp.set_origin(Point::new(1_000_000.0, 2_000_000.0));
        assert!(vp.center(None).approx_eq(&Point::new(10.0, 20.0), 1e-9));
        assert!(vp.bounds(None).approx_eq(&before, 1e-9));
        assert!(vp.world_center().approx_eq(
            &vp.gcs_to_world(Point::new(10.0, 20.0), None),
            1e-6
        ));
    }

    #[test]
    fn test_pan_reversibility() {
        let mut vp = unclamped();
        vp.set_center(Point::new(12.0, -8.0), None);
        let before = vp.center(None);
        vp.pan(Point::new(10.0, 5.0));
        assert!(!vp.center(None).approx_eq(&before, 1e-9));
        vp.pan(Point::new(-10.0, -5.0));
        assert!(vp.center(None).approx_eq(&before, 1e-9));
    }

    #[test]
    fn test_pan_direction() {
        let mut vp = unclamped();
        let before = vp.center(None);
        // dragging the map to the right reveals what is to the west
        vp.pan(Point::new(100.0, 0.0));
        assert!(vp.center(None).x < before.x);
    }

    #[test]
    fn test_clamped_pan_saturates() {
        let mut vp = viewport();
        vp.set_clamp_bounds_x(true);
        vp.pan(Point::new(-1.0e6, 0.0));
        let bounds = vp.bounds(Some(Crs::WebMercator));
        let max = vp.max_bounds(Some(Crs::WebMercator));
        assert!((bounds.right - max.right).abs() < 1e-3);

        let events = vp.take_events();
        match events.last() {
            Some(MapEvent::Pan { screen_delta, .. }) => assert!(screen_delta.x > -1.0e6),
            other => panic!("expected a pan event, got {other:?}"),
        }
    }

    #[test]
    fn test_limited_clamp_never_worsens() {
        let mut vp = viewport();
        vp.set_clamp_bounds_x(true);
        vp.set_zoom(3.0);
        vp.set_center(Point::new(170.0, 0.0), None);
        let max = vp.max_bounds(Some(Crs::WebMercator));
        let right = vp.bounds(Some(Crs::WebMercator)).right;
        assert!(right <= max.right + 1e-3);

        // moving further out is refused
        vp.pan_with(Point::new(-50.0, 0.0), false, ClampMode::Limited);
        assert!(vp.bounds(Some(Crs::WebMercator)).right <= max.right + 1e-3);
        // moving back in is allowed
        vp.pan_with(Point::new(50.0, 0.0), false, ClampMode::Limited);
        assert!(vp.bounds(Some(Crs::WebMercator)).right < right);
    }

    #[test]
    fn test_zoom_around_cursor() {
        let mut vp = viewport();
        let cursor = Point::new(400.0, 100.0);
        let before = vp.display_to_gcs(cursor, None);
        vp.zoom_around(5.0, cursor);
        assert_eq!(vp.zoom(), 5.0);
        let after = vp.display_to_gcs(cursor, None);
        assert!(after.approx_eq(&before, 1e-6), "{after:?} != {before:?}");
    }

    #[test]
    fn test_rotate_around_point() {
        let mut vp = unclamped();
        let pivot = Point::new(100.0, 300.0);
        let before = vp.display_to_gcs(pivot, None);
        let anchor = vp.anchor_at(pivot);
        vp.rotate_to(0.5, Some(anchor), false);
        assert!(vp.display_to_gcs(pivot, None).approx_eq(&before, 1e-6));
    }

    #[test]
    fn test_rotation_changes_min_zoom() {
        let mut vp = viewport();
        let unrotated = vp.zoom_range().min;
        // the rotated bounding box of the max bounds is larger
        vp.set_rotation(PI / 4.0);
        assert!((vp.zoom_range().min - (unrotated - 0.5)).abs() < 1e-9);
        assert!(vp.zoom() >= vp.zoom_range().min);
    }

    #[test]
    fn test_diagonal_rotation_stays_finite() {
        let mut vp = viewport();
        vp.set_clamp_bounds_x(true);
        vp.set_rotation(PI / 4.0);
        vp.pan(Point::new(37.0, -12.0));
        let bounds = vp.bounds(Some(Crs::WebMercator));
        assert!(bounds.left.is_finite() && bounds.top.is_finite());
        assert!(vp.center(None).is_finite());
    }

    #[test]
    fn test_invalid_bounds() {
        let mut vp = viewport();
        let err = vp.set_bounds(Bounds::new(10.0, 0.0, 5.0, 10.0), None).unwrap_err();
        assert!(matches!(err, MapError::InvalidBounds(_)));
        assert!(vp.set_bounds(Bounds::new(0.0, 5.0, 10.0, 5.0), None).is_err());
    }

    #[test]
    fn test_set_bounds_fits_view() {
        let mut vp = viewport();
        vp.set_bounds(Bounds::new(-10.0, -10.0, 10.0, 10.0), None).unwrap();
        let bounds = vp.bounds(None);
        assert!((bounds.bottom - -10.0).abs() < 1e-4);
        assert!((bounds.top - 10.0).abs() < 1e-4);
        assert!(bounds.left <= -10.0 + 1e-4);
        assert!(vp.center(None).approx_eq(&Point::new(0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_zoom_and_center_from_bounds() {
        let vp = viewport();
        let (zoom, center) = vp
            .zoom_and_center_from_bounds(Bounds::new(0.0, 0.0, 20.0, 20.0), 0.0, None)
            .unwrap();
        assert!(zoom > 4.0);
        assert!((center.x - 10.0).abs() < 1e-9);
        let bounds = vp.bounds_from_zoom_and_center(zoom, center, 0.0, None, false, false);
        assert!(bounds.left <= 1e-6 && bounds.right >= 20.0 - 1e-6);
    }

    #[test]
    fn test_max_bounds_update() {
        let mut vp = viewport();
        vp.set_max_bounds(
            BoundsUpdate {
                left: Some(-10.0),
                right: Some(10.0),
                bottom: Some(-10.0),
                top: Some(10.0),
            },
            None,
        );
        let max = vp.max_bounds(None);
        assert!((max.left - -10.0).abs() < 1e-9);
        assert!((max.right - 10.0).abs() < 1e-9);
        // smaller max bounds push the minimum zoom and the zoom up
        assert!(vp.zoom_range().min > 5.0);
        assert!(vp.zoom() >= vp.zoom_range().min);
    }

    #[test]
    fn test_set_size_keeps_center() {
        let mut vp = viewport();
        vp.set_center(Point::new(20.0, 30.0), None);
        vp.take_events();
        vp.set_size(Size::new(800.0, 300.0));
        assert_eq!(vp.size(), Size::new(800.0, 300.0));
        assert!(vp.center(None).approx_eq(&Point::new(20.0, 30.0), 1e-6));
        assert!(vp
            .take_events()
            .iter()
            .any(|e| *e == MapEvent::Resize { size: Size::new(800.0, 300.0) }));

        vp.set_size(Size::new(-5.0, 0.0));
        assert_eq!(vp.size(), Size::new(800.0, 300.0));
    }

    #[test]
    fn test_rotated_size() {
        let mut vp = unclamped();
        vp.set_size(Size::new(400.0, 200.0));
        assert_eq!(vp.rotated_size(), Size::new(400.0, 200.0));
        vp.set_rotation(PI / 2.0);
        let rotated = vp.rotated_size();
        assert!((rotated.width - 200.0).abs() < 1e-9);
        assert!((rotated.height - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_units_per_pixel() {
        let mut vp = viewport();
        let base = vp.units_per_pixel(0.0);
        assert!((vp.units_per_pixel(1.0) - base / 2.0).abs() < 1e-9);
        vp.set_units_per_pixel(0.0, base * 2.0);
        assert!((vp.units_per_pixel(0.0) - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_event_carries_view() {
        let mut vp = viewport();
        vp.take_events();
        vp.set_zoom(6.0);
        let events = vp.take_events();
        assert!(matches!(
            events.first(),
            Some(MapEvent::Zoom { zoom, screen_position: None, view }) if *zoom == 6.0 && view.zoom == 6.0
        ));
        vp.set_zoom(6.0);
        assert!(vp.take_events().is_empty());
    }

    #[test]
    fn test_gcs_switch_keeps_center() {
        let mut vp = unclamped();
        vp.set_center(Point::new(5.0, 5.0), None);
        vp.set_gcs(Crs::Geographic);
        assert_eq!(vp.gcs(), Crs::Geographic);
        assert!(vp.center(None).approx_eq(&Point::new(5.0, 5.0), 1e-6));
    }
}
