//! Map camera.
//!
//! View and projection matrices mapping world coordinates to display pixels,
//! with change notifications for renderers.

use crate::core::{
    bounds::Bounds,
    geo::{Point, Size},
};
use crate::{MapError, Result};
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clip volume the projection matrices are built from.
const CLIP_LEFT: f64 = -1.0;
const CLIP_RIGHT: f64 = 1.0;
const CLIP_BOTTOM: f64 = -1.0;
const CLIP_TOP: f64 = 1.0;
const CLIP_NEAR: f64 = -1.0;
const CLIP_FAR: f64 = -2.0;

/// The map surface sits on the far plane: world z is shifted by this amount
/// before projecting so both projection types agree at z = 0.
const SURFACE_DEPTH: f64 = 2.0;

/// Camera projection types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionType {
    /// Orthographic projection
    Parallel,
    /// Frustum projection
    Perspective,
}

impl FromStr for ProjectionType {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parallel" => Ok(ProjectionType::Parallel),
            "perspective" => Ok(ProjectionType::Perspective),
            other => Err(MapError::UnsupportedProjection(other.to_string())),
        }
    }
}

impl fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionType::Parallel => f.write_str("parallel"),
            ProjectionType::Perspective => f.write_str("perspective"),
        }
    }
}

/// Which matrix [`Camera::css`] renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssTransform {
    /// World to display pixels
    Display,
    /// Display pixels to world
    World,
}

/// Change notifications raised by the camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraEvent {
    /// The view matrix changed
    View,
    /// The projection type changed
    Projection(ProjectionType),
    /// The viewport size changed
    Viewport(Size),
}

type CameraListener = Box<dyn Fn(&CameraEvent)>;

/// Camera holding the view and projection matrices of a map viewport.
///
/// World coordinates are mapped to clip space by `projection * view`, then to
/// display pixels with the origin at the top-left corner of the viewport.
pub struct Camera {
    view: Matrix4<f64>,
    proj: Matrix4<f64>,
    transform: Matrix4<f64>,
    inverse: Matrix4<f64>,
    projection: ProjectionType,
    viewport: Size,
    rotation: f64,
    revision: u64,
    listeners: Vec<CameraListener>,
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("projection", &self.projection)
            .field("viewport", &self.viewport)
            .field("rotation", &self.rotation)
            .field("revision", &self.revision)
            .field("view", &self.view)
            .finish()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(ProjectionType::Parallel, Size::new(1.0, 1.0))
    }
}

/// glFrustum-style perspective matrix
fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Matrix4<f64> {
    let rl = 1.0 / (right - left);
    let tb = 1.0 / (top - bottom);
    let nf = 1.0 / (near - far);
    Matrix4::new(
        2.0 * near * rl, 0.0, (right + left) * rl, 0.0,
        0.0, 2.0 * near * tb, (top + bottom) * tb, 0.0,
        0.0, 0.0, (far + near) * nf, 2.0 * far * near * nf,
        0.0, 0.0, -1.0, 0.0,
    )
}

fn projection_matrix(projection: ProjectionType) -> Matrix4<f64> {
    match projection {
        ProjectionType::Perspective => {
            let s = CLIP_NEAR / CLIP_FAR;
            frustum(
                CLIP_LEFT * s,
                CLIP_RIGHT * s,
                CLIP_BOTTOM * s,
                CLIP_TOP * s,
                -CLIP_NEAR,
                -CLIP_FAR,
            )
        }
        ProjectionType::Parallel => Matrix4::new_orthographic(
            CLIP_LEFT, CLIP_RIGHT, CLIP_BOTTOM, CLIP_TOP, CLIP_NEAR, CLIP_FAR,
        ),
    }
}

impl Camera {
    /// Create a camera with an identity view
    pub fn new(projection: ProjectionType, viewport: Size) -> Self {
        let proj = projection_matrix(projection);
        let mut camera = Self {
            view: Matrix4::identity(),
            proj,
            transform: proj,
            inverse: Matrix4::identity(),
            projection,
            viewport,
            rotation: 0.0,
            revision: 0,
            listeners: Vec::new(),
        };
        camera.update();
        camera
    }

    /// Register a change listener
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: Fn(&CameraEvent) + 'static,
    {
        self.listeners.push(Box::new(callback));
    }

    /// Incremented on every change, for consumers that poll instead of listening
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn notify(&self, event: CameraEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    fn update(&mut self) {
        self.transform = self.proj * self.view;
        match self.transform.try_inverse() {
            Some(inverse) => self.inverse = inverse,
            None => log::warn!(target: "mapview", "camera transform is singular, keeping previous inverse"),
        }
        self.revision += 1;
        self.notify(CameraEvent::View);
    }

    pub fn view(&self) -> &Matrix4<f64> {
        &self.view
    }

    /// Replace the view matrix
    pub fn set_view(&mut self, view: Matrix4<f64>) {
        self.view = view;
        self.update();
    }

    pub fn projection_matrix(&self) -> &Matrix4<f64> {
        &self.proj
    }

    /// `projection * view`
    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    pub fn inverse(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    pub fn projection(&self) -> ProjectionType {
        self.projection
    }

    pub fn set_projection(&mut self, projection: ProjectionType) {
        if projection == self.projection {
            return;
        }
        self.projection = projection;
        self.proj = projection_matrix(projection);
        self.update();
        self.notify(CameraEvent::Projection(projection));
    }

    /// Set the projection by name; only `"parallel"` and `"perspective"` exist
    pub fn set_projection_name(&mut self, name: &str) -> Result<()> {
        let projection = name.parse::<ProjectionType>()?;
        self.set_projection(projection);
        Ok(())
    }

    /// Rotation the owner of the camera reports, in radians
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation;
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Resize the viewport, rescaling the view so world units per pixel and
    /// the visible center are unchanged.
    pub fn set_viewport(&mut self, viewport: Size) -> Result<()> {
        if !viewport.is_positive() {
            return Err(MapError::InvalidViewport(format!(
                "{}x{}",
                viewport.width, viewport.height
            )));
        }
        if viewport == self.viewport {
            return Ok(());
        }
        if self.viewport.is_positive() {
            let rescale = Matrix4::new_nonuniform_scaling(&Vector3::new(
                self.viewport.width / viewport.width,
                self.viewport.height / viewport.height,
                1.0,
            ));
            self.view = rescale * self.view;
        }
        self.viewport = viewport;
        self.update();
        self.notify(CameraEvent::Viewport(viewport));
        Ok(())
    }

    /// Point the camera from `eye` at `center`
    pub fn look_at(&mut self, eye: Point3<f64>, center: Point3<f64>, up: Vector3<f64>) {
        self.view = Matrix4::look_at_rh(&eye, &center, &up);
        self.update();
    }

    /// Move the camera content by `offset` world units
    pub fn pan(&mut self, offset: Point) {
        if offset.x == 0.0 && offset.y == 0.0 {
            return;
        }
        self.translate(Vector3::new(offset.x, offset.y, 0.0));
    }

    pub fn translate(&mut self, offset: Vector3<f64>) {
        self.view *= Matrix4::new_translation(&offset);
        self.update();
    }

    /// Uniformly scale the view
    pub fn scale(&mut self, factor: f64) {
        if factor == 1.0 {
            return;
        }
        self.view *= Matrix4::new_scaling(factor);
        self.update();
    }

    /// Rotate the view clockwise by `angle` radians about `center`
    pub fn rotate_z(&mut self, angle: f64, center: Point) {
        if angle == 0.0 {
            return;
        }
        self.view *= Self::rotation_about(angle, center);
        self.update();
    }

    fn rotation_about(angle: f64, center: Point) -> Matrix4<f64> {
        let to_center = Matrix4::new_translation(&Vector3::new(center.x, center.y, 0.0));
        let from_center = Matrix4::new_translation(&Vector3::new(-center.x, -center.y, 0.0));
        to_center * Matrix4::from_axis_angle(&Vector3::z_axis(), -angle) * from_center
    }

    /// Derive the view from the world rectangle to show.
    ///
    /// The rectangle is grown along its short axis to match the viewport
    /// aspect ratio, rotated clockwise by `rotation` and centred on `center`.
    pub fn view_from_center_size_rotation(&mut self, center: Point, size: Size, rotation: f64) {
        let mut width = size.width.abs();
        let mut height = size.height.abs();
        let content_aspect = width / height;
        let viewport_aspect = self.viewport.aspect();
        if content_aspect >= viewport_aspect {
            height = width / viewport_aspect;
        } else {
            width = height * viewport_aspect;
        }

        let mut view = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0 / width, 2.0 / height, 1.0));
        if rotation != 0.0 {
            view *= Self::rotation_about(rotation, Point::default());
        }
        view *= Matrix4::new_translation(&Vector3::new(-center.x, -center.y, 0.0));
        self.view = view;
        self.update();
    }

    /// World rectangle covering the four corners of the viewport
    pub fn bounds(&self) -> Bounds {
        let Size { width, height } = self.viewport;
        let corners = [
            self.display_to_world(Point::new(0.0, 0.0)),
            self.display_to_world(Point::new(width, 0.0)),
            self.display_to_world(Point::new(0.0, height)),
            self.display_to_world(Point::new(width, height)),
        ];
        Bounds::from_points(&corners)
    }

    /// Show `bounds` without rotation
    pub fn set_bounds(&mut self, bounds: &Bounds) {
        let size = Size::new(bounds.width(), bounds.height());
        self.view_from_center_size_rotation(bounds.center(), size, 0.0);
    }

    fn apply_projection(&self, point: &mut Vector4<f64>) {
        match self.projection {
            ProjectionType::Perspective => {
                let w = 1.0 / if point.w != 0.0 { point.w } else { 1.0 };
                point.x *= w;
                point.y *= w;
                point.z *= w;
                point.w = w;
            }
            ProjectionType::Parallel => point.w = 1.0,
        }
    }

    fn unapply_projection(&self, point: &mut Vector4<f64>) {
        match self.projection {
            ProjectionType::Perspective => {
                let w = if point.w != 0.0 { point.w } else { 1.0 };
                point.x *= w;
                point.y *= w;
                point.z *= w;
                point.w = w;
            }
            ProjectionType::Parallel => point.w = 1.0,
        }
    }

    /// Homogeneous world point to display `[x, y, z, 1/w]`
    pub fn world_to_display4(&self, point: [f64; 4]) -> [f64; 4] {
        let mut p = self.transform
            * Vector4::new(point[0], point[1], point[2] - SURFACE_DEPTH, point[3]);
        self.apply_projection(&mut p);
        [
            self.viewport.width * (1.0 + p.x) / 2.0,
            self.viewport.height * (1.0 - p.y) / 2.0,
            (1.0 + p.z) / 2.0,
            p.w,
        ]
    }

    /// Inverse of [`Camera::world_to_display4`]
    pub fn display_to_world4(&self, point: [f64; 4]) -> [f64; 4] {
        let mut p = Vector4::new(
            2.0 * point[0] / self.viewport.width - 1.0,
            -2.0 * point[1] / self.viewport.height + 1.0,
            2.0 * point[2] - 1.0,
            point[3],
        );
        self.unapply_projection(&mut p);
        let world = self.inverse * p;
        [world.x, world.y, world.z + SURFACE_DEPTH, world.w]
    }

    /// World point on the map surface to display pixels
    pub fn world_to_display(&self, point: Point) -> Point {
        let p = self.world_to_display4([point.x, point.y, 0.0, 1.0]);
        Point::new(p[0], p[1])
    }

    /// Display pixels to the world point on the map surface
    pub fn display_to_world(&self, point: Point) -> Point {
        let p = self.display_to_world4([point.x, point.y, 1.0, 2.0]);
        Point::new(p[0], p[1])
    }

    /// World to display matrix, suitable for DOM transforms
    pub fn display_matrix(&self) -> Matrix4<f64> {
        let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(
            self.viewport.width / 2.0,
            -self.viewport.height / 2.0,
            1.0,
        ));
        scale * Matrix4::new_translation(&Vector3::new(1.0, 1.0, 0.0)) * self.transform
    }

    /// Display to world matrix; identity if the display matrix is singular
    pub fn world_matrix(&self) -> Matrix4<f64> {
        self.display_matrix().try_inverse().unwrap_or_else(|| {
            log::warn!(target: "mapview", "display matrix is singular, using identity");
            Matrix4::identity()
        })
    }

    /// `matrix3d(...)` string of the display or world matrix
    pub fn css(&self, kind: CssTransform) -> String {
        let matrix = match kind {
            CssTransform::Display => self.display_matrix(),
            CssTransform::World => self.world_matrix(),
        };
        // column-major, like the CSS matrix3d argument order
        let values: Vec<String> = matrix.iter().map(|v| format!("{:.20}", v)).collect();
        format!("matrix3d({})", values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::f64::consts::PI;
    use std::rc::Rc;

    fn camera(projection: ProjectionType) -> Camera {
        let mut camera = Camera::new(projection, Size::new(400.0, 300.0));
        camera.view_from_center_size_rotation(Point::new(10.0, 20.0), Size::new(400.0, 300.0), 0.3);
        camera
    }

    #[test]
    fn test_round_trip_both_projections() {
        for projection in [ProjectionType::Parallel, ProjectionType::Perspective] {
            let camera = camera(projection);
            for pixel in [Point::new(0.0, 0.0), Point::new(123.0, 45.5), Point::new(400.0, 300.0)] {
                let back = camera.world_to_display(camera.display_to_world(pixel));
                assert!(back.approx_eq(&pixel, 1e-6), "{projection}: {back:?} != {pixel:?}");
            }
        }
    }

    #[test]
    fn test_projections_agree_on_surface() {
        let parallel = camera(ProjectionType::Parallel);
        let perspective = camera(ProjectionType::Perspective);
        let world = Point::new(37.0, -12.0);
        let a = parallel.world_to_display(world);
        let b = perspective.world_to_display(world);
        assert!(a.approx_eq(&b, 1e-9));
    }

    #[test]
    fn test_display_orientation() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(200.0, 100.0));
        camera.set_bounds(&Bounds::new(0.0, 0.0, 200.0, 100.0));
        let top_left = camera.world_to_display(Point::new(0.0, 100.0));
        assert!(top_left.approx_eq(&Point::new(0.0, 0.0), 1e-9));
        let center = camera.display_to_world(Point::new(100.0, 50.0));
        assert!(center.approx_eq(&Point::new(100.0, 50.0), 1e-9));
    }

    #[test]
    fn test_aspect_fit_grows_short_axis() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(200.0, 100.0));
        camera.set_bounds(&Bounds::new(-10.0, -10.0, 10.0, 10.0));
        let bounds = camera.bounds();
        assert!(bounds.approx_eq(&Bounds::new(-20.0, -10.0, 20.0, 10.0), 1e-9));
    }

    #[test]
    fn test_rotation_is_clockwise() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(100.0, 100.0));
        camera.view_from_center_size_rotation(Point::default(), Size::new(100.0, 100.0), PI / 2.0);
        // a point to the east of the center appears below it on screen
        let east = camera.world_to_display(Point::new(10.0, 0.0));
        assert!(east.approx_eq(&Point::new(50.0, 60.0), 1e-9));
    }

    #[test]
    fn test_pan_moves_content() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(100.0, 100.0));
        camera.set_bounds(&Bounds::new(-50.0, -50.0, 50.0, 50.0));
        camera.pan(Point::new(10.0, 0.0));
        let center = camera.display_to_world(Point::new(50.0, 50.0));
        assert!(center.approx_eq(&Point::new(-10.0, 0.0), 1e-9));
    }

    #[test]
    fn test_unsupported_projection_name() {
        let mut camera = Camera::default();
        assert!(matches!(
            camera.set_projection_name("fisheye"),
            Err(MapError::UnsupportedProjection(_))
        ));
        camera.set_projection_name("perspective").unwrap();
        assert_eq!(camera.projection(), ProjectionType::Perspective);
    }

    #[test]
    fn test_viewport_resize_keeps_scale_and_center() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(100.0, 100.0));
        camera.set_bounds(&Bounds::new(0.0, 0.0, 100.0, 100.0));
        camera.set_viewport(Size::new(200.0, 100.0)).unwrap();
        let bounds = camera.bounds();
        assert!(bounds.approx_eq(&Bounds::new(-50.0, 0.0, 150.0, 100.0), 1e-9));
        assert!(camera.set_viewport(Size::new(0.0, 10.0)).is_err());
    }

    #[test]
    fn test_change_notifications() {
        let mut camera = Camera::default();
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        camera.on_change(move |event| {
            if *event == CameraEvent::View {
                seen.set(seen.get() + 1);
            }
        });
        let revision = camera.revision();
        camera.translate(Vector3::new(1.0, 0.0, 0.0));
        camera.rotate_z(0.5, Point::default());
        assert_eq!(count.get(), 2);
        assert_eq!(camera.revision(), revision + 2);
    }

    #[test]
    fn test_world_matrix_inverts_display_matrix() {
        let camera = camera(ProjectionType::Parallel);
        let product = camera.world_matrix() * camera.display_matrix();
        assert!((product - Matrix4::identity()).abs().max() < 1e-9);

        let mut flat = camera;
        flat.set_view(Matrix4::zeros());
        assert_eq!(flat.world_matrix(), Matrix4::identity());
    }

    #[test]
    fn test_css_matrix() {
        let mut camera = Camera::new(ProjectionType::Parallel, Size::new(100.0, 100.0));
        camera.set_bounds(&Bounds::new(0.0, 0.0, 100.0, 100.0));
        let css = camera.css(CssTransform::Display);
        assert!(css.starts_with("matrix3d("));
        assert_eq!(css.matches(',').count(), 15);
    }
}
