use crate::core::geo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in a projected or geographic coordinate system.
///
/// `top` is the larger y value: map coordinates grow upwards, unlike
/// display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Creates bounds from a center point and size
    pub fn from_center_and_size(center: Point, size: Size) -> Self {
        let half_width = size.width / 2.0;
        let half_height = size.height / 2.0;
        Self::new(
            center.x - half_width,
            center.y - half_height,
            center.x + half_width,
            center.y + half_height,
        )
    }

    /// Smallest bounds containing all the points
    pub fn from_points(points: &[Point]) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.extend(point);
        }
        bounds
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn size(&self) -> Size {
        Size::new(self.width().abs(), self.height().abs())
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.bottom + self.top) / 2.0,
        )
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.bottom && point.y <= self.top
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &Point) {
        self.left = self.left.min(point.x);
        self.bottom = self.bottom.min(point.y);
        self.right = self.right.max(point.x);
        self.top = self.top.max(point.y);
    }

    /// Returns the bounds moved by `dx`, `dy`
    pub fn translated(&self, dx: f64, dy: f64) -> Bounds {
        Bounds::new(
            self.left + dx,
            self.bottom + dy,
            self.right + dx,
            self.top + dy,
        )
    }

    /// Checks that left < right and bottom < top
    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.bottom < self.top
    }

    /// Upper-left, upper-right, lower-left and lower-right corners
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.left, self.bottom),
            Point::new(self.right, self.bottom),
        ]
    }

    /// Creates empty bounds (invalid bounds that can be extended)
    pub fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Axis-aligned bounding box of a `size` rectangle centred on `center`
    /// and rotated by `rotation` radians.
    pub fn rotated_around(center: Point, size: Size, rotation: f64) -> Bounds {
        let half_width = size.width / 2.0;
        let half_height = size.height / 2.0;
        let corners = [
            Point::new(-half_width, -half_height),
            Point::new(half_width, -half_height),
            Point::new(-half_width, half_height),
            Point::new(half_width, half_height),
        ];
        let rotated: Vec<Point> = corners
            .iter()
            .map(|corner| corner.rotate(rotation).add(&center))
            .collect();
        Bounds::from_points(&rotated)
    }

    /// Bounding box of these bounds rotated about their own center.
    /// A zero rotation returns the bounds unchanged.
    pub fn rotate(&self, rotation: f64) -> Bounds {
        if rotation == 0.0 {
            return *self;
        }
        Bounds::rotated_around(self.center(), self.size(), rotation)
    }

    pub fn approx_eq(&self, other: &Bounds, epsilon: f64) -> bool {
        (self.left - other.left).abs() <= epsilon
            && (self.right - other.right).abs() <= epsilon
            && (self.bottom - other.bottom).abs() <= epsilon
            && (self.top - other.top).abs() <= epsilon
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Partial bounds used when only some edges are updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundsUpdate {
    pub left: Option<f64>,
    pub bottom: Option<f64>,
    pub right: Option<f64>,
    pub top: Option<f64>,
}

impl From<Bounds> for BoundsUpdate {
    fn from(bounds: Bounds) -> Self {
        Self {
            left: Some(bounds.left),
            bottom: Some(bounds.bottom),
            right: Some(bounds.right),
            top: Some(bounds.top),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_bounds_creation() {
        let bounds = Bounds::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(bounds.width(), 20.0);
        assert_eq!(bounds.height(), 20.0);
        assert_eq!(bounds.center(), Point::new(20.0, 30.0));
        assert!(bounds.is_valid());
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::new(10.0, 20.0, 30.0, 40.0);
        assert!(bounds.contains(&Point::new(15.0, 25.0)));
        assert!(!bounds.contains(&Point::new(5.0, 25.0)));
    }

    #[test]
    fn test_degenerate_bounds_are_invalid() {
        assert!(!Bounds::new(10.0, 0.0, 10.0, 5.0).is_valid());
        assert!(!Bounds::new(0.0, 5.0, 10.0, 1.0).is_valid());
    }

    #[test]
    fn test_rotated_bounds_grow() {
        let bounds = Bounds::new(-2.0, -1.0, 2.0, 1.0);
        let rotated = bounds.rotate(PI / 2.0);
        assert!(rotated.approx_eq(&Bounds::new(-1.0, -2.0, 1.0, 2.0), 1e-12));

        let diagonal = bounds.rotate(PI / 4.0);
        let expected = 3.0 / 2f64.sqrt();
        assert!((diagonal.right - expected).abs() < 1e-12);
        assert!((diagonal.top - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let bounds = Bounds::new(1.0, 2.0, 3.0, 5.0);
        assert_eq!(bounds.rotate(0.0), bounds);
    }
}
