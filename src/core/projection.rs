//! Coordinate reference systems and the conversions between them.
//!
//! Conversions go through geographic longitude/latitude as a hub, so adding
//! a reference system only needs its forward and inverse mapping to degrees.
//! Converting between identical systems never touches the coordinates.

use crate::core::constants::{EARTH_RADIUS, MAX_MERCATOR_LATITUDE};
use crate::core::geo::Point;
use crate::{MapError, Result};
use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// A supported coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// Longitude/latitude in degrees (EPSG:4326)
    Geographic,
    /// Longitude/latitude with y pointing down, used for pixel-space images
    GeographicFlipped,
    /// Spherical Web Mercator in meters (EPSG:3857)
    WebMercator,
}

/// Names registered at runtime with [`define_alias`]
static ALIASES: Lazy<RwLock<FxHashMap<String, Crs>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

impl Crs {
    /// Parses a CRS identifier such as `"EPSG:3857"` or a proj4 string
    pub fn parse(name: &str) -> Result<Crs> {
        let key = normalize_name(name);
        let known = match key.as_str() {
            "epsg:4326" | "wgs84" | "+proj=longlat +datum=wgs84 +no_defs"
            | "+proj=longlat +datum=wgs84" | "+proj=longlat +axis=enu"
            | "+proj=longlat" => Some(Crs::Geographic),
            "+proj=longlat +axis=esu" => Some(Crs::GeographicFlipped),
            "epsg:3857" | "epsg:900913" | "epsg:102100" | "epsg:102113"
            | "google" => Some(Crs::WebMercator),
            other if other.starts_with("+proj=merc") && other.contains("+a=6378137") => {
                Some(Crs::WebMercator)
            }
            _ => None,
        };
        if let Some(crs) = known {
            return Ok(crs);
        }
        let aliases = match ALIASES.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        aliases
            .get(&key)
            .copied()
            .ok_or_else(|| MapError::UnsupportedProjection(name.to_string()))
    }

    /// Canonical identifier
    pub fn name(&self) -> &'static str {
        match self {
            Crs::Geographic => "EPSG:4326",
            Crs::GeographicFlipped => "+proj=longlat +axis=esu",
            Crs::WebMercator => "EPSG:3857",
        }
    }

    fn to_geographic(self, point: Point) -> Point {
        match self {
            Crs::Geographic => point,
            Crs::GeographicFlipped => Point::new(point.x, -point.y),
            Crs::WebMercator => Point::new(
                (point.x / EARTH_RADIUS).to_degrees(),
                (2.0 * (point.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
            ),
        }
    }

    fn from_geographic(self, point: Point) -> Point {
        match self {
            Crs::Geographic => point,
            Crs::GeographicFlipped => Point::new(point.x, -point.y),
            Crs::WebMercator => {
                let lat = point.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
                Point::new(
                    point.x.to_radians() * EARTH_RADIUS,
                    (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS,
                )
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Crs {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        Crs::parse(s)
    }
}

impl TryFrom<String> for Crs {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self> {
        Crs::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.name().to_string()
    }
}

/// Registers an additional name for a supported reference system.
pub fn define_alias(name: &str, crs: Crs) {
    let mut aliases = match ALIASES.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(previous) = aliases.insert(normalize_name(name), crs) {
        if previous != crs {
            log::warn!(target: "mapview", "CRS alias {name} redefined from {previous} to {crs}");
        }
    }
}

/// Converts a single point from `source` to `target`.
pub fn transform_point(source: Crs, target: Crs, point: Point) -> Point {
    if source == target {
        return point;
    }
    target.from_geographic(source.to_geographic(point))
}

/// Converts a list of points, preserving order.
pub fn transform_points(source: Crs, target: Crs, points: &[Point]) -> Vec<Point> {
    if source == target {
        return points.to_vec();
    }
    points
        .iter()
        .map(|point| transform_point(source, target, *point))
        .collect()
}

/// A directed conversion between two reference systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub source: Crs,
    pub target: Crs,
}

impl Projection {
    pub fn new(source: Crs, target: Crs) -> Self {
        Self { source, target }
    }

    /// Builds a projection from two CRS identifiers
    pub fn from_names(source: &str, target: &str) -> Result<Self> {
        Ok(Self::new(Crs::parse(source)?, Crs::parse(target)?))
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Source to target
    pub fn forward(&self, point: Point) -> Point {
        transform_point(self.source, self.target, point)
    }

    /// Target to source
    pub fn inverse(&self, point: Point) -> Point {
        transform_point(self.target, self.source, point)
    }

    pub fn forward_all(&self, points: &[Point]) -> Vec<Point> {
        transform_points(self.source, self.target, points)
    }

    pub fn inverse_all(&self, points: &[Point]) -> Vec<Point> {
        transform_points(self.target, self.source, points)
    }
}

/// Subtracts `origin` and then divides by `scale`.
pub fn affine_forward(origin: Point, scale: Point, points: &[Point]) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point::new((p.x - origin.x) / scale.x, (p.y - origin.y) / scale.y))
        .collect()
}

/// Inverse of [`affine_forward`].
pub fn affine_inverse(origin: Point, scale: Point, points: &[Point]) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point::new(p.x * scale.x + origin.x, p.y * scale.y + origin.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Geographic);
        assert_eq!(Crs::parse("epsg:900913").unwrap(), Crs::WebMercator);
        assert_eq!(
            Crs::parse("+proj=longlat  +axis=esu").unwrap(),
            Crs::GeographicFlipped
        );
        assert_eq!("EPSG:3857".parse::<Crs>().unwrap(), Crs::WebMercator);
    }

    #[test]
    fn test_unsupported_projection() {
        let err = Crs::parse("EPSG:27700").unwrap_err();
        assert!(matches!(err, MapError::UnsupportedProjection(name) if name == "EPSG:27700"));
    }

    #[test]
    fn test_define_alias() {
        assert!(Crs::parse("urn:test:mercator").is_err());
        define_alias("urn:test:mercator", Crs::WebMercator);
        assert_eq!(Crs::parse("URN:TEST:MERCATOR").unwrap(), Crs::WebMercator);
    }

    #[test]
    fn test_identity_is_pass_through() {
        let p = Point::new(12.5, -300.0);
        assert_eq!(transform_point(Crs::WebMercator, Crs::WebMercator, p), p);
    }

    #[test]
    fn test_mercator_round_trip() {
        let projection = Projection::new(Crs::Geographic, Crs::WebMercator);
        let p = Point::new(-122.4194, 37.7749);
        let projected = projection.forward(p);
        assert!((projected.x - -13627665.27).abs() < 0.01);
        assert!(projection.inverse(projected).approx_eq(&p, 1e-9));
    }

    #[test]
    fn test_world_edge_is_square() {
        let edge = transform_point(
            Crs::Geographic,
            Crs::WebMercator,
            Point::new(180.0, MAX_MERCATOR_LATITUDE),
        );
        assert!((edge.x - edge.y).abs() < 0.01);
    }

    #[test]
    fn test_array_matches_scalar() {
        let projection = Projection::new(Crs::Geographic, Crs::WebMercator);
        let points = vec![Point::new(0.0, 0.0), Point::new(10.0, 20.0), Point::new(-45.0, -60.0)];
        let all = projection.forward_all(&points);
        for (p, q) in points.iter().zip(all.iter()) {
            assert_eq!(projection.forward(*p), *q);
        }
    }

    #[test]
    fn test_affine_round_trip() {
        let origin = Point::new(100.0, 200.0);
        let scale = Point::new(2.0, 4.0);
        let points = vec![Point::new(110.0, 220.0)];
        let forward = affine_forward(origin, scale, &points);
        assert_eq!(forward[0], Point::new(5.0, 5.0));
        assert_eq!(affine_inverse(origin, scale, &forward), points);
    }

    #[test]
    fn test_crs_serde_uses_names() {
        let json = serde_json::to_string(&Crs::WebMercator).unwrap();
        assert_eq!(json, "\"EPSG:3857\"");
        let crs: Crs = serde_json::from_str("\"EPSG:4326\"").unwrap();
        assert_eq!(crs, Crs::Geographic);
        assert!(serde_json::from_str::<Crs>("\"EPSG:0\"").is_err());
    }
}
