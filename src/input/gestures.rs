//! Touch gestures.
//!
//! [`TouchTracker`] turns raw touch points into gesture samples (center,
//! scale and rotation relative to the start of the gesture).
//! [`ZoomRotateGesture`] applies the per-axis dead zones of the combined
//! pinch, twist and drag gesture.

use crate::core::config::ZoomRotateOptions;
use crate::core::geo::Point;
use crate::core::viewport::{Anchor, Viewport};
use crate::input::events::{TouchEventType, TouchPoint};
use fxhash::FxHashMap;

/// A touch gesture reduced to its center, scale and rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub phase: TouchEventType,
    /// Centroid of the touch points in display pixels
    pub center: Point,
    /// Spread relative to the start of the gesture
    pub scale: f64,
    /// Twist relative to the start of the gesture, radians clockwise
    pub rotation: f64,
    pub pointers: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    pointers: usize,
    spread: f64,
    angle: f64,
}

/// Tracks active touch points across touch events
#[derive(Debug, Default)]
pub struct TouchTracker {
    touches: FxHashMap<u64, Point>,
    baseline: Option<Baseline>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointers(&self) -> usize {
        self.touches.len()
    }

    pub fn is_active(&self) -> bool {
        self.baseline.is_some()
    }

    fn ordered(&self) -> Vec<Point> {
        let mut ids: Vec<&u64> = self.touches.keys().collect();
        ids.sort();
        ids.iter().filter_map(|id| self.touches.get(id).copied()).collect()
    }

    fn centroid(points: &[Point]) -> Point {
        if points.is_empty() {
            return Point::default();
        }
        let sum = points.iter().fold(Point::default(), |acc, p| acc.add(p));
        sum.multiply(1.0 / points.len() as f64)
    }

    fn spread_and_angle(points: &[Point]) -> (f64, f64) {
        match points {
            [a, b, ..] => {
                let d = b.subtract(a);
                (d.length(), d.y.atan2(d.x))
            }
            _ => (0.0, 0.0),
        }
    }

    fn sample(&self, phase: TouchEventType, time: f64) -> GestureSample {
        let points = self.ordered();
        let (spread, angle) = Self::spread_and_angle(&points);
        let (scale, rotation) = match self.baseline {
            Some(base) if base.spread > 0.0 && spread > 0.0 => {
                (spread / base.spread, angle - base.angle)
            }
            _ => (1.0, 0.0),
        };
        GestureSample {
            phase,
            center: Self::centroid(&points),
            scale,
            rotation,
            pointers: points.len(),
            time,
        }
    }

    fn rebase(&mut self) {
        let points = self.ordered();
        let (spread, angle) = Self::spread_and_angle(&points);
        self.baseline = Some(Baseline {
            pointers: points.len(),
            spread,
            angle,
        });
    }

    /// Feed one touch event.
    ///
    /// When the number of pointers changes mid-gesture the current gesture
    /// ends and a new one starts with the new pointer set.
    pub fn update(
        &mut self,
        event_type: TouchEventType,
        touches: &[TouchPoint],
        time: f64,
    ) -> Vec<GestureSample> {
        let mut samples = Vec::new();
        match event_type {
            TouchEventType::Start | TouchEventType::Move => {
                let previous = self.baseline.map(|b| b.pointers);
                if event_type == TouchEventType::Move {
                    for touch in touches {
                        self.touches.insert(touch.id, touch.position);
                    }
                } else {
                    if previous.is_some() {
                        samples.push(self.sample(TouchEventType::End, time));
                    }
                    for touch in touches {
                        self.touches.insert(touch.id, touch.position);
                    }
                }
                if self.touches.is_empty() {
                    return samples;
                }
                if previous != Some(self.touches.len()) {
                    if previous.is_some() && event_type == TouchEventType::Move {
                        samples.push(self.sample(TouchEventType::End, time));
                    }
                    self.rebase();
                    samples.push(self.sample(TouchEventType::Start, time));
                } else {
                    samples.push(self.sample(event_type, time));
                }
            }
            TouchEventType::End | TouchEventType::Cancel => {
                if self.baseline.is_some() {
                    samples.push(self.sample(event_type, time));
                }
                for touch in touches {
                    self.touches.remove(&touch.id);
                }
                if event_type == TouchEventType::Cancel {
                    self.touches.clear();
                }
                if self.touches.is_empty() {
                    self.baseline = None;
                } else {
                    self.rebase();
                    samples.push(self.sample(TouchEventType::Start, time));
                }
            }
        }
        samples
    }

    pub fn reset(&mut self) {
        self.touches.clear();
        self.baseline = None;
    }
}

/// Changes a zoom-rotate sample asks for
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoomRotateUpdate {
    pub zoom: Option<f64>,
    pub rotation: Option<f64>,
    /// Keep `geo` under `display` by panning
    pub pan: Option<Anchor>,
}

/// State of a combined pinch, twist and drag gesture.
///
/// Each component is ignored until it passes its threshold. At that moment
/// its baseline is moved so the component starts from the current value
/// instead of jumping by the threshold amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomRotateGesture {
    pub initial_zoom: f64,
    pub initial_rotation: f64,
    pub start_center: Point,
    pub allow_zoom: bool,
    pub allow_rotation: bool,
    pub allow_pan: bool,
    /// Rotation delta last applied
    last_rotation: Option<f64>,
    /// Sign of the last applied rotation change
    last_direction: f64,
    /// Map GCS location held under the gesture center once panning starts
    anchor_geo: Option<Point>,
}

impl ZoomRotateGesture {
    pub fn new(viewport: &Viewport, center: Point) -> Self {
        Self {
            initial_zoom: viewport.zoom(),
            initial_rotation: viewport.rotation(),
            start_center: center,
            allow_zoom: false,
            allow_rotation: false,
            allow_pan: false,
            last_rotation: None,
            last_direction: 0.0,
            anchor_geo: None,
        }
    }

    pub fn update(
        &mut self,
        viewport: &Viewport,
        sample: &GestureSample,
        thresholds: &ZoomRotateOptions,
    ) -> ZoomRotateUpdate {
        let mut update = ZoomRotateUpdate::default();

        if self.allow_rotation {
            let delta = sample.rotation;
            let change = delta - self.last_rotation.unwrap_or(delta);
            let direction = change.signum();
            let reversing = change != 0.0
                && self.last_direction != 0.0
                && direction != self.last_direction
                && change.abs() < thresholds.reverse_rotation;
            if !reversing {
                if change != 0.0 {
                    self.last_direction = direction;
                }
                self.last_rotation = Some(delta);
                update.rotation = Some(self.initial_rotation + delta);
            }
        } else if sample.rotation.abs() >= thresholds.min_rotation {
            self.allow_rotation = true;
            self.initial_rotation -= sample.rotation;
            self.last_rotation = Some(sample.rotation);
            log::trace!(target: "mapview", "zoomrotate: rotation enabled");
        }

        let zoom_delta = if sample.scale > 0.0 {
            sample.scale.log2()
        } else {
            0.0
        };
        if self.allow_zoom {
            update.zoom = Some(self.initial_zoom + zoom_delta);
        } else if zoom_delta.abs() >= thresholds.min_zoom {
            self.allow_zoom = true;
            self.initial_zoom -= zoom_delta;
            log::trace!(target: "mapview", "zoomrotate: zoom enabled");
        }

        if self.allow_pan {
            if let Some(geo) = self.anchor_geo {
                update.pan = Some(Anchor {
                    display: sample.center,
                    geo,
                });
            }
        } else if sample.center.distance_to(&self.start_center) >= thresholds.min_pan {
            self.allow_pan = true;
            self.anchor_geo = Some(viewport.display_to_gcs(sample.center, Some(viewport.gcs())));
            log::trace!(target: "mapview", "zoomrotate: pan enabled");
        }

        update
    }
}
