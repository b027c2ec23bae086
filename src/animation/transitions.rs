//! Time-based transitions of the map center, zoom and rotation.
//!
//! A transition interpolates the vector `[x, y, zoom, rotation]` between its
//! start and end values on every animation frame. Zoom is optionally
//! interpolated as a camera height so the motion feels linear in altitude.
//! Requesting a transition while another is running queues it; the queued
//! request is merged over the running transition's end state and takes over
//! on the next frame.

use crate::animation::interpolation::{height_to_zoom, zoom_to_height, EasingFunction, Interpolation};
use crate::core::constants::DEFAULT_TRANSITION_DURATION;
use crate::core::geo::{Point, Size};
use crate::core::projection::{transform_point, Crs};
use crate::core::viewport::{Anchor, ClampMode, Viewport};
use crate::input::events::{TransitionInfo, ViewState};
use std::fmt;

/// Interpolates between two transition vectors for an eased fraction `t`
pub type Interpolator = fn(&[f64; 4], &[f64; 4], f64) -> [f64; 4];

/// Callback invoked once when a transition ends or is cancelled
pub type DoneCallback = Box<dyn FnOnce(&TransitionOutcome)>;

/// Who requested a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionTag {
    #[default]
    User,
    /// Animated wheel or gesture zoom owned by the interactor
    ZoomAnimation,
}

/// How a transition finished
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub cancelled: bool,
    /// Cancel source such as `"wheel.zoom"`; empty when not cancelled
    pub source: String,
    /// A queued transition takes over
    pub next: bool,
    /// Requested end zoom
    pub end_zoom: f64,
    pub tag: TransitionTag,
}

/// A navigation request for [`TransitionAnimator::begin`].
///
/// Unset fields keep the current value of the viewport.
#[derive(Default)]
pub struct TransitionRequest {
    pub center: Option<Point>,
    /// CRS of `center`; the interface GCS when `None`
    pub gcs: Option<Crs>,
    pub zoom: Option<f64>,
    pub rotation: Option<f64>,
    /// Milliseconds
    pub duration: Option<f64>,
    pub ease: Option<EasingFunction>,
    pub interp: Option<Interpolator>,
    /// Interpolate zoom as camera height
    pub z_coord: Option<bool>,
    pub zoom_origin: Option<Anchor>,
    pub tag: TransitionTag,
    pub done: Option<DoneCallback>,
}

impl fmt::Debug for TransitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRequest")
            .field("center", &self.center)
            .field("gcs", &self.gcs)
            .field("zoom", &self.zoom)
            .field("rotation", &self.rotation)
            .field("duration", &self.duration)
            .field("ease", &self.ease)
            .field("z_coord", &self.z_coord)
            .field("zoom_origin", &self.zoom_origin)
            .field("tag", &self.tag)
            .field("done", &self.done.is_some())
            .finish()
    }
}

impl TransitionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn center(mut self, center: Point) -> Self {
        self.center = Some(center);
        self
    }

    /// Center given in an explicit CRS
    pub fn center_in(mut self, center: Point, gcs: Crs) -> Self {
        self.center = Some(center);
        self.gcs = Some(gcs);
        self
    }

    pub fn zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn rotation(mut self, rotation: f64) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn ease(mut self, ease: EasingFunction) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn interp(mut self, interp: Interpolator) -> Self {
        self.interp = Some(interp);
        self
    }

    pub fn z_coord(mut self, z_coord: bool) -> Self {
        self.z_coord = Some(z_coord);
        self
    }

    pub fn zoom_origin(mut self, origin: Anchor) -> Self {
        self.zoom_origin = Some(origin);
        self
    }

    pub fn tag(mut self, tag: TransitionTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn on_done<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&TransitionOutcome) + 'static,
    {
        self.done = Some(Box::new(callback));
        self
    }

    /// Fields set in `later` win over the ones set here
    pub fn merge(self, later: TransitionRequest) -> Self {
        let (center, gcs) = match later.center {
            Some(center) => (Some(center), later.gcs),
            None => (self.center, self.gcs),
        };
        Self {
            center,
            gcs,
            zoom: later.zoom.or(self.zoom),
            rotation: later.rotation.or(self.rotation),
            duration: later.duration.or(self.duration),
            ease: later.ease.or(self.ease),
            interp: later.interp.or(self.interp),
            z_coord: later.z_coord.or(self.z_coord),
            zoom_origin: later.zoom_origin.or(self.zoom_origin),
            tag: later.tag,
            done: later.done.or(self.done),
        }
    }
}

/// Center, zoom and rotation at one end of a transition.
///
/// Centers are in the map GCS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub center: Option<Point>,
    pub zoom: f64,
    pub rotation: f64,
}

/// The running transition
pub struct Transition {
    pub start: Keyframe,
    pub end: Keyframe,
    /// Frame time of the first tick
    pub start_time: Option<f64>,
    pub duration: f64,
    pub ease: EasingFunction,
    pub z_coord: bool,
    pub zoom_origin: Option<Anchor>,
    pub tag: TransitionTag,
    pub cancelled: bool,
    pub cancel_source: String,
    gcs: Crs,
    size: Size,
    /// Map units per pixel at zoom 0
    units: f64,
    from: [f64; 4],
    to: [f64; 4],
    interp: Interpolator,
    done: Option<DoneCallback>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .field("ease", &self.ease)
            .field("z_coord", &self.z_coord)
            .field("tag", &self.tag)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

impl Transition {
    fn zoom_to_z(&self, zoom: f64) -> f64 {
        zoom_to_height(zoom + 1.0, self.size.width, self.size.height) * self.units
    }

    fn z_to_zoom(&self, z: f64) -> f64 {
        height_to_zoom(z / self.units, self.size.width, self.size.height) - 1.0
    }

    /// Start and end state for transition events, centers in `viewport`'s
    /// interface GCS
    pub fn info(&self, viewport: &Viewport) -> TransitionInfo {
        let to_ingcs = |center: Point| transform_point(self.gcs, viewport.ingcs(), center);
        let start_center = self.start.center.map(to_ingcs).unwrap_or_default();
        TransitionInfo {
            start: ViewState {
                center: start_center,
                zoom: self.start.zoom,
                rotation: self.start.rotation,
            },
            end: ViewState {
                center: self.end.center.map(to_ingcs).unwrap_or(start_center),
                zoom: self.end.zoom,
                rotation: self.end.rotation,
            },
            duration: self.duration,
        }
    }

    /// Outcome reported to the done callback
    pub fn outcome(&self, next: bool) -> TransitionOutcome {
        TransitionOutcome {
            cancelled: self.cancelled,
            source: if self.cancelled {
                self.cancel_source.clone()
            } else {
                String::new()
            },
            next,
            end_zoom: self.end.zoom,
            tag: self.tag,
        }
    }

    /// Invokes the done callback, if any
    pub fn finish(&mut self, next: bool) -> TransitionOutcome {
        let outcome = self.outcome(next);
        if let Some(done) = self.done.take() {
            done(&outcome);
        }
        outcome
    }

    /// Snap the viewport to the end state
    fn apply_end(&self, viewport: &mut Viewport) {
        if let Some(center) = self.end.center {
            let need_zoom = viewport.zoom() != viewport.fix_zoom(self.end.zoom, false);
            let mode = if need_zoom {
                ClampMode::Relaxed
            } else {
                ClampMode::Full
            };
            viewport.center_with(center, Some(self.gcs), need_zoom, mode);
        }
        viewport.zoom_to(self.end.zoom, self.zoom_origin, false);
        let rotation = viewport.fix_rotation(self.end.rotation, false, false);
        viewport.rotate_to(rotation, None, false);
    }

    /// Write the interpolated state at `time` into the viewport
    fn apply_frame(&self, viewport: &mut Viewport, time: f64, start: f64) {
        let fraction = self.ease.apply((time - start) / self.duration);
        let mut p = (self.interp)(&self.from, &self.to, fraction);
        if self.z_coord {
            p[2] = self.z_to_zoom(p[2]);
        }
        let center = Point::new(p[0], p[1]);
        if viewport.fix_zoom(p[2], true) == viewport.zoom() {
            viewport.center_with(center, Some(self.gcs), true, ClampMode::Relaxed);
        } else {
            let world = viewport.gcs_to_world(center, Some(self.gcs));
            viewport.set_world_center(world);
            viewport.zoom_to(p[2], self.zoom_origin, true);
        }
        viewport.rotate_to(p[3], None, true);
    }
}

/// Result of advancing the animator by one frame
#[derive(Debug)]
pub enum TransitionStep {
    /// Nothing is running
    Idle,
    /// Still animating; schedule another frame
    Running,
    /// The transition was cancelled
    Cancelled {
        transition: Transition,
        next: Option<TransitionRequest>,
    },
    /// The transition reached its end or was superseded by `next`
    Finished {
        transition: Transition,
        next: Option<TransitionRequest>,
    },
}

/// Runs at most one transition plus one queued request
#[derive(Debug, Default)]
pub struct TransitionAnimator {
    active: Option<Transition>,
    queued: Option<TransitionRequest>,
}

impl TransitionAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The running transition
    pub fn transition(&self) -> Option<&Transition> {
        self.active.as_ref()
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    /// Start a transition from the current viewport state.
    ///
    /// Returns `None` when another transition is running; the request is then
    /// merged into the queued transition instead.
    pub fn begin(&mut self, viewport: &Viewport, request: TransitionRequest) -> Option<&Transition> {
        if let Some(active) = &self.active {
            let pending = TransitionRequest {
                center: active.end.center,
                gcs: Some(active.gcs),
                zoom: Some(active.end.zoom),
                rotation: Some(active.end.rotation),
                ..TransitionRequest::default()
            };
            let pending = match self.queued.take() {
                Some(queued) => pending.merge(queued),
                None => pending,
            };
            log::trace!(target: "mapview", "transition queued behind running transition");
            self.queued = Some(pending.merge(request));
            return None;
        }

        let gcs = viewport.gcs();
        let start_center = viewport.center(Some(gcs));
        let end_center = request
            .center
            .map(|center| transform_point(request.gcs.unwrap_or(viewport.ingcs()), gcs, center));
        let start = Keyframe {
            center: Some(start_center),
            zoom: viewport.zoom(),
            rotation: viewport.rotation(),
        };
        let end = Keyframe {
            center: end_center,
            zoom: viewport.fix_zoom(request.zoom.unwrap_or(viewport.zoom()), false),
            rotation: viewport.fix_rotation(
                request.rotation.unwrap_or(viewport.rotation()),
                false,
                true,
            ),
        };

        let mut transition = Transition {
            start,
            end,
            start_time: None,
            duration: request.duration.unwrap_or(DEFAULT_TRANSITION_DURATION),
            ease: request.ease.unwrap_or_default(),
            z_coord: request.z_coord.unwrap_or(true),
            zoom_origin: request.zoom_origin,
            tag: request.tag,
            cancelled: false,
            cancel_source: String::new(),
            gcs,
            size: viewport.size(),
            units: viewport.units_per_pixel(0.0),
            from: [0.0; 4],
            to: [0.0; 4],
            interp: request.interp.unwrap_or(Interpolation::linear4),
            done: request.done,
        };
        let end_point = end_center.unwrap_or(start_center);
        let (from_zoom, to_zoom) = if transition.z_coord {
            (transition.zoom_to_z(start.zoom), transition.zoom_to_z(end.zoom))
        } else {
            (start.zoom, end.zoom)
        };
        transition.from = [start_center.x, start_center.y, from_zoom, start.rotation];
        transition.to = [end_point.x, end_point.y, to_zoom, end.rotation];

        log::debug!(
            target: "mapview",
            "transition start: zoom {} -> {}, {} ms",
            start.zoom,
            end.zoom,
            transition.duration
        );
        self.active = Some(transition);
        self.active.as_ref()
    }

    /// Request cancellation of the running transition.
    ///
    /// The cancel takes effect on the next frame. Returns `false` when nothing
    /// is running or the transition is already cancelled with nothing queued.
    pub fn cancel(&mut self, source: &str) -> bool {
        match self.active.as_mut() {
            Some(active) if !active.cancelled || self.queued.is_some() => {
                active.cancelled = true;
                if !source.is_empty() {
                    active.cancel_source = source.to_string();
                }
                self.queued = None;
                log::trace!(target: "mapview", "transition cancel requested by {:?}", source);
                true
            }
            _ => false,
        }
    }

    /// Drop the running transition without touching the viewport
    pub fn abort(&mut self) -> Option<Transition> {
        self.active.take()
    }

    /// Make the running transition finish on its next frame
    pub fn skip_animation(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.duration = 0.0;
            active.start_time = None;
        }
    }

    /// Advance by one animation frame at `time` (ms)
    pub fn step(&mut self, viewport: &mut Viewport, time: f64) -> TransitionStep {
        let Some(active) = self.active.as_mut() else {
            return TransitionStep::Idle;
        };

        if active.cancelled {
            let next = self.queued.take();
            return match self.active.take() {
                Some(transition) => {
                    log::debug!(
                        target: "mapview",
                        "transition cancelled by {:?}",
                        transition.cancel_source
                    );
                    TransitionStep::Cancelled { transition, next }
                }
                None => TransitionStep::Idle,
            };
        }

        let start = *active.start_time.get_or_insert(time);
        if time >= start + active.duration || self.queued.is_some() {
            let next = self.queued.take();
            if next.is_none() {
                active.apply_end(viewport);
            }
            return match self.active.take() {
                Some(transition) => {
                    log::debug!(target: "mapview", "transition end (superseded: {})", next.is_some());
                    TransitionStep::Finished { transition, next }
                }
                None => TransitionStep::Idle,
            };
        }

        active.apply_frame(viewport, time, start);
        TransitionStep::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(animator: &mut TransitionAnimator, viewport: &mut Viewport, times: &[f64]) -> Vec<TransitionStep> {
        times.iter().map(|t| animator.step(viewport, *t)).collect()
    }

    #[test]
    fn test_transition_reaches_end() {
        let mut viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        let request = TransitionRequest::new()
            .center(Point::new(10.0, 20.0))
            .zoom(6.0)
            .duration(100.0);
        assert!(animator.begin(&viewport, request).is_some());
        assert!(animator.is_active());

        assert!(matches!(animator.step(&mut viewport, 0.0), TransitionStep::Running));
        assert!((viewport.zoom() - 4.0).abs() < 1e-9);

        assert!(matches!(animator.step(&mut viewport, 50.0), TransitionStep::Running));
        assert!(viewport.zoom() > 4.0 && viewport.zoom() < 6.0);

        match animator.step(&mut viewport, 100.0) {
            TransitionStep::Finished { next, .. } => assert!(next.is_none()),
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(viewport.zoom(), 6.0);
        assert!(viewport.center(None).approx_eq(&Point::new(10.0, 20.0), 1e-6));
        assert!(!animator.is_active());
        assert!(matches!(animator.step(&mut viewport, 120.0), TransitionStep::Idle));
    }

    #[test]
    fn test_height_interpolation_is_not_linear_in_zoom() {
        let mut viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        animator.begin(&viewport, TransitionRequest::new().zoom(6.0).duration(100.0));
        run(&mut animator, &mut viewport, &[0.0, 50.0]);
        let expected = -((2f64.powi(-5) + 2f64.powi(-7)) / 2.0).log2() - 1.0;
        assert!((viewport.zoom() - expected).abs() < 1e-5);

        let mut linear = Viewport::default();
        let mut animator = TransitionAnimator::new();
        animator.begin(
            &linear,
            TransitionRequest::new().zoom(6.0).duration(100.0).z_coord(false),
        );
        run(&mut animator, &mut linear, &[0.0, 50.0]);
        assert!((linear.zoom() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_request_while_running_is_queued() {
        let mut viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        animator.begin(&viewport, TransitionRequest::new().zoom(6.0).duration(100.0));
        assert!(animator
            .begin(&viewport, TransitionRequest::new().rotation(1.0))
            .is_none());
        assert!(animator.has_queued());

        match animator.step(&mut viewport, 0.0) {
            TransitionStep::Finished { next: Some(next), .. } => {
                // merged over the running transition's end state
                assert_eq!(next.zoom, Some(6.0));
                assert_eq!(next.rotation, Some(1.0));
            }
            other => panic!("unexpected step {other:?}"),
        }
        // superseded transitions do not snap
        assert!((viewport.zoom() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_is_observed_on_next_frame() {
        let mut viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        assert!(!animator.cancel("test"));

        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        animator.begin(
            &viewport,
            TransitionRequest::new()
                .zoom(8.0)
                .duration(100.0)
                .on_done(move |outcome| *sink.borrow_mut() = Some(outcome.clone())),
        );
        animator.step(&mut viewport, 0.0);
        assert!(animator.cancel("wheel.zoom"));
        assert!(!animator.cancel("again"));
        assert!(animator.is_active());

        match animator.step(&mut viewport, 10.0) {
            TransitionStep::Cancelled { mut transition, next } => {
                assert!(next.is_none());
                transition.finish(false);
            }
            other => panic!("unexpected step {other:?}"),
        }
        let outcome = seen.borrow().clone().unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.source, "wheel.zoom");
        assert_eq!(outcome.end_zoom, 8.0);
        assert!((viewport.zoom() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_skip_animation_finishes_immediately() {
        let mut viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        animator.begin(&viewport, TransitionRequest::new().zoom(7.0));
        animator.skip_animation();
        assert!(matches!(
            animator.step(&mut viewport, 0.0),
            TransitionStep::Finished { next: None, .. }
        ));
        assert_eq!(viewport.zoom(), 7.0);
    }

    #[test]
    fn test_end_rotation_is_not_wrapped() {
        let viewport = Viewport::default();
        let mut animator = TransitionAnimator::new();
        let transition = animator
            .begin(&viewport, TransitionRequest::new().rotation(-1.0))
            .unwrap();
        assert_eq!(transition.end.rotation, -1.0);
        assert_eq!(transition.duration, DEFAULT_TRANSITION_DURATION);
    }

    #[test]
    fn test_merge_prefers_later_fields() {
        let merged = TransitionRequest::new()
            .zoom(3.0)
            .center(Point::new(1.0, 1.0))
            .merge(TransitionRequest::new().zoom(5.0).duration(10.0));
        assert_eq!(merged.zoom, Some(5.0));
        assert_eq!(merged.center, Some(Point::new(1.0, 1.0)));
        assert_eq!(merged.duration, Some(10.0));
    }
}
