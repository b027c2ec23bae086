//! Inertial motion after a pan or zoom gesture.
//!
//! Velocity decays exponentially with a drag coefficient. An optional
//! spring pulls the view back toward the max bounds. Motion stops once the
//! decayed speed plus the spring contribution falls below the minimum speed.

use crate::core::config::{MomentumOptions, SpringOptions};
use crate::core::constants::MOMENTUM_FALLBACK_DT;
use crate::core::geo::{Point, Size};
use crate::core::viewport::Viewport;
use crate::input::actions::NavAction;

/// Longest step applied to the view in one frame (ms)
const MAX_STEP_DT: f64 = 30.0;

/// Force pulling the view back inside the max bounds, in px/ms²
pub fn spring_force(viewport: &Viewport, spring: &SpringOptions) -> Point {
    if !spring.enabled {
        return Point::default();
    }
    let gcs = Some(viewport.gcs());
    let max_bounds = viewport.max_bounds(gcs);
    let ul = viewport.gcs_to_display(Point::new(max_bounds.left, max_bounds.top), gcs);
    let lr = viewport.gcs_to_display(Point::new(max_bounds.right, max_bounds.bottom), gcs);
    force_from_corners(ul, lr, viewport.size(), spring.spring_constant)
}

fn force_from_corners(ul: Point, lr: Point, size: Size, c: f64) -> Point {
    let x_plus = c * ul.x.max(0.0);
    let x_minus = c * (size.width - lr.x).max(0.0);
    let y_plus = c * ul.y.max(0.0) / 2.0;
    let y_minus = c * (size.height - lr.y).max(0.0) / 2.0;
    Point::new(x_plus - x_minus, y_plus - y_minus)
}

/// Decay `velocity` over `dt` ms and add the spring force.
///
/// Returns `None` when the motion should stop.
pub fn modify_velocity(
    velocity: Point,
    dt: f64,
    options: &MomentumOptions,
    force: Point,
) -> Option<Point> {
    let dt = if dt <= 0.0 { MOMENTUM_FALLBACK_DT } else { dt };
    let speed = velocity.length();
    let decayed = speed * (-options.drag * dt).exp();
    if force.length() * dt + decayed < options.min_speed {
        return None;
    }
    let direction = if speed > 0.0 {
        velocity.multiply(decayed / speed)
    } else {
        Point::default()
    };
    Some(direction.subtract(&force.multiply(dt)))
}

/// Limit the speed to `max_speed`; non-finite velocities become zero
pub fn cap_velocity(velocity: Point, max_speed: f64) -> Point {
    let speed = velocity.length();
    let capped = if speed > max_speed {
        velocity.multiply(max_speed / speed)
    } else {
        velocity
    };
    if capped.is_finite() {
        capped
    } else {
        Point::default()
    }
}

/// Velocity left when a gesture is released at `release_time`.
///
/// `last_move` is the time of the last pointer update and `delta_time` the
/// interval that produced `velocity`. A pointer that rested for `stop_time`
/// or longer carries no momentum.
pub fn release_velocity(
    velocity: Point,
    last_move: f64,
    delta_time: f64,
    release_time: f64,
    stop_time: f64,
) -> Point {
    let idle = release_time - last_move;
    if idle < stop_time {
        let dt = idle + delta_time;
        if dt > 0.0 {
            return velocity.multiply(delta_time / dt);
        }
        velocity
    } else {
        Point::default()
    }
}

/// What one momentum frame should do to the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MomentumStep {
    /// Pan by this many display pixels
    Pan(Point),
    /// Change zoom by this amount
    Zoom(f64),
}

/// A running momentum or spring-back
#[derive(Debug, Clone, PartialEq)]
pub struct Momentum {
    /// The gesture that started it
    pub action: NavAction,
    /// Display pixels per ms
    pub velocity: Point,
    /// Time of the previous frame
    pub last_time: f64,
}

impl Momentum {
    pub fn new(action: NavAction, velocity: Point, start: f64) -> Self {
        Self {
            action,
            velocity,
            last_time: start,
        }
    }

    /// Advance to `time`. Returns `None` once the motion has died out.
    pub fn step(
        &mut self,
        viewport: &Viewport,
        time: f64,
        momentum: &MomentumOptions,
        spring: &SpringOptions,
        zoom_scale: f64,
    ) -> Option<MomentumStep> {
        let frame_dt = time - self.last_time;
        self.last_time = time;
        let force = spring_force(viewport, spring);
        let velocity = modify_velocity(self.velocity, frame_dt, momentum, force)?;
        self.velocity = cap_velocity(velocity, momentum.max_speed);

        let dt = if frame_dt <= 0.0 {
            MOMENTUM_FALLBACK_DT
        } else {
            frame_dt.min(MAX_STEP_DT)
        };
        Some(match self.action {
            NavAction::Zoom => MomentumStep::Zoom(-self.velocity.y * dt * zoom_scale / 120.0),
            _ => MomentumStep::Pan(self.velocity.multiply(dt)),
        })
    }
}
