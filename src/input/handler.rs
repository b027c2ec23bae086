//! Interaction state machine.
//!
//! [`MapInteractor`] turns normalized input events into navigation on a
//! [`MapCore`]. It is idle, running exactly one navigation action, or gliding
//! with momentum. Time-based behavior (throttled moves and wheel, debounced
//! discrete zoom, click timeouts and momentum) runs from frame tasks the
//! interactor schedules on the map's animation queue.

use crate::animation::scheduler::{FrameStatus, FrameTaskKind};
use crate::animation::transitions::{TransitionOutcome, TransitionRequest, TransitionTag};
use crate::core::config::{InteractionProfile, InteractorOptions};
use crate::core::constants::{WHEEL_LINE_HEIGHT, WHEEL_LINE_UNITS};
use crate::core::geo::Point;
use crate::core::map::MapCore;
use crate::core::viewport::{Anchor, ClampMode, Viewport};
use crate::input::actions::{
    self, bindings_from_config, default_bindings, resolve_action, ActionBinding, ActiveInputs,
    NavAction, SelectionEvent,
};
use crate::input::events::{
    Corners, InputEvent, KeyCode, KeyModifiers, MapEvent, MouseButton, MouseState, Selection,
    TouchEventType, WheelDeltaMode,
};
use crate::input::gestures::{GestureSample, TouchTracker, ZoomRotateGesture, ZoomRotateUpdate};
use crate::input::keyboard::{key_effect, resolve_key, KeyEffect};
use crate::input::momentum::{release_velocity, Momentum, MomentumStep};
use crate::input::throttle::{Debounce, Throttle};

/// A navigation action in progress
#[derive(Debug, Clone, PartialEq)]
pub struct ActionState {
    pub action: NavAction,
    /// Selection event raised when the rectangle is released
    pub selection: Option<SelectionEvent>,
    /// Pointer when the action started
    pub origin: MouseState,
    /// Total movement applied so far
    pub delta: Point,
    /// Started by touch rather than a mouse button
    pub touch: bool,
    origin_rotation: Option<f64>,
    zoom_rotate: Option<ZoomRotateGesture>,
}

/// What the interactor is doing
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Action(ActionState),
    /// Gliding after a released gesture
    Momentum {
        momentum: Momentum,
        /// Pointer at release, used as the zoom origin
        origin: Anchor,
    },
}

impl InteractionState {
    /// The running action, if any
    pub fn action(&self) -> Option<NavAction> {
        match self {
            InteractionState::Action(state) => Some(state.action),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn is_momentum(&self) -> bool {
        matches!(self, InteractionState::Momentum { .. })
    }
}

/// Input waiting to be applied by a throttled handler
#[derive(Debug, Clone, Copy, PartialEq)]
enum InputQueue {
    Empty,
    /// Pointer moves of the running action
    Move,
    /// Scroll accumulated in lines
    Wheel(Point),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointerSample {
    position: Point,
    modifiers: KeyModifiers,
    time: f64,
}

/// Zoom requests collected between applications
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ZoomAccumulator {
    delta: f64,
    start: f64,
    target: Option<f64>,
    origin: Option<Anchor>,
}

/// Selection rectangle spanned by two pointer snapshots
pub fn selection_between(viewport: &Viewport, origin: &MouseState, mouse: &MouseState) -> Selection {
    let upper_left = Point::new(
        origin.position.x.min(mouse.position.x),
        origin.position.y.min(mouse.position.y),
    );
    let lower_right = Point::new(
        origin.position.x.max(mouse.position.x),
        origin.position.y.max(mouse.position.y),
    );
    let display = Corners {
        upper_left,
        upper_right: Point::new(lower_right.x, upper_left.y),
        lower_left: Point::new(upper_left.x, lower_right.y),
        lower_right,
    };
    let gcs = Corners {
        upper_left: viewport.display_to_gcs(display.upper_left, None),
        upper_right: viewport.display_to_gcs(display.upper_right, None),
        lower_left: viewport.display_to_gcs(display.lower_left, None),
        lower_right: viewport.display_to_gcs(display.lower_right, None),
    };
    Selection {
        display,
        gcs,
        mouse: *mouse,
        origin: *origin,
    }
}

/// Zoom level and view change that make a selection fill the viewport.
///
/// Returns `None` for an empty rectangle.
fn selection_scale(viewport: &Viewport, selection: &Selection) -> Option<(f64, Point)> {
    let size = viewport.size();
    let display = &selection.display;
    let scale_x = (display.lower_right.x - display.upper_left.x) / size.width;
    let scale_y = (display.lower_right.y - display.upper_left.y) / size.height;
    let scale = scale_x.max(scale_y);
    if !(scale > 0.0 && scale.is_finite()) {
        return None;
    }
    Some((scale.log2(), display.upper_left.midpoint(&display.lower_right)))
}

/// Turns input events into navigation on one map
#[derive(Debug)]
pub struct MapInteractor {
    options: InteractorOptions,
    bindings: Vec<ActionBinding>,
    state: InteractionState,
    mouse: MouseState,
    paused: bool,
    queue: InputQueue,
    click_maybe: bool,
    click_deadline: Option<f64>,
    move_throttle: Throttle,
    pending_move: Option<PointerSample>,
    wheel_throttle: Throttle,
    zoom_debounce: Debounce,
    zoom: ZoomAccumulator,
    touches: TouchTracker,
    pointer_capture: bool,
}

impl Default for MapInteractor {
    fn default() -> Self {
        Self::new(InteractorOptions::default())
    }
}

impl MapInteractor {
    pub fn new(options: InteractorOptions) -> Self {
        let bindings = match &options.actions {
            Some(configs) => bindings_from_config(configs),
            None => default_bindings(),
        };
        Self {
            bindings,
            state: InteractionState::Idle,
            mouse: MouseState::default(),
            paused: false,
            queue: InputQueue::Empty,
            click_maybe: false,
            click_deadline: None,
            move_throttle: Throttle::new(options.throttle),
            pending_move: None,
            wheel_throttle: Throttle::new(options.throttle),
            zoom_debounce: Debounce::new(options.zoom_debounce),
            zoom: ZoomAccumulator::default(),
            touches: TouchTracker::new(),
            pointer_capture: false,
            options,
        }
    }

    pub fn from_profile(profile: &InteractionProfile) -> Self {
        Self::new(profile.resolve())
    }

    pub fn options(&self) -> &InteractorOptions {
        &self.options
    }

    /// Replace the options. Bindings are rebuilt only when the new options
    /// carry their own list.
    pub fn set_options(&mut self, options: InteractorOptions) {
        if let Some(configs) = &options.actions {
            self.bindings = bindings_from_config(configs);
        }
        self.move_throttle.set_delay(options.throttle);
        self.wheel_throttle.set_delay(options.throttle);
        self.zoom_debounce.set_delay(options.zoom_debounce);
        self.options = options;
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Last known pointer state
    pub fn mouse(&self) -> &MouseState {
        &self.mouse
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ignore input events while paused; frame tasks keep running
    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// True while a pointer action runs and moves outside the map should
    /// still be delivered
    pub fn wants_pointer_capture(&self) -> bool {
        self.pointer_capture
    }

    // ---------------------------------------------------------------------
    // bindings
    // ---------------------------------------------------------------------

    pub fn bindings(&self) -> &[ActionBinding] {
        &self.bindings
    }

    pub fn add_action(&mut self, binding: ActionBinding, to_end: bool) {
        actions::add_action(&mut self.bindings, binding, to_end);
    }

    pub fn remove_action(&mut self, action: NavAction, name: Option<&str>, owner: Option<&str>) -> usize {
        actions::remove_action(&mut self.bindings, action, name, owner)
    }

    pub fn has_action(&self, action: NavAction, name: Option<&str>, owner: Option<&str>) -> bool {
        actions::has_action(&self.bindings, action, name, owner)
    }

    // ---------------------------------------------------------------------
    // cancelling
    // ---------------------------------------------------------------------

    /// Stop the running action immediately, or only `action` when given.
    /// Returns whether anything was stopped.
    pub fn cancel(&mut self, action: Option<NavAction>) -> bool {
        let stop = match (&self.state, action) {
            (InteractionState::Action(_), None) => true,
            (InteractionState::Action(state), Some(action)) => state.action == action,
            _ => false,
        };
        if stop {
            self.queue = InputQueue::Empty;
            self.pending_move = None;
            self.pointer_capture = false;
            self.state = InteractionState::Idle;
        }
        stop
    }

    /// Stop momentum. Returns whether it was running.
    pub fn cancel_momentum(&mut self) -> bool {
        if self.state.is_momentum() {
            log::trace!(target: "mapview", "momentum cancelled");
            self.state = InteractionState::Idle;
            true
        } else {
            false
        }
    }

    // ---------------------------------------------------------------------
    // events
    // ---------------------------------------------------------------------

    /// Handle one input event. Returns whether it was consumed.
    pub fn handle_event(&mut self, core: &mut MapCore, event: &InputEvent) -> bool {
        if let InputEvent::Resize { size } = event {
            let size = *size;
            core.update(|vp| vp.set_size(size));
            return true;
        }
        if self.paused {
            return false;
        }
        match event {
            InputEvent::MouseDown {
                position,
                button,
                modifiers,
                time,
            } => self.mouse_down(core, *position, *button, *modifiers, *time),
            InputEvent::MouseMove {
                position,
                modifiers,
                time,
            } => self.mouse_move(core, *position, *modifiers, *time),
            InputEvent::MouseUp {
                button,
                modifiers,
                time,
                ..
            } => self.mouse_up(core, *button, *modifiers, *time),
            InputEvent::Scroll {
                delta,
                mode,
                position,
                modifiers,
                time,
            } => self.wheel(core, *delta, *mode, *position, *modifiers, *time),
            InputEvent::Touch {
                event_type,
                touches,
                time,
            } => {
                let samples = self.touches.update(*event_type, touches, *time);
                let mut handled = false;
                for sample in &samples {
                    handled |= self.gesture(core, sample);
                }
                handled
            }
            InputEvent::Gesture {
                phase,
                center,
                scale,
                rotation,
                pointers,
                time,
            } => {
                let sample = GestureSample {
                    phase: *phase,
                    center: *center,
                    scale: *scale,
                    rotation: *rotation,
                    pointers: *pointers,
                    time: *time,
                };
                self.gesture(core, &sample)
            }
            InputEvent::KeyPress {
                key,
                modifiers,
                time,
            } => self.key_press(core, *key, *modifiers, *time),
            InputEvent::Resize { .. } => false,
        }
    }

    /// Record the pointer position and derive its velocity
    fn update_mouse(&mut self, core: &MapCore, position: Point, modifiers: KeyModifiers, time: f64) {
        let dt = time - self.mouse.time;
        if dt > 0.0 {
            self.mouse.velocity = position.subtract(&self.mouse.position).multiply(1.0 / dt);
            self.mouse.delta_time = dt;
        }
        self.mouse.time = time;
        self.locate_mouse(core.viewport(), position, modifiers);
    }

    fn locate_mouse(&mut self, viewport: &Viewport, position: Point, modifiers: KeyModifiers) {
        self.mouse.position = position;
        self.mouse.geo = viewport.display_to_gcs(position, None);
        self.mouse.map_gcs = viewport.display_to_gcs(position, Some(viewport.gcs()));
        self.mouse.modifiers = modifiers;
    }

    fn mouse_anchor(&self) -> Anchor {
        Anchor {
            display: self.mouse.position,
            geo: self.mouse.map_gcs,
        }
    }

    fn start_action(
        &mut self,
        core: &mut MapCore,
        action: NavAction,
        selection: Option<SelectionEvent>,
        touch: bool,
    ) {
        self.queue = InputQueue::Move;
        self.pending_move = None;
        self.move_throttle.reset();
        let zoom_rotate = (action == NavAction::ZoomRotate)
            .then(|| ZoomRotateGesture::new(core.viewport(), self.mouse.position));
        self.state = InteractionState::Action(ActionState {
            action,
            selection,
            origin: self.mouse,
            delta: Point::default(),
            touch,
            origin_rotation: None,
            zoom_rotate,
        });
        log::debug!(target: "mapview", "interaction start: {action}");
        if selection.is_some() {
            let brush = selection_between(core.viewport(), &self.mouse, &self.mouse);
            core.emit(MapEvent::BrushStart(brush));
        }
        core.emit(MapEvent::ActionDown {
            action,
            mouse: self.mouse,
        });
    }

    fn mouse_down(
        &mut self,
        core: &mut MapCore,
        position: Point,
        button: MouseButton,
        modifiers: KeyModifiers,
        time: f64,
    ) -> bool {
        self.update_mouse(core, position, modifiers, time);
        self.mouse.buttons.set(button, true);

        let click = &self.options.click;
        let buttons = &self.mouse.buttons;
        if click.enabled
            && (!buttons.left || click.buttons.left)
            && (!buttons.right || click.buttons.right)
            && (!buttons.middle || click.buttons.middle)
        {
            self.click_maybe = true;
            self.click_deadline = None;
            if click.duration > 0.0 {
                self.click_deadline = Some(time + click.duration);
                core.schedule(FrameTaskKind::Timers);
            }
        }

        let binding = resolve_action(
            &self.bindings,
            &ActiveInputs::from_buttons(&self.mouse.buttons),
            &self.mouse.modifiers,
        )
        .map(|binding| (binding.action, binding.selection_rectangle));
        let name = binding.map_or("none", |(action, _)| action.as_str());
        core.transition_cancel(&format!("_handleMouseDown.{name}"));
        self.cancel_momentum();
        self.mouse.velocity = Point::default();

        if let Some((action, selection)) = binding {
            self.start_action(core, action, selection, false);
            self.pointer_capture = true;
        }
        true
    }

    fn mouse_move(&mut self, core: &mut MapCore, position: Point, modifiers: KeyModifiers, time: f64) -> bool {
        if let InteractionState::Action(state) = &self.state {
            if state.touch || self.queue != InputQueue::Move {
                return false;
            }
            self.pending_move = Some(PointerSample {
                position,
                modifiers,
                time,
            });
            if self.move_throttle.call(time) {
                self.apply_pending_move(core);
            } else {
                core.schedule(FrameTaskKind::Timers);
            }
            return true;
        }

        if self.options.click.cancel_on_move {
            self.click_maybe = false;
        }
        self.update_mouse(core, position, modifiers, time);
        if !self.click_maybe {
            core.emit(MapEvent::MouseMove(self.mouse));
        }
        true
    }

    fn apply_pending_move(&mut self, core: &mut MapCore) {
        let Some(sample) = self.pending_move.take() else {
            return;
        };
        self.update_mouse(core, sample.position, sample.modifiers, sample.time);
        if self.options.click.cancel_on_move {
            self.click_maybe = false;
        }
        if self.click_maybe {
            return;
        }
        self.drag(core, sample.time, None);
    }

    /// Apply the movement since the last update to the running action
    fn drag(&mut self, core: &mut MapCore, time: f64, gesture: Option<&GestureSample>) {
        let mouse = self.mouse;
        let (action, step, selection, origin) = match &mut self.state {
            InteractionState::Action(state) => {
                // measured from the origin so rounding errors do not accumulate
                let step = mouse
                    .position
                    .subtract(&state.origin.position)
                    .subtract(&state.delta);
                state.delta = state.delta.add(&step);
                (state.action, step, state.selection, state.origin)
            }
            _ => return,
        };

        match action {
            NavAction::Pan => core.update(|vp| vp.pan_with(step, false, ClampMode::Limited)),
            NavAction::Zoom => {
                let anchor = Anchor {
                    display: origin.position,
                    geo: origin.map_gcs,
                };
                self.debounced_zoom(core, -step.y * self.options.zoom_scale / 120.0, anchor, time);
            }
            NavAction::Rotate => {
                let half = core.viewport().size().center();
                let rotation = core.viewport().rotation();
                let origin_rotation = match &mut self.state {
                    InteractionState::Action(state) => *state.origin_rotation.get_or_insert_with(|| {
                        let v = origin.position.subtract(&half);
                        rotation - v.y.atan2(v.x)
                    }),
                    _ => return,
                };
                let v = mouse.position.subtract(&half);
                core.update(|vp| vp.rotate_to(origin_rotation + v.y.atan2(v.x), None, false));
            }
            NavAction::ZoomRotate => {
                let update = match (&mut self.state, gesture) {
                    (InteractionState::Action(state), Some(sample)) => state
                        .zoom_rotate
                        .as_mut()
                        .map(|g| g.update(core.viewport(), sample, &self.options.zoom_rotate)),
                    _ => None,
                };
                if let Some(update) = update {
                    apply_zoom_rotate(core, update);
                }
            }
            NavAction::Select | NavAction::ZoomSelect | NavAction::UnzoomSelect => {}
        }

        if selection.is_some() {
            let brush = selection_between(core.viewport(), &origin, &self.mouse);
            core.emit(MapEvent::Brush(brush));
        }
        core.emit(MapEvent::ActionMove {
            action,
            mouse: self.mouse,
            delta: step,
        });
    }

    fn mouse_up(&mut self, core: &mut MapCore, button: MouseButton, modifiers: KeyModifiers, time: f64) -> bool {
        self.mouse.buttons.set(button, false);
        self.mouse.modifiers = modifiers;
        self.move_throttle.cancel();
        self.pending_move = None;

        if self.click_maybe {
            self.click_maybe = false;
            self.click_deadline = None;
            self.cancel(None);
            core.emit(MapEvent::MouseClick(self.mouse));
            return true;
        }
        match &self.state {
            InteractionState::Action(state) if !state.touch => {
                self.queue = InputQueue::Empty;
                self.pointer_capture = false;
                self.end_action(core, time);
                true
            }
            _ => false,
        }
    }

    /// Finish the running action: selection events, zoom snapping, momentum
    fn end_action(&mut self, core: &mut MapCore, time: f64) {
        let state = match std::mem::take(&mut self.state) {
            InteractionState::Action(state) => state,
            other => {
                self.state = other;
                return;
            }
        };
        let action = state.action;

        if let Some(event) = state.selection {
            let selection = selection_between(core.viewport(), &state.origin, &self.mouse);
            core.emit(MapEvent::BrushEnd(selection));
            core.emit(match event {
                SelectionEvent::Select => MapEvent::Select(selection),
                SelectionEvent::ZoomSelect => MapEvent::ZoomSelect(selection),
                SelectionEvent::UnzoomSelect => MapEvent::UnzoomSelect(selection),
            });
            core.emit(MapEvent::ActionSelection { action, selection });
            match event {
                SelectionEvent::ZoomSelect => zoom_to_selection(core, &selection, false),
                SelectionEvent::UnzoomSelect => zoom_to_selection(core, &selection, true),
                SelectionEvent::Select => {}
            }
        }

        if action == NavAction::ZoomRotate && core.viewport().discrete_zoom() {
            core.update(|vp| vp.zoom_to(vp.zoom(), None, false));
        }

        core.emit(MapEvent::ActionUp {
            action,
            mouse: self.mouse,
        });
        log::debug!(target: "mapview", "interaction end: {action}");

        let momentum = &self.options.momentum;
        if momentum.enabled && momentum.actions.contains(&action) {
            self.mouse.velocity = release_velocity(
                self.mouse.velocity,
                self.mouse.time,
                self.mouse.delta_time,
                time,
                momentum.stop_time,
            );
            self.spring_back(core, true, action, time);
        }
    }

    // ---------------------------------------------------------------------
    // wheel
    // ---------------------------------------------------------------------

    fn wheel(
        &mut self,
        core: &mut MapCore,
        delta: Point,
        mode: WheelDeltaMode,
        position: Point,
        modifiers: KeyModifiers,
        time: f64,
    ) -> bool {
        self.locate_mouse(core.viewport(), position, modifiers);
        let factor = match mode {
            WheelDeltaMode::Pixel => 1.0,
            WheelDeltaMode::Line => WHEEL_LINE_HEIGHT,
            WheelDeltaMode::Page => core.viewport().size().height,
        };
        let scroll = Point::new(
            delta.x * self.options.wheel_scale_x * factor / WHEEL_LINE_UNITS,
            delta.y * self.options.wheel_scale_y * factor / WHEEL_LINE_UNITS,
        );
        self.queue = match self.queue {
            InputQueue::Wheel(total) => InputQueue::Wheel(total.add(&scroll)),
            _ => InputQueue::Wheel(scroll),
        };
        if self.wheel_throttle.call(time) {
            self.fire_wheel(core, time);
        } else {
            core.schedule(FrameTaskKind::Timers);
        }
        true
    }

    fn fire_wheel(&mut self, core: &mut MapCore, time: f64) {
        let InputQueue::Wheel(scroll) = self.queue else {
            return;
        };
        self.queue = InputQueue::Empty;
        let Some(action) = resolve_action(&self.bindings, &ActiveInputs::wheel(), &self.mouse.modifiers)
            .map(|binding| binding.action)
        else {
            return;
        };

        // anything that was moving the map invalidates the geo position
        let mut recompute = core.transition_cancel(&format!("wheel.{action}"));
        recompute |= self.cancel_momentum();
        if recompute {
            let (position, modifiers) = (self.mouse.position, self.mouse.modifiers);
            self.locate_mouse(core.viewport(), position, modifiers);
        }

        let anchor = self.mouse_anchor();
        match action {
            NavAction::Pan => core.update(|vp| vp.pan(scroll)),
            NavAction::Zoom => self.debounced_zoom(core, -scroll.y, anchor, time),
            NavAction::Rotate => {
                let rotation = core.viewport().rotation() + scroll.y * self.options.rotate_wheel_scale;
                core.update(|vp| vp.rotate_to(rotation, Some(anchor), false));
            }
            _ => {}
        }
        core.emit(MapEvent::ActionWheel {
            action,
            mouse: self.mouse,
            scroll,
        });
    }

    // ---------------------------------------------------------------------
    // zoom accumulation
    // ---------------------------------------------------------------------

    fn debounced_zoom(&mut self, core: &mut MapCore, dz: f64, origin: Anchor, time: f64) {
        let discrete = core.viewport().discrete_zoom();
        let animated = self.options.zoom_animation.enabled;
        if discrete && !animated {
            self.accumulate_zoom(core, dz, origin);
            self.zoom_debounce.call(time);
            core.schedule(FrameTaskKind::Timers);
        } else {
            if dz == 0.0 && self.zoom.target.is_none() {
                return;
            }
            self.accumulate_zoom(core, dz, origin);
            self.apply_zoom(core);
        }
    }

    fn accumulate_zoom(&mut self, core: &mut MapCore, dz: f64, origin: Anchor) {
        let zoom = core.viewport().zoom();
        let acc = &mut self.zoom;
        acc.origin = Some(origin);
        acc.delta += dz;
        if acc.target.is_none() {
            acc.start = zoom;
        }
        *acc.target.get_or_insert(zoom) += dz;

        // without animation a discrete map steps as soon as a whole level
        // has built up; the remainder carries over
        if core.viewport().discrete_zoom()
            && !self.options.zoom_animation.enabled
            && acc.delta.abs() >= 1.0
        {
            let next = (acc.delta + zoom).round();
            acc.delta = acc.delta + zoom - next;
            core.update(|vp| vp.zoom_to(next, Some(origin), false));
        }
    }

    fn apply_zoom(&mut self, core: &mut MapCore) {
        let current = core.viewport().zoom();
        let discrete = core.viewport().discrete_zoom();
        let origin = self.zoom.origin;
        if self.options.zoom_animation.enabled {
            let target = self.zoom.target.unwrap_or(current);
            let start = self.zoom.start;
            let mut zoom = target;
            if discrete {
                zoom = zoom.round();
                if zoom == start && target != start {
                    zoom = start + if target > start { 1.0 } else { -1.0 };
                }
            }
            core.transition_cancel("debounced_zoom.zoom");
            let mut request = TransitionRequest::new()
                .zoom(zoom)
                .duration(self.options.zoom_animation.duration)
                .ease(self.options.zoom_animation.ease)
                .tag(TransitionTag::ZoomAnimation);
            if let Some(origin) = origin {
                request = request.zoom_origin(origin);
            }
            core.transition(request, None);
        } else {
            let mut zoom = self.zoom.delta + current;
            if discrete {
                zoom = zoom.round();
            }
            core.update(|vp| vp.zoom_to(zoom, origin, false));
            self.zoom.target = None;
        }
        self.zoom.delta = 0.0;
    }

    /// React to the end of a transition this interactor may have started
    pub fn on_transition_outcome(&mut self, core: &mut MapCore, outcome: &TransitionOutcome) {
        if outcome.tag != TransitionTag::ZoomAnimation {
            return;
        }
        let superseded_by_zoom = outcome.source.ends_with(".zoom");
        if !outcome.next && (!outcome.cancelled || !superseded_by_zoom) {
            self.zoom.target = None;
        }
        // a discrete map must come to rest on a whole level unless more
        // zooming follows
        if core.viewport().discrete_zoom() && outcome.cancelled && !superseded_by_zoom {
            let origin = self.zoom.origin;
            let end_zoom = outcome.end_zoom;
            core.update(|vp| vp.zoom_to(end_zoom, origin, false));
        }
    }

    // ---------------------------------------------------------------------
    // momentum
    // ---------------------------------------------------------------------

    /// Start momentum for `action`, or only the spring back into bounds when
    /// `initial_velocity` is false
    pub fn spring_back(&mut self, core: &mut MapCore, initial_velocity: bool, action: NavAction, time: f64) {
        if self.state.is_momentum() {
            return;
        }
        if !initial_velocity {
            self.mouse.velocity = Point::default();
        }
        log::debug!(
            target: "mapview",
            "momentum start: {action}, velocity ({:.3}, {:.3})",
            self.mouse.velocity.x,
            self.mouse.velocity.y
        );
        self.state = InteractionState::Momentum {
            momentum: Momentum::new(action, self.mouse.velocity, time),
            origin: self.mouse_anchor(),
        };
        core.schedule(FrameTaskKind::Momentum);
    }

    /// One momentum frame
    pub fn momentum_frame(&mut self, core: &mut MapCore, time: f64) -> FrameStatus {
        if !self.state.is_momentum() {
            return FrameStatus::Done;
        }
        if core.transition_active() {
            self.state = InteractionState::Idle;
            return FrameStatus::Done;
        }
        let (step, velocity, origin) = match &mut self.state {
            InteractionState::Momentum { momentum, origin } => {
                let step = momentum.step(
                    core.viewport(),
                    time,
                    &self.options.momentum,
                    &self.options.spring,
                    self.options.zoom_scale,
                );
                (step, momentum.velocity, *origin)
            }
            _ => return FrameStatus::Done,
        };
        match step {
            None => {
                log::debug!(target: "mapview", "momentum stopped");
                self.state = InteractionState::Idle;
                FrameStatus::Done
            }
            Some(MomentumStep::Pan(delta)) => {
                self.mouse.velocity = velocity;
                core.update(|vp| vp.pan(delta));
                FrameStatus::Continue
            }
            Some(MomentumStep::Zoom(dz)) => {
                self.mouse.velocity = velocity;
                self.debounced_zoom(core, dz, origin, time);
                FrameStatus::Continue
            }
        }
    }

    /// Fire due trailing calls and timeouts
    pub fn timers_frame(&mut self, core: &mut MapCore, time: f64) -> FrameStatus {
        if self.click_deadline.is_some_and(|deadline| time >= deadline) {
            self.click_maybe = false;
            self.click_deadline = None;
        }
        if self.move_throttle.poll(time) {
            self.apply_pending_move(core);
        }
        if self.wheel_throttle.poll(time) {
            self.fire_wheel(core, time);
        }
        if self.zoom_debounce.poll(time) {
            self.apply_zoom(core);
        }
        let pending = self.click_deadline.is_some()
            || self.move_throttle.is_pending()
            || self.wheel_throttle.is_pending()
            || self.zoom_debounce.is_pending();
        if pending {
            FrameStatus::Continue
        } else {
            FrameStatus::Done
        }
    }

    // ---------------------------------------------------------------------
    // touch
    // ---------------------------------------------------------------------

    fn gesture(&mut self, core: &mut MapCore, sample: &GestureSample) -> bool {
        let touch_action = matches!(&self.state, InteractionState::Action(state) if state.touch);
        match sample.phase {
            TouchEventType::Start => {
                let modifiers = KeyModifiers::default();
                let binding = resolve_action(&self.bindings, &ActiveInputs::touch(sample.pointers), &modifiers)
                    .map(|binding| (binding.action, binding.selection_rectangle));
                let Some((action, selection)) = binding else {
                    return false;
                };
                core.transition_cancel(&format!("_handleTouch.{action}"));
                self.cancel_momentum();
                self.update_mouse(core, sample.center, modifiers, sample.time);
                self.mouse.velocity = Point::default();
                self.start_action(core, action, selection, true);
                true
            }
            TouchEventType::Move if touch_action => {
                self.update_mouse(core, sample.center, KeyModifiers::default(), sample.time);
                self.drag(core, sample.time, Some(sample));
                true
            }
            TouchEventType::End | TouchEventType::Cancel if touch_action => {
                self.queue = InputQueue::Empty;
                self.end_action(core, sample.time);
                true
            }
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // keyboard
    // ---------------------------------------------------------------------

    fn key_press(&mut self, core: &mut MapCore, key: KeyCode, modifiers: KeyModifiers, _time: f64) -> bool {
        if !self.options.keyboard.enabled {
            return false;
        }
        let Some((action, factor)) = resolve_key(&self.options.keyboard.bindings, key, &modifiers) else {
            return false;
        };
        let dispatch = core.emit(MapEvent::KeyAction { action, factor });
        if dispatch.stopped || dispatch.cancel_navigation || dispatch.cancel_animation {
            return true;
        }

        let viewport = core.viewport();
        let (zoom, discrete) = (viewport.zoom(), viewport.discrete_zoom());
        let effect = key_effect(
            action,
            factor,
            &self.options.keyboard,
            viewport.size(),
            zoom,
            viewport.rotation(),
        );
        core.transition_cancel(&format!("keyboard.{action}"));
        self.cancel_momentum();
        match effect {
            KeyEffect::Zoom(target) => {
                let mut next = target;
                if discrete {
                    next = target.round();
                    if next == zoom && target != zoom {
                        next = zoom + (target - zoom).signum();
                    }
                }
                core.update(|vp| vp.zoom_to(next, None, false));
            }
            KeyEffect::Pan(delta) => core.update(|vp| vp.pan(delta)),
            KeyEffect::Rotate(rotation) => core.update(|vp| vp.rotate_to(rotation, None, false)),
        }
        true
    }
}

fn apply_zoom_rotate(core: &mut MapCore, update: ZoomRotateUpdate) {
    core.update(|vp| {
        if let Some(rotation) = update.rotation {
            vp.rotate_to(rotation, None, false);
        }
        if let Some(zoom) = update.zoom {
            vp.zoom_to(zoom, None, true);
        }
        if let Some(anchor) = update.pan {
            let shifted = vp.gcs_to_display(anchor.geo, Some(vp.gcs()));
            vp.pan_with(anchor.display.subtract(&shifted), true, ClampMode::Limited);
        }
    });
}

/// Zoom so the selection fills the viewport, or for `unzoom` so the current
/// view shrinks into the selection
fn zoom_to_selection(core: &mut MapCore, selection: &Selection, unzoom: bool) {
    let viewport = core.viewport();
    let Some((levels, middle)) = selection_scale(viewport, selection) else {
        return;
    };
    let zoom = viewport.zoom();
    let gcs = viewport.gcs();
    if unzoom {
        let half = viewport.size().center();
        core.update(|vp| {
            vp.zoom_to(zoom + levels, None, false);
            vp.pan(middle.subtract(&half));
        });
    } else {
        let center = viewport.display_to_gcs(middle, Some(gcs));
        core.update(|vp| {
            vp.zoom_to(zoom - levels, None, false);
            vp.center_with(center, Some(gcs), false, ClampMode::Full);
        });
    }
}
