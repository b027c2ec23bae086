//! Map facade.
//!
//! [`MapCore`] owns the viewport, the event bus, the transition animator and
//! a handle to the animation queue. [`Map`] adds the optional interactor and
//! is the [`FrameHandler`] the host drives once per animation frame.

use crate::animation::scheduler::{
    process_frame, AnimationQueue, FrameHandler, FrameStatus, FrameTask, FrameTaskKind,
    ScheduleAction, SharedAnimationQueue,
};
use crate::animation::transitions::{
    Transition, TransitionAnimator, TransitionOutcome, TransitionRequest, TransitionStep,
};
use crate::core::bounds::{Bounds, BoundsUpdate};
use crate::core::config::MapOptions;
use crate::core::geo::{Point, Size};
use crate::core::projection::Crs;
use crate::core::viewport::{Anchor, RotationPolicy, Viewport, ZoomRange};
use crate::input::actions::NavAction;
use crate::input::events::{
    Dispatch, EventBus, EventKind, EventResponse, InputEvent, MapEvent, TransitionInfo,
};
use crate::input::handler::MapInteractor;
use crate::rendering::camera::ProjectionType;
use crate::Result;
use instant::Instant;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a map in a shared animation queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapId(pub u64);

impl MapId {
    fn next() -> Self {
        MapId(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Millisecond timestamps for hosts without their own frame clock
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    start: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the clock was created
    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Viewport, events and transitions of one map
pub struct MapCore {
    id: MapId,
    viewport: Viewport,
    transitions: TransitionAnimator,
    events: EventBus,
    queue: SharedAnimationQueue,
    /// Outcomes of finished or cancelled transitions not yet seen by the
    /// interactor
    outcomes: Vec<TransitionOutcome>,
}

impl std::fmt::Debug for MapCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCore")
            .field("id", &self.id)
            .field("viewport", &self.viewport)
            .field("transition", &self.transitions.is_active())
            .field("events", &self.events)
            .finish()
    }
}

impl MapCore {
    pub fn new(viewport: Viewport, queue: SharedAnimationQueue) -> Self {
        Self {
            id: MapId::next(),
            viewport,
            transitions: TransitionAnimator::new(),
            events: EventBus::new(),
            queue,
            outcomes: Vec::new(),
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Change the viewport and publish the events the change produced
    pub fn update<R>(&mut self, change: impl FnOnce(&mut Viewport) -> R) -> R {
        let result = change(&mut self.viewport);
        self.flush();
        result
    }

    fn flush(&mut self) {
        for event in self.viewport.take_events() {
            self.events.emit(event);
        }
    }

    pub fn emit(&mut self, event: MapEvent) -> Dispatch {
        self.events.emit(event)
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&MapEvent) -> EventResponse + 'static,
    {
        self.events.on(kind, callback);
    }

    pub fn off(&mut self, kind: EventKind) {
        self.events.off(kind);
    }

    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        self.events.drain()
    }

    pub fn animation_queue(&self) -> &SharedAnimationQueue {
        &self.queue
    }

    /// Queue a frame task for this map unless it is already pending
    pub fn schedule(&self, kind: FrameTaskKind) {
        self.queue
            .borrow_mut()
            .schedule_with(FrameTask::new(self.id, kind), ScheduleAction::KeepPosition);
    }

    pub fn unschedule(&self, kind: FrameTaskKind) {
        self.queue
            .borrow_mut()
            .schedule_with(FrameTask::new(self.id, kind), ScheduleAction::Remove);
    }

    fn set_animation_queue(&mut self, queue: SharedAnimationQueue) {
        if std::rc::Rc::ptr_eq(&queue, &self.queue) {
            return;
        }
        let pending = self.queue.borrow_mut().take_owned(self.id);
        if !pending.is_empty() {
            log::warn!(
                target: "mapview",
                "moving {} pending frame tasks to the new animation queue",
                pending.len()
            );
        }
        {
            let mut target = queue.borrow_mut();
            for task in pending {
                target.schedule_with(task, ScheduleAction::KeepPosition);
            }
        }
        self.queue = queue;
    }

    // ---------------------------------------------------------------------
    // transitions
    // ---------------------------------------------------------------------

    pub fn transition_active(&self) -> bool {
        self.transitions.is_active()
    }

    pub fn active_transition(&self) -> Option<&Transition> {
        self.transitions.transition()
    }

    /// Start a transition, or queue it behind the running one.
    ///
    /// With a `time` the first frame is applied immediately at that time;
    /// otherwise it runs on the next animation frame.
    pub fn transition(&mut self, request: TransitionRequest, time: Option<f64>) {
        let info = match self.transitions.begin(&self.viewport, request) {
            Some(transition) => transition.info(&self.viewport),
            None => return,
        };
        let dispatch = self.events.emit(MapEvent::TransitionStart(info));
        if dispatch.cancel_navigation {
            self.transitions.abort();
            self.events.emit(MapEvent::TransitionEnd(info));
        } else if dispatch.cancel_animation {
            self.transitions.skip_animation();
            self.advance_now(0.0);
        } else if let Some(time) = time {
            self.advance_now(time);
        } else {
            self.schedule(FrameTaskKind::Transition);
        }
    }

    /// Flag the running transition as cancelled; the cancel is reported on
    /// the next frame. Returns whether a transition was running.
    pub fn transition_cancel(&mut self, source: &str) -> bool {
        self.transitions.cancel(source)
    }

    fn advance_now(&mut self, time: f64) {
        if self.advance_transition(time) == FrameStatus::Continue {
            self.schedule(FrameTaskKind::Transition);
        }
    }

    /// Run one transition frame
    pub(crate) fn advance_transition(&mut self, time: f64) -> FrameStatus {
        let step = self.transitions.step(&mut self.viewport, time);
        self.flush();
        match step {
            TransitionStep::Idle => FrameStatus::Done,
            TransitionStep::Running => FrameStatus::Continue,
            TransitionStep::Cancelled {
                mut transition,
                next,
            } => {
                let info = transition.info(&self.viewport);
                self.events.emit(MapEvent::TransitionCancel {
                    info,
                    source: transition.cancel_source.clone(),
                });
                self.outcomes.push(transition.finish(false));
                if let Some(next) = next {
                    self.transition(next, Some(time));
                }
                FrameStatus::Done
            }
            TransitionStep::Finished {
                mut transition,
                next,
            } => {
                let info = transition.info(&self.viewport);
                self.events.emit(MapEvent::TransitionEnd(info));
                self.outcomes.push(transition.finish(next.is_some()));
                if let Some(next) = next {
                    self.transition(next, Some(time));
                }
                FrameStatus::Done
            }
        }
    }

    pub(crate) fn take_outcomes(&mut self) -> Vec<TransitionOutcome> {
        std::mem::take(&mut self.outcomes)
    }
}

/// A map: viewport state, events, transitions and optional interaction
pub struct Map {
    core: MapCore,
    interactor: Option<MapInteractor>,
    clock: FrameClock,
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("core", &self.core)
            .field("interactor", &self.interactor.is_some())
            .finish()
    }
}

impl Map {
    /// Create a map with its own animation queue and no interactor
    pub fn new(options: &MapOptions) -> Result<Self> {
        let viewport = Viewport::new(options)?;
        Ok(Self::from_parts(
            viewport,
            AnimationQueue::shared(),
            None,
        ))
    }

    pub(crate) fn from_parts(
        viewport: Viewport,
        queue: SharedAnimationQueue,
        interactor: Option<MapInteractor>,
    ) -> Self {
        let map = Self {
            core: MapCore::new(viewport, queue),
            interactor,
            clock: FrameClock::new(),
        };
        log::debug!(target: "mapview", "map {:?} created", map.core.id());
        map
    }

    pub fn id(&self) -> MapId {
        self.core.id()
    }

    pub fn core(&self) -> &MapCore {
        &self.core
    }

    pub fn viewport(&self) -> &Viewport {
        self.core.viewport()
    }

    /// Change the viewport directly; events it records are published
    pub fn update<R>(&mut self, change: impl FnOnce(&mut Viewport) -> R) -> R {
        self.core.update(change)
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    // ---------------------------------------------------------------------
    // events
    // ---------------------------------------------------------------------

    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&MapEvent) -> EventResponse + 'static,
    {
        self.core.on(kind, callback);
    }

    pub fn off(&mut self, kind: EventKind) {
        self.core.off(kind);
    }

    /// Events emitted since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        self.core.drain_events()
    }

    // ---------------------------------------------------------------------
    // navigation
    // ---------------------------------------------------------------------

    pub fn zoom(&self) -> f64 {
        self.viewport().zoom()
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.core.update(|vp| vp.set_zoom(zoom));
    }

    /// Zoom keeping the location under `display` in place
    pub fn zoom_around(&mut self, zoom: f64, display: Point) {
        self.core.update(|vp| vp.zoom_around(zoom, display));
    }

    pub fn zoom_to(&mut self, zoom: f64, origin: Option<Anchor>, ignore_discrete: bool) {
        self.core.update(|vp| vp.zoom_to(zoom, origin, ignore_discrete));
    }

    pub fn rotation(&self) -> f64 {
        self.viewport().rotation()
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.core.update(|vp| vp.set_rotation(rotation));
    }

    pub fn rotate_to(&mut self, rotation: f64, origin: Option<Anchor>) {
        self.core.update(|vp| vp.rotate_to(rotation, origin, false));
    }

    pub fn center(&self, crs: Option<Crs>) -> Point {
        self.viewport().center(crs)
    }

    pub fn set_center(&mut self, center: Point, crs: Option<Crs>) {
        self.core.update(|vp| vp.set_center(center, crs));
    }

    /// Pan by display pixels
    pub fn pan(&mut self, delta: Point) {
        self.core.update(|vp| vp.pan(delta));
    }

    pub fn size(&self) -> Size {
        self.viewport().size()
    }

    pub fn set_size(&mut self, size: Size) {
        self.core.update(|vp| vp.set_size(size));
    }

    pub fn bounds(&self, crs: Option<Crs>) -> Bounds {
        self.viewport().bounds(crs)
    }

    pub fn set_bounds(&mut self, bounds: Bounds, crs: Option<Crs>) -> Result<()> {
        self.core.update(|vp| vp.set_bounds(bounds, crs))
    }

    pub fn max_bounds(&self, crs: Option<Crs>) -> Bounds {
        self.viewport().max_bounds(crs)
    }

    pub fn set_max_bounds(&mut self, update: BoundsUpdate, crs: Option<Crs>) {
        self.core.update(|vp| vp.set_max_bounds(update, crs));
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.viewport().zoom_range()
    }

    pub fn set_zoom_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.core.update(|vp| vp.set_zoom_range(min, max, true));
    }

    pub fn set_clamp_bounds_x(&mut self, clamp: bool) {
        self.core.update(|vp| vp.set_clamp_bounds_x(clamp));
    }

    pub fn set_clamp_bounds_y(&mut self, clamp: bool) {
        self.core.update(|vp| vp.set_clamp_bounds_y(clamp));
    }

    pub fn set_clamp_zoom(&mut self, clamp: bool) {
        self.core.update(|vp| vp.set_clamp_zoom(clamp));
    }

    pub fn set_discrete_zoom(&mut self, discrete: bool) {
        self.core.update(|vp| vp.set_discrete_zoom(discrete));
    }

    pub fn set_allow_rotation(&mut self, policy: RotationPolicy) {
        self.core.update(|vp| vp.set_allow_rotation(policy));
    }

    pub fn set_gcs(&mut self, gcs: Crs) {
        self.core.update(|vp| vp.set_gcs(gcs));
    }

    pub fn set_ingcs(&mut self, ingcs: Crs) {
        self.core.update(|vp| vp.set_ingcs(ingcs));
    }

    pub fn set_projection(&mut self, projection: ProjectionType) {
        self.core.update(|vp| vp.set_projection(projection));
    }

    pub fn gcs_to_display(&self, point: Point, crs: Option<Crs>) -> Point {
        self.viewport().gcs_to_display(point, crs)
    }

    pub fn display_to_gcs(&self, point: Point, crs: Option<Crs>) -> Point {
        self.viewport().display_to_gcs(point, crs)
    }

    // ---------------------------------------------------------------------
    // transitions
    // ---------------------------------------------------------------------

    /// Animate to the requested view on the following frames
    pub fn transition(&mut self, request: TransitionRequest) {
        self.core.transition(request, None);
        self.settle();
    }

    /// Start a transition with its first frame at `time`
    pub fn transition_at(&mut self, request: TransitionRequest, time: f64) {
        self.core.transition(request, Some(time));
        self.settle();
    }

    pub fn transition_cancel(&mut self, source: &str) -> bool {
        self.core.transition_cancel(source)
    }

    pub fn active_transition(&self) -> Option<&Transition> {
        self.core.active_transition()
    }

    pub fn transition_info(&self) -> Option<TransitionInfo> {
        self.core
            .active_transition()
            .map(|transition| transition.info(self.core.viewport()))
    }

    // ---------------------------------------------------------------------
    // animation queue
    // ---------------------------------------------------------------------

    pub fn animation_queue(&self) -> SharedAnimationQueue {
        self.core.animation_queue().clone()
    }

    /// Share `queue` with other maps so their animations run in the same
    /// frame. Pending tasks of this map move to the new queue.
    pub fn set_animation_queue(&mut self, queue: SharedAnimationQueue) {
        self.core.set_animation_queue(queue);
    }

    /// Process this map's pending tasks at `time`.
    ///
    /// Tasks of other maps sharing the queue stay queued for their own
    /// frame; [`process_frame`] runs several maps in one tick.
    pub fn run_frame(&mut self, time: f64) -> usize {
        let queue = self.animation_queue();
        process_frame(&queue, time, &mut [self])
    }

    /// [`Map::run_frame`] at the current [`FrameClock`] time
    pub fn animate(&mut self) -> usize {
        let now = self.clock.now();
        self.run_frame(now)
    }

    // ---------------------------------------------------------------------
    // interaction
    // ---------------------------------------------------------------------

    pub fn interactor(&self) -> Option<&MapInteractor> {
        self.interactor.as_ref()
    }

    pub fn interactor_mut(&mut self) -> Option<&mut MapInteractor> {
        self.interactor.as_mut()
    }

    /// Attach or detach the interactor; returns the one it replaced
    pub fn set_interactor(&mut self, interactor: Option<MapInteractor>) -> Option<MapInteractor> {
        let previous = std::mem::replace(&mut self.interactor, interactor);
        if previous.is_some() && self.interactor.is_some() {
            log::warn!(target: "mapview", "replacing the interactor of map {:?}", self.id());
        }
        previous
    }

    /// Feed one input event to the interactor.
    ///
    /// Resize events are applied even without an interactor. Returns whether
    /// the event was consumed.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let handled = match (&mut self.interactor, event) {
            (Some(interactor), _) => interactor.handle_event(&mut self.core, event),
            (None, InputEvent::Resize { size }) => {
                let size = *size;
                self.core.update(|vp| vp.set_size(size));
                true
            }
            (None, _) => false,
        };
        self.settle();
        handled
    }

    /// Start momentum or spring-back for `action` at `time`
    pub fn spring_back(&mut self, initial_velocity: bool, action: NavAction, time: f64) {
        if let Some(interactor) = self.interactor.as_mut() {
            interactor.spring_back(&mut self.core, initial_velocity, action, time);
        }
        self.settle();
    }

    /// Hand transition outcomes to the interactor until none are left
    fn settle(&mut self) {
        loop {
            let outcomes = self.core.take_outcomes();
            if outcomes.is_empty() {
                break;
            }
            if let Some(interactor) = self.interactor.as_mut() {
                for outcome in &outcomes {
                    interactor.on_transition_outcome(&mut self.core, outcome);
                }
            }
        }
    }
}

impl FrameHandler for Map {
    fn id(&self) -> MapId {
        self.core.id()
    }

    fn run_frame_task(&mut self, kind: FrameTaskKind, time: f64) -> FrameStatus {
        let status = match kind {
            FrameTaskKind::Transition => self.core.advance_transition(time),
            FrameTaskKind::Momentum => match self.interactor.as_mut() {
                Some(interactor) => interactor.momentum_frame(&mut self.core, time),
                None => FrameStatus::Done,
            },
            FrameTaskKind::Timers => match self.interactor.as_mut() {
                Some(interactor) => interactor.timers_frame(&mut self.core, time),
                None => FrameStatus::Done,
            },
        };
        self.settle();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn map() -> Map {
        Map::new(&MapOptions {
            size: Size::new(400.0, 300.0),
            ..MapOptions::default()
        })
        .unwrap()
    }

    fn kinds(events: &[MapEvent]) -> Vec<EventKind> {
        events.iter().map(MapEvent::kind).collect()
    }

    #[test]
    fn test_map_ids_are_unique() {
        assert_ne!(map().id(), map().id());
    }

    #[test]
    fn test_invalid_size_fails() {
        let result = Map::new(&MapOptions {
            size: Size::new(0.0, 10.0),
            ..MapOptions::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_navigation_publishes_events() {
        let mut map = map();
        map.set_zoom(5.0);
        map.pan(Point::new(10.0, 0.0));
        let events = map.drain_events();
        assert!(kinds(&events).contains(&EventKind::Zoom));
        assert!(kinds(&events).contains(&EventKind::Pan));
        assert_eq!(map.zoom(), 5.0);
    }

    #[test]
    fn test_transition_runs_to_end() {
        let mut map = map();
        map.transition(TransitionRequest::new().zoom(6.0).duration(100.0));
        assert!(map.active_transition().is_some());
        map.run_frame(0.0);
        map.run_frame(50.0);
        assert!(map.zoom() > 4.0 && map.zoom() < 6.0);
        map.run_frame(100.0);
        assert!(map.active_transition().is_none());
        assert_eq!(map.zoom(), 6.0);
        let events = kinds(&map.drain_events());
        assert_eq!(events.first(), Some(&EventKind::TransitionStart));
        assert!(events.contains(&EventKind::TransitionEnd));
        assert!(map.animation_queue().borrow().is_empty());
    }

    #[test]
    fn test_cancel_navigation_skips_transition() {
        let mut map = map();
        map.on(EventKind::TransitionStart, |_| EventResponse::CancelNavigation);
        map.transition(TransitionRequest::new().zoom(6.0));
        assert!(map.active_transition().is_none());
        assert_eq!(map.zoom(), 4.0);
        let events = kinds(&map.drain_events());
        assert_eq!(events, vec![EventKind::TransitionStart, EventKind::TransitionEnd]);
    }

    #[test]
    fn test_cancel_animation_jumps_to_end() {
        let mut map = map();
        map.on(EventKind::TransitionStart, |_| EventResponse::CancelAnimation);
        map.transition(TransitionRequest::new().zoom(6.0).duration(500.0));
        assert!(map.active_transition().is_none());
        assert_eq!(map.zoom(), 6.0);
    }

    #[test]
    fn test_transition_cancel_reports_next_frame() {
        let mut map = map();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        map.transition(
            TransitionRequest::new()
                .zoom(8.0)
                .duration(1000.0)
                .on_done(move |outcome| *sink.borrow_mut() = Some(outcome.clone())),
        );
        map.run_frame(0.0);
        assert!(map.transition_cancel("test.cancel"));
        assert!(seen.borrow().is_none());
        map.run_frame(16.0);
        let outcome = seen.borrow().clone().unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.source, "test.cancel");
        assert!(map.active_transition().is_none());
        assert!(kinds(&map.drain_events()).contains(&EventKind::TransitionCancel));
    }

    #[test]
    fn test_shared_queue_migrates_tasks() {
        let mut first = map();
        let mut second = map();
        first.transition(TransitionRequest::new().zoom(5.0).duration(10.0));
        let shared = AnimationQueue::shared();
        first.set_animation_queue(shared.clone());
        second.set_animation_queue(shared.clone());
        second.transition(TransitionRequest::new().zoom(6.0).duration(10.0));
        assert_eq!(shared.borrow().len(), 2);

        process_frame(&shared, 0.0, &mut [&mut first, &mut second]);
        process_frame(&shared, 20.0, &mut [&mut first, &mut second]);
        assert_eq!(first.zoom(), 5.0);
        assert_eq!(second.zoom(), 6.0);
        assert!(shared.borrow().is_empty());
    }

    #[test]
    fn test_frame_clock_is_monotonic() {
        let clock = FrameClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a && a >= 0.0);
    }
}
