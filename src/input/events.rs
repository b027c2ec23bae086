use crate::core::constants::MAX_QUEUED_EVENTS;
use crate::core::geo::{Point, Size};
use crate::input::actions::NavAction;
use crate::input::keyboard::KeyAction;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Normalized input delivered by the platform adapter.
///
/// Positions are display pixels relative to the top-left corner of the map,
/// times are milliseconds on the same clock as animation frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A mouse button was pressed
    MouseDown {
        position: Point,
        button: MouseButton,
        modifiers: KeyModifiers,
        time: f64,
    },
    /// Mouse move, with or without a button held
    MouseMove {
        position: Point,
        modifiers: KeyModifiers,
        time: f64,
    },
    /// A mouse button was released
    MouseUp {
        position: Point,
        button: MouseButton,
        modifiers: KeyModifiers,
        time: f64,
    },
    /// Scroll wheel or trackpad scroll
    Scroll {
        delta: Point,
        mode: WheelDeltaMode,
        position: Point,
        modifiers: KeyModifiers,
        time: f64,
    },
    /// Raw touch points (multi-touch)
    Touch {
        event_type: TouchEventType,
        touches: Vec<TouchPoint>,
        time: f64,
    },
    /// A touch gesture already reduced to center, scale and rotation
    Gesture {
        phase: TouchEventType,
        center: Point,
        scale: f64,
        rotation: f64,
        pointers: usize,
        time: f64,
    },
    /// Keyboard input
    KeyPress {
        key: KeyCode,
        modifiers: KeyModifiers,
        time: f64,
    },
    /// Viewport/window resize
    Resize { size: Size },
}

/// Types of touch events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchEventType {
    Start,
    Move,
    End,
    Cancel,
}

/// Individual touch point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: u64,
    pub position: Point,
}

impl TouchPoint {
    pub fn new(id: u64, position: Point) -> Self {
        Self { id, position }
    }
}

/// Unit of a wheel delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WheelDeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

/// Keyboard key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Plus,
    Minus,
    Home,
    End,
    PageUp,
    PageDown,
    Escape,
    Enter,
    Space,
    Tab,
    Digit(u8),
    Char(char),
    Other(u32),
}

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Mouse button types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Buttons currently held down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseButtons {
    pub fn set(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.left = pressed,
            MouseButton::Right => self.right = pressed,
            MouseButton::Middle => self.middle = pressed,
            MouseButton::Other(_) => {}
        }
    }

    pub fn any(&self) -> bool {
        self.left || self.right || self.middle
    }
}

impl InputEvent {
    /// Gets the primary position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::MouseDown { position, .. }
            | InputEvent::MouseMove { position, .. }
            | InputEvent::MouseUp { position, .. }
            | InputEvent::Scroll { position, .. } => Some(*position),
            InputEvent::Touch { touches, .. } => touches.first().map(|t| t.position),
            InputEvent::Gesture { center, .. } => Some(*center),
            _ => None,
        }
    }

    /// Timestamp in milliseconds; resize events carry none
    pub fn time(&self) -> Option<f64> {
        match self {
            InputEvent::MouseDown { time, .. }
            | InputEvent::MouseMove { time, .. }
            | InputEvent::MouseUp { time, .. }
            | InputEvent::Scroll { time, .. }
            | InputEvent::Touch { time, .. }
            | InputEvent::Gesture { time, .. }
            | InputEvent::KeyPress { time, .. } => Some(*time),
            InputEvent::Resize { .. } => None,
        }
    }

    /// Checks if this is a mouse/pointer event
    pub fn is_pointer_event(&self) -> bool {
        matches!(
            self,
            InputEvent::MouseDown { .. }
                | InputEvent::MouseMove { .. }
                | InputEvent::MouseUp { .. }
                | InputEvent::Scroll { .. }
        )
    }

    /// Checks if this is a touch event
    pub fn is_touch_event(&self) -> bool {
        matches!(self, InputEvent::Touch { .. } | InputEvent::Gesture { .. })
    }

    /// Checks if this is a keyboard event
    pub fn is_keyboard_event(&self) -> bool {
        matches!(self, InputEvent::KeyPress { .. })
    }
}

/// Snapshot of the pointer as the interactor last saw it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MouseState {
    /// Display position in pixels
    pub position: Point,
    /// Position in the interface GCS
    pub geo: Point,
    /// Position in the map GCS
    pub map_gcs: Point,
    pub buttons: MouseButtons,
    pub modifiers: KeyModifiers,
    pub time: f64,
    /// Time between the last two updates
    pub delta_time: f64,
    /// Display pixels per millisecond
    pub velocity: Point,
}

/// Public view of the viewport attached to navigation events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Center in the interface GCS
    pub center: Point,
    pub zoom: f64,
    pub rotation: f64,
}

/// Four corners of a selection rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Corners {
    pub upper_left: Point,
    pub upper_right: Point,
    pub lower_left: Point,
    pub lower_right: Point,
}

/// A rectangle dragged on the map, in display pixels and in the interface GCS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub display: Corners,
    pub gcs: Corners,
    pub mouse: MouseState,
    pub origin: MouseState,
}

/// Start and end view of a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub start: ViewState,
    pub end: ViewState,
    pub duration: f64,
}

/// Events emitted by a map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The view was panned by `screen_delta` pixels
    Pan { screen_delta: Point, view: ViewState },
    Zoom {
        zoom: f64,
        screen_position: Option<Point>,
        view: ViewState,
    },
    Rotate {
        rotation: f64,
        screen_position: Option<Point>,
        view: ViewState,
    },
    Resize { size: Size },
    TransitionStart(TransitionInfo),
    TransitionEnd(TransitionInfo),
    TransitionCancel { info: TransitionInfo, source: String },
    BrushStart(Selection),
    Brush(Selection),
    BrushEnd(Selection),
    Select(Selection),
    ZoomSelect(Selection),
    UnzoomSelect(Selection),
    ActionDown { action: NavAction, mouse: MouseState },
    ActionMove {
        action: NavAction,
        mouse: MouseState,
        delta: Point,
    },
    ActionUp { action: NavAction, mouse: MouseState },
    ActionWheel {
        action: NavAction,
        mouse: MouseState,
        scroll: Point,
    },
    ActionSelection {
        action: NavAction,
        selection: Selection,
    },
    /// Sent before a keyboard action runs; cancelling it skips the action
    KeyAction { action: KeyAction, factor: u8 },
    MouseMove(MouseState),
    MouseClick(MouseState),
}

/// Discriminant of [`MapEvent`], used to register listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Pan,
    Zoom,
    Rotate,
    Resize,
    TransitionStart,
    TransitionEnd,
    TransitionCancel,
    BrushStart,
    Brush,
    BrushEnd,
    Select,
    ZoomSelect,
    UnzoomSelect,
    ActionDown,
    ActionMove,
    ActionUp,
    ActionWheel,
    ActionSelection,
    KeyAction,
    MouseMove,
    MouseClick,
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::Pan { .. } => EventKind::Pan,
            MapEvent::Zoom { .. } => EventKind::Zoom,
            MapEvent::Rotate { .. } => EventKind::Rotate,
            MapEvent::Resize { .. } => EventKind::Resize,
            MapEvent::TransitionStart(_) => EventKind::TransitionStart,
            MapEvent::TransitionEnd(_) => EventKind::TransitionEnd,
            MapEvent::TransitionCancel { .. } => EventKind::TransitionCancel,
            MapEvent::BrushStart(_) => EventKind::BrushStart,
            MapEvent::Brush(_) => EventKind::Brush,
            MapEvent::BrushEnd(_) => EventKind::BrushEnd,
            MapEvent::Select(_) => EventKind::Select,
            MapEvent::ZoomSelect(_) => EventKind::ZoomSelect,
            MapEvent::UnzoomSelect(_) => EventKind::UnzoomSelect,
            MapEvent::ActionDown { .. } => EventKind::ActionDown,
            MapEvent::ActionMove { .. } => EventKind::ActionMove,
            MapEvent::ActionUp { .. } => EventKind::ActionUp,
            MapEvent::ActionWheel { .. } => EventKind::ActionWheel,
            MapEvent::ActionSelection { .. } => EventKind::ActionSelection,
            MapEvent::KeyAction { .. } => EventKind::KeyAction,
            MapEvent::MouseMove(_) => EventKind::MouseMove,
            MapEvent::MouseClick(_) => EventKind::MouseClick,
        }
    }

    /// Checks if this event reports a change of the view
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            MapEvent::Pan { .. } | MapEvent::Zoom { .. } | MapEvent::Rotate { .. } | MapEvent::Resize { .. }
        )
    }
}

/// What a listener asks the dispatcher to do after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventResponse {
    #[default]
    Continue,
    /// Skip the remaining listeners
    StopPropagation,
    /// Jump a starting transition straight to its end
    CancelAnimation,
    /// Drop a starting transition, or skip a keyboard action
    CancelNavigation,
}

/// Combined outcome of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    pub stopped: bool,
    pub cancel_animation: bool,
    pub cancel_navigation: bool,
}

impl Dispatch {
    fn record(&mut self, response: EventResponse) {
        match response {
            EventResponse::Continue => {}
            EventResponse::StopPropagation => self.stopped = true,
            EventResponse::CancelAnimation => self.cancel_animation = true,
            EventResponse::CancelNavigation => self.cancel_navigation = true,
        }
    }
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&MapEvent) -> EventResponse>;

/// Typed listener registry and bounded event queue of a map
#[derive(Default)]
pub struct EventBus {
    listeners: FxHashMap<EventKind, Vec<EventCallback>>,
    queue: VecDeque<MapEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.values().map(Vec::len).sum::<usize>())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&MapEvent) -> EventResponse + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(callback));
    }

    /// Remove every listener of one kind
    pub fn off(&mut self, kind: EventKind) {
        self.listeners.remove(&kind);
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners.get(&kind).is_some_and(|list| !list.is_empty())
    }

    /// Run the listeners registered for the event and queue it for polling
    pub fn emit(&mut self, event: MapEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if let Some(listeners) = self.listeners.get(&event.kind()) {
            for listener in listeners {
                dispatch.record(listener(&event));
                if dispatch.stopped {
                    break;
                }
            }
        }
        if self.queue.len() >= MAX_QUEUED_EVENTS {
            self.queue.pop_front();
        }
        self.queue.push_back(event);
        dispatch
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<MapEvent> {
        self.queue.drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn view() -> ViewState {
        ViewState {
            center: Point::new(0.0, 0.0),
            zoom: 4.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_input_event_position() {
        let down = InputEvent::MouseDown {
            position: Point::new(100.0, 200.0),
            button: MouseButton::Left,
            modifiers: KeyModifiers::default(),
            time: 5.0,
        };
        assert_eq!(down.position(), Some(Point::new(100.0, 200.0)));
        assert_eq!(down.time(), Some(5.0));

        let resize = InputEvent::Resize {
            size: Size::new(10.0, 10.0),
        };
        assert_eq!(resize.position(), None);
        assert_eq!(resize.time(), None);
    }

    #[test]
    fn test_event_type_checks() {
        let key_press = InputEvent::KeyPress {
            key: KeyCode::Space,
            modifiers: KeyModifiers::default(),
            time: 0.0,
        };
        assert!(!key_press.is_pointer_event());
        assert!(!key_press.is_touch_event());
        assert!(key_press.is_keyboard_event());

        let touch = InputEvent::Touch {
            event_type: TouchEventType::Start,
            touches: vec![TouchPoint::new(1, Point::new(3.0, 4.0))],
            time: 0.0,
        };
        assert!(touch.is_touch_event());
        assert_eq!(touch.position(), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_mouse_buttons() {
        let mut buttons = MouseButtons::default();
        assert!(!buttons.any());
        buttons.set(MouseButton::Right, true);
        assert!(buttons.right && buttons.any());
        buttons.set(MouseButton::Other(7), true);
        buttons.set(MouseButton::Right, false);
        assert!(!buttons.any());
    }

    #[test]
    fn test_stop_propagation() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let first = calls.clone();
        bus.on(EventKind::Zoom, move |_| {
            first.borrow_mut().push(1);
            EventResponse::StopPropagation
        });
        let second = calls.clone();
        bus.on(EventKind::Zoom, move |_| {
            second.borrow_mut().push(2);
            EventResponse::Continue
        });

        let dispatch = bus.emit(MapEvent::Zoom {
            zoom: 4.0,
            screen_position: None,
            view: view(),
        });
        assert!(dispatch.stopped);
        assert_eq!(*calls.borrow(), vec![1]);
        assert_eq!(bus.queued(), 1);
    }

    #[test]
    fn test_responses_are_folded() {
        let mut bus = EventBus::new();
        bus.on(EventKind::TransitionStart, |_| EventResponse::CancelAnimation);
        bus.on(EventKind::TransitionStart, |_| EventResponse::CancelNavigation);
        let info = TransitionInfo {
            start: view(),
            end: view(),
            duration: 100.0,
        };
        let dispatch = bus.emit(MapEvent::TransitionStart(info));
        assert!(dispatch.cancel_animation);
        assert!(dispatch.cancel_navigation);
        assert!(!dispatch.stopped);
    }

    #[test]
    fn test_queue_is_bounded() {
        let mut bus = EventBus::new();
        for i in 0..(MAX_QUEUED_EVENTS + 5) {
            bus.emit(MapEvent::Resize {
                size: Size::new(i as f64, 1.0),
            });
        }
        let events = bus.drain();
        assert_eq!(events.len(), MAX_QUEUED_EVENTS);
        assert_eq!(events[0], MapEvent::Resize { size: Size::new(5.0, 1.0) });
        assert_eq!(bus.queued(), 0);
    }
}
