pub mod actions;
pub mod events;
pub mod gestures;
pub mod handler;
pub mod keyboard;
pub mod momentum;
pub mod throttle;

// Re-export the essential types
pub use actions::{ActionBinding, ActionBindingConfig, InputName, ModifierRule, NavAction, SelectionEvent};
pub use events::{
    EventBus, EventKind, EventResponse, InputEvent, KeyCode, KeyModifiers, MapEvent, MouseButton,
    MouseState, Selection, TouchEventType, TouchPoint, WheelDeltaMode,
};
pub use handler::{InteractionState, MapInteractor};
pub use keyboard::{KeyAction, KeyBinding};
