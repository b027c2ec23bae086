//! Prelude module for common mapview types and traits
//!
//! This module re-exports the most commonly used types for easy importing
//! with `use mapview::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, BoundsUpdate},
    builder::MapBuilder,
    config::{
        ClickOptions, InteractionProfile, InteractorOptions, KeyboardOptions, MapOptions,
        MomentumOptions, SpringOptions, ZoomAnimationOptions, ZoomRotateOptions,
    },
    geo::{Point, Size},
    map::{FrameClock, Map, MapId},
    projection::Crs,
    viewport::{Anchor, ClampMode, RotationPolicy, Viewport},
};

pub use crate::input::{
    actions::{ActionBinding, InputName, ModifierRule, NavAction, SelectionEvent},
    events::{
        EventKind, EventResponse, InputEvent, KeyCode, KeyModifiers, MapEvent, MouseButton,
        TouchEventType, TouchPoint, WheelDeltaMode,
    },
    handler::{InteractionState, MapInteractor},
    keyboard::KeyAction,
};

pub use crate::animation::{
    interpolation::EasingFunction,
    scheduler::{AnimationQueue, FrameHandler, SharedAnimationQueue},
    transitions::{TransitionOutcome, TransitionRequest, TransitionTag},
};

pub use crate::rendering::camera::{Camera, ProjectionType};

pub use crate::{Error as MapError, Result};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
