//! # mapview
//!
//! Viewport and interaction engine for interactive 2D maps.
//!
//! The crate keeps a camera over a projected world and converts between
//! geographic, world and display coordinates. On top of that it provides
//! navigation (pan, zoom, rotate, fit to bounds) with the map's clamping
//! rules, animated transitions driven by a shared frame queue, and an
//! interactor that turns mouse, wheel, touch and keyboard input into
//! navigation with throttling, momentum and selection rectangles.
//!
//! Nothing here draws. Hosts feed [`InputEvent`]s and frame timestamps in
//! and read the camera and the emitted [`MapEvent`]s back out.

pub mod animation;
pub mod core;
pub mod input;
pub mod prelude;
pub mod rendering;

pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::{Bounds, BoundsUpdate},
    builder::MapBuilder,
    config::{InteractionProfile, InteractorOptions, MapOptions},
    geo::{Point, Size},
    map::Map,
    projection::Crs,
    viewport::Viewport,
};

pub use input::{
    events::{InputEvent, MapEvent},
    handler::MapInteractor,
};

pub use animation::transitions::{Transition, TransitionRequest};

pub use rendering::camera::Camera;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Install `env_logger` as the log backend. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    static INIT: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();
    INIT.get_or_init(|| {
        let _ = env_logger::Builder::from_default_env()
            .filter_module("mapview", log::LevelFilter::Debug)
            .try_init();
    });
}
