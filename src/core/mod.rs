pub mod bounds;
pub mod builder;
pub mod config;
pub mod constants;
pub mod geo;
pub mod map;
pub mod projection;
pub mod viewport;

pub use bounds::{Bounds, BoundsUpdate};
pub use builder::MapBuilder;
pub use config::{InteractionProfile, InteractorOptions, MapOptions};
pub use geo::{Point, Size};
pub use map::{FrameClock, Map, MapCore, MapId};
pub use projection::Crs;
pub use viewport::{Anchor, ClampMode, RotationPolicy, Viewport, ZoomRange};
