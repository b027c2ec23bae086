pub mod camera;

pub use camera::{Camera, CameraEvent, CssTransform, ProjectionType};
