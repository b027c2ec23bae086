pub mod interpolation;
pub mod scheduler;
pub mod transitions;

// Re-export commonly used types and functions for convenience
pub use interpolation::{height_to_zoom, zoom_to_height, EasingFunction, Interpolation};
pub use scheduler::{
    process_frame, AnimationQueue, FrameHandler, FrameStatus, FrameTask, FrameTaskKind,
    ScheduleAction, SharedAnimationQueue,
};
pub use transitions::{
    Transition, TransitionAnimator, TransitionOutcome, TransitionRequest, TransitionStep,
    TransitionTag,
};
