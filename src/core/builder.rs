//! Map builder for fluent configuration
//!
//! Collects viewport options, an interaction profile and an optional shared
//! animation queue, then assembles a [`Map`].

use crate::{
    animation::scheduler::{AnimationQueue, SharedAnimationQueue},
    core::{
        config::{InteractionProfile, InteractorOptions, MapOptions},
        geo::{Point, Size},
        map::Map,
        viewport::Viewport,
    },
    input::handler::MapInteractor,
    Result,
};

/// Builder for creating and configuring Map instances
#[derive(Debug, Clone)]
pub struct MapBuilder {
    options: MapOptions,
    /// `None` builds a map without an interactor
    interaction: Option<InteractionProfile>,
    queue: Option<SharedAnimationQueue>,
}

impl MapBuilder {
    /// Default viewport with desktop interaction
    pub fn new() -> Self {
        Self {
            options: MapOptions::default(),
            interaction: Some(InteractionProfile::Desktop),
            queue: None,
        }
    }

    /// Replace all viewport options
    pub fn with_options(mut self, options: MapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.options.size = Size::new(width, height);
        self
    }

    /// Initial center in the interface projection
    pub fn with_center(mut self, center: Point) -> Self {
        self.options.center = Some(center);
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.options.zoom = zoom;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.options.min_zoom = min_zoom;
        self.options.max_zoom = max_zoom;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.options.rotation = rotation;
        self
    }

    pub fn with_discrete_zoom(mut self, discrete: bool) -> Self {
        self.options.discrete_zoom = discrete;
        self
    }

    pub fn with_interaction(mut self, profile: InteractionProfile) -> Self {
        self.interaction = Some(profile);
        self
    }

    pub fn with_interactor_options(self, options: InteractorOptions) -> Self {
        self.with_interaction(InteractionProfile::Custom(options))
    }

    /// Build a map that only moves through its API
    pub fn without_interaction(mut self) -> Self {
        self.interaction = None;
        self
    }

    /// Share frame scheduling with other maps
    pub fn with_animation_queue(mut self, queue: SharedAnimationQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Build the map with the configured options
    pub fn build(self) -> Result<Map> {
        let viewport = Viewport::new(&self.options)?;
        let queue = self.queue.unwrap_or_else(AnimationQueue::shared);
        let interactor = self.interaction.as_ref().map(MapInteractor::from_profile);
        Ok(Map::from_parts(viewport, queue, interactor))
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience methods for common map configurations
impl MapBuilder {
    /// Mouse, wheel and keyboard navigation
    pub fn desktop_map(center: Point, zoom: f64, size: Size) -> Self {
        Self::new()
            .with_center(center)
            .with_zoom(zoom)
            .with_size(size.width, size.height)
            .with_interaction(InteractionProfile::Desktop)
    }

    /// Touch navigation with quicker animations and no keyboard
    pub fn mobile_map(center: Point, zoom: f64, size: Size) -> Self {
        Self::desktop_map(center, zoom, size).with_interaction(InteractionProfile::Touch)
    }

    /// A map that reports pointer events but never navigates from input
    pub fn static_map(center: Point, zoom: f64, size: Size) -> Self {
        Self::desktop_map(center, zoom, size).with_interaction(InteractionProfile::Static)
    }
}
