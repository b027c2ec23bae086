use mapview::input::events::EventKind;
use mapview::prelude::*;

/// Integration tests driving a map through its input events
/// These tests feed the same event sequences a host window would
#[cfg(test)]
mod interaction_tests {
    use super::*;

    fn map(width: f64, height: f64, zoom: f64) -> Map {
        MapBuilder::new()
            .with_size(width, height)
            .with_zoom(zoom)
            .build()
            .unwrap()
    }

    fn mouse_down(x: f64, y: f64, button: MouseButton, modifiers: KeyModifiers, time: f64) -> InputEvent {
        InputEvent::MouseDown {
            position: Point::new(x, y),
            button,
            modifiers,
            time,
        }
    }

    fn mouse_move(x: f64, y: f64, time: f64) -> InputEvent {
        InputEvent::MouseMove {
            position: Point::new(x, y),
            modifiers: KeyModifiers::default(),
            time,
        }
    }

    fn mouse_up(x: f64, y: f64, button: MouseButton, time: f64) -> InputEvent {
        InputEvent::MouseUp {
            position: Point::new(x, y),
            button,
            modifiers: KeyModifiers::default(),
            time,
        }
    }

    fn wheel(dy: f64, time: f64) -> InputEvent {
        InputEvent::Scroll {
            delta: Point::new(0.0, dy),
            mode: WheelDeltaMode::Pixel,
            position: Point::new(256.0, 256.0),
            modifiers: KeyModifiers::default(),
            time,
        }
    }

    fn kinds(map: &mut Map) -> Vec<EventKind> {
        map.drain_events().iter().map(MapEvent::kind).collect()
    }

    /// Zooming around a pixel keeps the location under it fixed
    #[test]
    fn test_zoom_around_cursor() {
        let mut map = map(512.0, 512.0, 4.0);
        let pixel = Point::new(400.0, 100.0);
        let before = map.display_to_gcs(pixel, None);

        map.zoom_around(5.0, pixel);

        assert!((map.zoom() - 5.0).abs() < 1e-9);
        let after = map.display_to_gcs(pixel, None);
        assert!(after.approx_eq(&before, 1e-6), "{before:?} moved to {after:?}");
    }

    /// A shift-drag rectangle covering half the view zooms in one level
    #[test]
    fn test_selection_zoom() {
        let mut map = map(400.0, 300.0, 2.0);
        let target = map.display_to_gcs(Point::new(200.0, 150.0), None);
        let shift = KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        };

        map.handle_input(&mouse_down(100.0, 75.0, MouseButton::Left, shift, 0.0));
        map.handle_input(&mouse_move(300.0, 225.0, 100.0));
        map.handle_input(&mouse_up(300.0, 225.0, MouseButton::Left, 200.0));

        assert!((map.zoom() - 3.0).abs() < 1e-9);
        assert!(map.center(None).approx_eq(&target, 1e-6));
        let events = kinds(&mut map);
        assert!(events.contains(&EventKind::BrushEnd));
        assert!(events.contains(&EventKind::ZoomSelect));
    }

    /// A quick drag keeps gliding after release and then settles
    #[test]
    fn test_drag_release_glides_to_rest() {
        let mut map = map(512.0, 512.0, 4.0);
        map.handle_input(&mouse_down(100.0, 200.0, MouseButton::Left, KeyModifiers::default(), 0.0));
        map.handle_input(&mouse_move(150.0, 200.0, 100.0));
        map.handle_input(&mouse_move(200.0, 200.0, 140.0));
        map.handle_input(&mouse_up(200.0, 200.0, MouseButton::Left, 150.0));

        let released = map.center(None);
        assert!(map.interactor().is_some_and(|i| i.state().is_momentum()));

        let mut time = 150.0;
        for _ in 0..200 {
            time += 16.0;
            map.run_frame(time);
            if map.interactor().is_some_and(|i| i.state().is_idle()) {
                break;
            }
        }
        assert!(map.interactor().is_some_and(|i| i.state().is_idle()));
        // dragging right moves the view west
        assert!(map.center(None).x < released.x);
    }

    /// Momentum decays below the minimum speed and returns to idle
    #[test]
    fn test_momentum_decay() {
        let mut map = map(512.0, 512.0, 4.0);
        map.handle_input(&mouse_down(100.0, 200.0, MouseButton::Left, KeyModifiers::default(), 0.0));
        map.handle_input(&mouse_move(132.0, 200.0, 16.0));
        map.handle_input(&mouse_up(132.0, 200.0, MouseButton::Left, 16.0));
        let velocity = map.interactor().map(|i| i.mouse().velocity).unwrap();
        assert_eq!(velocity, Point::new(2.0, 0.0));

        let min_speed = map.interactor().map(|i| i.options().momentum.min_speed).unwrap();
        for frame in 1..=50 {
            map.run_frame(16.0 + 16.0 * f64::from(frame));
        }
        let interactor = map.interactor().unwrap();
        assert!(interactor.state().is_idle());
        assert!(interactor.mouse().velocity.length() < min_speed * 2.0);
    }

    /// Wheel zoom animates to the next level and later wheels start from there
    #[test]
    fn test_wheel_zoom_animates() {
        let mut map = map(512.0, 512.0, 4.0);
        map.handle_input(&wheel(-120.0, 0.0));
        assert_eq!(map.zoom(), 4.0);

        map.run_frame(0.0);
        map.run_frame(250.0);
        assert!(map.zoom() > 4.0 && map.zoom() < 5.0);
        map.run_frame(600.0);
        assert!((map.zoom() - 5.0).abs() < 1e-9);
        assert!(kinds(&mut map).contains(&EventKind::TransitionEnd));

        map.handle_input(&wheel(-120.0, 1000.0));
        for time in [1000.0, 1200.0, 1600.0] {
            map.run_frame(time);
        }
        assert!((map.zoom() - 6.0).abs() < 1e-9);
    }

    /// A second wheel during the animation retargets it
    #[test]
    fn test_wheel_during_animation_accumulates() {
        let mut map = map(512.0, 512.0, 4.0);
        map.handle_input(&wheel(-120.0, 0.0));
        map.run_frame(0.0);
        map.run_frame(100.0);
        map.handle_input(&wheel(-120.0, 150.0));

        let mut time = 150.0;
        while time < 2000.0 {
            time += 16.0;
            map.run_frame(time);
        }
        assert!((map.zoom() - 6.0).abs() < 1e-9);
        assert!(kinds(&mut map).contains(&EventKind::TransitionCancel));
    }

    /// Bindings added at the front win over the defaults
    #[test]
    fn test_action_priority() {
        let mut map = map(400.0, 300.0, 4.0);
        if let Some(interactor) = map.interactor_mut() {
            interactor.add_action(
                ActionBinding::new(NavAction::Rotate, InputName::Left).named("rotate first"),
                false,
            );
        }
        map.handle_input(&mouse_down(300.0, 150.0, MouseButton::Left, KeyModifiers::default(), 0.0));
        assert_eq!(
            map.interactor().and_then(|i| i.state().action()),
            Some(NavAction::Rotate)
        );
        map.handle_input(&mouse_move(200.0, 250.0, 100.0));
        assert!(map.rotation() > 0.0);
    }

    /// A static map reports clicks without navigating
    #[test]
    fn test_static_map_reports_clicks() {
        let mut map = MapBuilder::static_map(Point::default(), 3.0, Size::new(320.0, 240.0))
            .build()
            .unwrap();
        let center = map.center(None);
        map.handle_input(&mouse_down(20.0, 20.0, MouseButton::Left, KeyModifiers::default(), 0.0));
        map.handle_input(&mouse_up(20.0, 20.0, MouseButton::Left, 40.0));
        map.handle_input(&wheel(-120.0, 100.0));

        assert_eq!(map.center(None), center);
        assert_eq!(map.zoom(), 3.0);
        let events = kinds(&mut map);
        assert!(events.contains(&EventKind::MouseClick));
        assert!(!events.contains(&EventKind::Zoom));
    }

    /// Arrow keys pan by the configured step
    #[test]
    fn test_keyboard_pan() {
        let mut map = map(512.0, 512.0, 4.0);
        let before = map.gcs_to_display(Point::default(), None);
        map.handle_input(&InputEvent::KeyPress {
            key: KeyCode::ArrowLeft,
            modifiers: KeyModifiers {
                shift: true,
                ..KeyModifiers::default()
            },
            time: 0.0,
        });
        let after = map.gcs_to_display(Point::default(), None);
        assert!((after.x - before.x - 10.0).abs() < 1e-6);
        assert!((after.y - before.y).abs() < 1e-6);
    }

    /// Resizing keeps the center and reports the new size
    #[test]
    fn test_resize() {
        let mut map = map(512.0, 512.0, 4.0);
        let center = map.center(None);
        map.handle_input(&InputEvent::Resize {
            size: Size::new(800.0, 600.0),
        });
        assert_eq!(map.size(), Size::new(800.0, 600.0));
        assert!(map.center(None).approx_eq(&center, 1e-6));
        assert!(kinds(&mut map).contains(&EventKind::Resize));
    }
}
