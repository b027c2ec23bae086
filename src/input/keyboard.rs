//! Keyboard navigation.
//!
//! Keys map to named actions such as `zoom.in` or `pan.left`. Shift and
//! shift+ctrl select larger movement factors.

use crate::core::config::KeyboardOptions;
use crate::core::geo::{Point, Size};
use crate::input::events::{KeyCode, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A keyboard navigation action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyAction {
    ZoomIn,
    ZoomOut,
    /// Jump to an absolute zoom level
    ZoomTo(f64),
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    RotateCw,
    RotateCcw,
    /// Reset the rotation to zero
    RotateReset,
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::ZoomIn => f.write_str("zoom.in"),
            KeyAction::ZoomOut => f.write_str("zoom.out"),
            KeyAction::ZoomTo(zoom) => write!(f, "zoom.{zoom}"),
            KeyAction::PanLeft => f.write_str("pan.left"),
            KeyAction::PanRight => f.write_str("pan.right"),
            KeyAction::PanUp => f.write_str("pan.up"),
            KeyAction::PanDown => f.write_str("pan.down"),
            KeyAction::RotateCw => f.write_str("rotate.cw"),
            KeyAction::RotateCcw => f.write_str("rotate.ccw"),
            KeyAction::RotateReset => f.write_str("rotate.0"),
        }
    }
}

impl FromStr for KeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "zoom.in" => KeyAction::ZoomIn,
            "zoom.out" => KeyAction::ZoomOut,
            "pan.left" => KeyAction::PanLeft,
            "pan.right" => KeyAction::PanRight,
            "pan.up" => KeyAction::PanUp,
            "pan.down" => KeyAction::PanDown,
            "rotate.cw" => KeyAction::RotateCw,
            "rotate.ccw" => KeyAction::RotateCcw,
            "rotate.0" => KeyAction::RotateReset,
            other => match other.strip_prefix("zoom.").map(str::parse::<f64>) {
                Some(Ok(zoom)) if zoom.is_finite() => KeyAction::ZoomTo(zoom),
                _ => return Err(format!("unknown key action {other:?}")),
            },
        };
        Ok(action)
    }
}

impl TryFrom<String> for KeyAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyAction> for String {
    fn from(action: KeyAction) -> Self {
        action.to_string()
    }
}

/// A key and the action it triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: KeyCode,
    pub action: KeyAction,
}

impl KeyBinding {
    pub fn new(key: KeyCode, action: KeyAction) -> Self {
        Self { key, action }
    }
}

pub fn default_key_bindings() -> Vec<KeyBinding> {
    let mut bindings = vec![
        KeyBinding::new(KeyCode::Plus, KeyAction::ZoomIn),
        KeyBinding::new(KeyCode::Char('='), KeyAction::ZoomIn),
        KeyBinding::new(KeyCode::Minus, KeyAction::ZoomOut),
        KeyBinding::new(KeyCode::Char('_'), KeyAction::ZoomOut),
        KeyBinding::new(KeyCode::ArrowLeft, KeyAction::PanLeft),
        KeyBinding::new(KeyCode::ArrowRight, KeyAction::PanRight),
        KeyBinding::new(KeyCode::ArrowUp, KeyAction::PanUp),
        KeyBinding::new(KeyCode::ArrowDown, KeyAction::PanDown),
        KeyBinding::new(KeyCode::Char('<'), KeyAction::RotateCcw),
        KeyBinding::new(KeyCode::Char('.'), KeyAction::RotateCcw),
        KeyBinding::new(KeyCode::Char('>'), KeyAction::RotateCw),
        KeyBinding::new(KeyCode::Char(','), KeyAction::RotateCw),
        KeyBinding::new(KeyCode::Digit(0), KeyAction::RotateReset),
    ];
    // 1..7 jump to zoom 0, 3, .., 18
    for digit in 1..=7u8 {
        bindings.push(KeyBinding::new(
            KeyCode::Digit(digit),
            KeyAction::ZoomTo(f64::from(digit - 1) * 3.0),
        ));
    }
    bindings
}

/// Movement factor selected by the held modifiers: none is 0, shift is 1
/// and shift+ctrl is 2. Other combinations are not navigation keys.
pub fn movement_factor(modifiers: &KeyModifiers) -> Option<u8> {
    if modifiers.alt || modifiers.meta {
        return None;
    }
    match (modifiers.shift, modifiers.ctrl) {
        (false, false) => Some(0),
        (true, false) => Some(1),
        (true, true) => Some(2),
        (false, true) => None,
    }
}

/// Action and factor for a key press, if it is bound
pub fn resolve_key(
    bindings: &[KeyBinding],
    key: KeyCode,
    modifiers: &KeyModifiers,
) -> Option<(KeyAction, u8)> {
    let factor = movement_factor(modifiers)?;
    bindings
        .iter()
        .find(|binding| binding.key == key)
        .map(|binding| (binding.action, factor))
}

/// What a key action does to the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyEffect {
    /// Set the zoom level
    Zoom(f64),
    /// Pan by display pixels
    Pan(Point),
    /// Set the rotation
    Rotate(f64),
}

/// Translate an action into a view change for the current zoom and rotation
pub fn key_effect(
    action: KeyAction,
    factor: u8,
    options: &KeyboardOptions,
    size: Size,
    zoom: f64,
    rotation: f64,
) -> KeyEffect {
    let idx = usize::from(factor.min(2));
    let pan = |horizontal: bool| {
        if idx == 2 {
            if horizontal {
                size.width / 2.0
            } else {
                size.height / 2.0
            }
        } else {
            options.pan_steps[idx]
        }
    };
    match action {
        KeyAction::ZoomIn => KeyEffect::Zoom(zoom + options.zoom_steps[idx]),
        KeyAction::ZoomOut => KeyEffect::Zoom(zoom - options.zoom_steps[idx]),
        KeyAction::ZoomTo(level) => KeyEffect::Zoom(level),
        KeyAction::PanLeft => KeyEffect::Pan(Point::new(pan(true), 0.0)),
        KeyAction::PanRight => KeyEffect::Pan(Point::new(-pan(true), 0.0)),
        KeyAction::PanUp => KeyEffect::Pan(Point::new(0.0, pan(false))),
        KeyAction::PanDown => KeyEffect::Pan(Point::new(0.0, -pan(false))),
        KeyAction::RotateCw => KeyEffect::Rotate(rotation + options.rotate_steps[idx].to_radians()),
        KeyAction::RotateCcw => {
            KeyEffect::Rotate(rotation - options.rotate_steps[idx].to_radians())
        }
        KeyAction::RotateReset => KeyEffect::Rotate(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift() -> KeyModifiers {
        KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        }
    }

    #[test]
    fn test_action_names() {
        assert_eq!("zoom.in".parse::<KeyAction>().unwrap(), KeyAction::ZoomIn);
        assert_eq!("zoom.12".parse::<KeyAction>().unwrap(), KeyAction::ZoomTo(12.0));
        assert_eq!(KeyAction::RotateReset.to_string(), "rotate.0");
        assert!("zoom.far".parse::<KeyAction>().is_err());
        let json = serde_json::to_string(&KeyAction::PanUp).unwrap();
        assert_eq!(json, "\"pan.up\"");
    }

    #[test]
    fn test_factor_from_modifiers() {
        assert_eq!(movement_factor(&KeyModifiers::default()), Some(0));
        assert_eq!(movement_factor(&shift()), Some(1));
        let both = KeyModifiers { ctrl: true, ..shift() };
        assert_eq!(movement_factor(&both), Some(2));
        let ctrl = KeyModifiers { ctrl: true, ..KeyModifiers::default() };
        assert_eq!(movement_factor(&ctrl), None);
    }

    #[test]
    fn test_resolve_key() {
        let bindings = default_key_bindings();
        assert_eq!(
            resolve_key(&bindings, KeyCode::ArrowLeft, &shift()),
            Some((KeyAction::PanLeft, 1))
        );
        assert_eq!(
            resolve_key(&bindings, KeyCode::Digit(3), &KeyModifiers::default()),
            Some((KeyAction::ZoomTo(6.0), 0))
        );
        assert_eq!(resolve_key(&bindings, KeyCode::Tab, &KeyModifiers::default()), None);
    }

    #[test]
    fn test_key_effects() {
        let options = KeyboardOptions::default();
        let size = Size::new(400.0, 300.0);
        assert_eq!(
            key_effect(KeyAction::ZoomIn, 2, &options, size, 4.0, 0.0),
            KeyEffect::Zoom(5.0)
        );
        assert_eq!(
            key_effect(KeyAction::PanDown, 2, &options, size, 4.0, 0.0),
            KeyEffect::Pan(Point::new(0.0, -150.0))
        );
        match key_effect(KeyAction::RotateCw, 2, &options, size, 4.0, 0.0) {
            KeyEffect::Rotate(r) => assert!((r - std::f64::consts::FRAC_PI_2).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }
}
