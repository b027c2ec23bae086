//! Navigation actions and the priority-ordered bindings that select them.
//!
//! A binding names an action, the inputs that must (or must not) be active
//! and the modifier keys that must (or must not) be held. Bindings are
//! evaluated in order and the first one that fully matches wins.

use crate::input::events::{KeyModifiers, MouseButtons};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A navigation action an input gesture can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NavAction {
    Pan,
    Zoom,
    Rotate,
    Select,
    ZoomSelect,
    UnzoomSelect,
    /// Combined touch pinch, twist and drag
    ZoomRotate,
}

impl NavAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavAction::Pan => "pan",
            NavAction::Zoom => "zoom",
            NavAction::Rotate => "rotate",
            NavAction::Select => "select",
            NavAction::ZoomSelect => "zoomselect",
            NavAction::UnzoomSelect => "unzoomselect",
            NavAction::ZoomRotate => "zoomrotate",
        }
    }

    /// Selection event raised when a rectangle drawn for this action is released
    pub fn default_selection(&self) -> Option<SelectionEvent> {
        match self {
            NavAction::Select => Some(SelectionEvent::Select),
            NavAction::ZoomSelect => Some(SelectionEvent::ZoomSelect),
            NavAction::UnzoomSelect => Some(SelectionEvent::UnzoomSelect),
            _ => None,
        }
    }
}

impl fmt::Display for NavAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pan" => Ok(NavAction::Pan),
            "zoom" => Ok(NavAction::Zoom),
            "rotate" => Ok(NavAction::Rotate),
            "select" => Ok(NavAction::Select),
            "zoomselect" => Ok(NavAction::ZoomSelect),
            "unzoomselect" => Ok(NavAction::UnzoomSelect),
            "zoomrotate" => Ok(NavAction::ZoomRotate),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

impl TryFrom<String> for NavAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NavAction> for String {
    fn from(action: NavAction) -> Self {
        action.as_str().to_string()
    }
}

/// Event raised when a selection rectangle is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionEvent {
    Select,
    ZoomSelect,
    UnzoomSelect,
}

impl FromStr for SelectionEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(SelectionEvent::Select),
            "zoomselect" => Ok(SelectionEvent::ZoomSelect),
            "unzoomselect" => Ok(SelectionEvent::UnzoomSelect),
            other => Err(format!("unknown selection event {other:?}")),
        }
    }
}

/// Physical inputs a binding can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputName {
    Left,
    Right,
    Middle,
    Wheel,
    /// Single pointer touch
    TouchPan,
    /// Two or more pointers
    TouchMulti,
}

impl FromStr for InputName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(InputName::Left),
            "right" => Ok(InputName::Right),
            "middle" => Ok(InputName::Middle),
            "wheel" => Ok(InputName::Wheel),
            "touchpan" | "touch.pan" => Ok(InputName::TouchPan),
            "touchmulti" | "touch.multi" | "touchrotate" => Ok(InputName::TouchMulti),
            other => Err(format!("unknown input {other:?}")),
        }
    }
}

/// Inputs active when a binding is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveInputs {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
    pub wheel: bool,
    pub touch_pan: bool,
    pub touch_multi: bool,
}

impl ActiveInputs {
    pub fn from_buttons(buttons: &MouseButtons) -> Self {
        Self {
            left: buttons.left,
            right: buttons.right,
            middle: buttons.middle,
            ..Self::default()
        }
    }

    pub fn wheel() -> Self {
        Self {
            wheel: true,
            ..Self::default()
        }
    }

    /// Touch input for `pointers` simultaneous contacts
    pub fn touch(pointers: usize) -> Self {
        Self {
            touch_pan: pointers == 1,
            touch_multi: pointers >= 2,
            ..Self::default()
        }
    }

    pub fn is_active(&self, input: InputName) -> bool {
        match input {
            InputName::Left => self.left,
            InputName::Right => self.right,
            InputName::Middle => self.middle,
            InputName::Wheel => self.wheel,
            InputName::TouchPan => self.touch_pan,
            InputName::TouchMulti => self.touch_multi,
        }
    }
}

/// Required modifier state; `None` means the key is not tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierRule {
    pub shift: Option<bool>,
    pub ctrl: Option<bool>,
    pub alt: Option<bool>,
    pub meta: Option<bool>,
}

impl ModifierRule {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn shift(mut self, pressed: bool) -> Self {
        self.shift = Some(pressed);
        self
    }

    pub fn ctrl(mut self, pressed: bool) -> Self {
        self.ctrl = Some(pressed);
        self
    }

    pub fn alt(mut self, pressed: bool) -> Self {
        self.alt = Some(pressed);
        self
    }

    pub fn meta(mut self, pressed: bool) -> Self {
        self.meta = Some(pressed);
        self
    }

    fn set(&mut self, name: &str, pressed: bool) -> bool {
        let slot = match name.to_ascii_lowercase().as_str() {
            "shift" => &mut self.shift,
            "ctrl" | "control" => &mut self.ctrl,
            "alt" | "option" => &mut self.alt,
            "meta" | "cmd" | "command" => &mut self.meta,
            _ => return false,
        };
        *slot = Some(pressed);
        true
    }

    pub fn matches(&self, modifiers: &KeyModifiers) -> bool {
        let check = |rule: Option<bool>, pressed: bool| rule.map_or(true, |want| want == pressed);
        check(self.shift, modifiers.shift)
            && check(self.ctrl, modifiers.ctrl)
            && check(self.alt, modifiers.alt)
            && check(self.meta, modifiers.meta)
    }
}

/// Maps an input and modifier combination to an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub action: NavAction,
    /// Optional label used by [`remove_action`] and [`has_action`]
    pub name: Option<String>,
    pub owner: Option<String>,
    /// Each input must be active (`true`) or inactive (`false`)
    pub input: Vec<(InputName, bool)>,
    pub modifiers: ModifierRule,
    /// Draw a selection rectangle and raise this event on release
    pub selection_rectangle: Option<SelectionEvent>,
}

impl ActionBinding {
    pub fn new(action: NavAction, input: InputName) -> Self {
        Self {
            action,
            name: None,
            owner: None,
            input: vec![(input, true)],
            modifiers: ModifierRule::any(),
            selection_rectangle: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn owned_by(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    /// Additionally require `input` to be active or inactive
    pub fn with_input(mut self, input: InputName, active: bool) -> Self {
        self.input.push((input, active));
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierRule) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_selection(mut self, event: SelectionEvent) -> Self {
        self.selection_rectangle = Some(event);
        self
    }

    pub fn matches(&self, inputs: &ActiveInputs, modifiers: &KeyModifiers) -> bool {
        self.input
            .iter()
            .all(|(input, active)| inputs.is_active(*input) == *active)
            && self.modifiers.matches(modifiers)
    }
}

/// The bindings a fresh interactor uses, highest priority first
pub fn default_bindings() -> Vec<ActionBinding> {
    let plain = ModifierRule::any().shift(false).ctrl(false);
    vec![
        ActionBinding::new(NavAction::Pan, InputName::Left)
            .named("button pan")
            .with_modifiers(plain),
        ActionBinding::new(NavAction::Zoom, InputName::Right)
            .named("button zoom")
            .with_modifiers(plain),
        ActionBinding::new(NavAction::Zoom, InputName::Wheel)
            .named("wheel zoom")
            .with_modifiers(plain),
        ActionBinding::new(NavAction::Rotate, InputName::Left)
            .named("button rotate")
            .with_modifiers(ModifierRule::any().shift(false).ctrl(true)),
        ActionBinding::new(NavAction::Rotate, InputName::Wheel)
            .named("wheel rotate")
            .with_modifiers(ModifierRule::any().shift(false).ctrl(true)),
        ActionBinding::new(NavAction::Select, InputName::Left)
            .named("drag select")
            .with_modifiers(ModifierRule::any().shift(true).ctrl(true))
            .with_selection(SelectionEvent::Select),
        ActionBinding::new(NavAction::ZoomSelect, InputName::Left)
            .named("drag zoom")
            .with_modifiers(ModifierRule::any().shift(true).ctrl(false))
            .with_selection(SelectionEvent::ZoomSelect),
        ActionBinding::new(NavAction::UnzoomSelect, InputName::Right)
            .named("drag unzoom")
            .with_modifiers(ModifierRule::any().shift(true).ctrl(false))
            .with_selection(SelectionEvent::UnzoomSelect),
        ActionBinding::new(NavAction::Pan, InputName::TouchPan).named("touch pan"),
        ActionBinding::new(NavAction::ZoomRotate, InputName::TouchMulti).named("touch zoomrotate"),
    ]
}

/// First binding that fully matches, if any
pub fn resolve_action<'a>(
    bindings: &'a [ActionBinding],
    inputs: &ActiveInputs,
    modifiers: &KeyModifiers,
) -> Option<&'a ActionBinding> {
    bindings
        .iter()
        .find(|binding| binding.matches(inputs, modifiers))
}

/// Insert a binding at the highest priority, or the lowest when `to_end`
pub fn add_action(bindings: &mut Vec<ActionBinding>, binding: ActionBinding, to_end: bool) {
    if to_end {
        bindings.push(binding);
    } else {
        bindings.insert(0, binding);
    }
}

fn selects(binding: &ActionBinding, action: NavAction, name: Option<&str>, owner: Option<&str>) -> bool {
    binding.action == action
        && name.map_or(true, |name| binding.name.as_deref() == Some(name))
        && owner.map_or(true, |owner| binding.owner.as_deref() == Some(owner))
}

/// Remove every binding for `action`, narrowed by name and owner when given.
/// Returns the number removed.
pub fn remove_action(
    bindings: &mut Vec<ActionBinding>,
    action: NavAction,
    name: Option<&str>,
    owner: Option<&str>,
) -> usize {
    let before = bindings.len();
    bindings.retain(|binding| !selects(binding, action, name, owner));
    before - bindings.len()
}

pub fn has_action(
    bindings: &[ActionBinding],
    action: NavAction,
    name: Option<&str>,
    owner: Option<&str>,
) -> bool {
    bindings
        .iter()
        .any(|binding| selects(binding, action, name, owner))
}

/// Inputs of a binding record: one name or a map of name to required state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    One(String),
    Many(BTreeMap<String, bool>),
}

/// `selection_rectangle` of a binding record: a flag or an event name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionSpec {
    Flag(bool),
    Event(String),
}

/// Serializable form of an [`ActionBinding`] using string names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBindingConfig {
    pub action: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    pub input: InputSpec,
    #[serde(default)]
    pub modifiers: BTreeMap<String, bool>,
    #[serde(default)]
    pub selection_rectangle: Option<SelectionSpec>,
}

impl ActionBindingConfig {
    /// Convert into a binding, or `None` with a warning when a name is not
    /// recognized
    pub fn to_binding(&self) -> Option<ActionBinding> {
        let action = match self.action.parse::<NavAction>() {
            Ok(action) => action,
            Err(err) => {
                log::warn!(target: "mapview", "skipping action binding: {err}");
                return None;
            }
        };

        let names: Vec<(String, bool)> = match &self.input {
            InputSpec::One(name) => vec![(name.clone(), true)],
            InputSpec::Many(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        };
        let mut input = Vec::with_capacity(names.len());
        for (name, active) in names {
            match name.parse::<InputName>() {
                Ok(parsed) => input.push((parsed, active)),
                Err(err) => {
                    log::warn!(target: "mapview", "skipping {action} binding: {err}");
                    return None;
                }
            }
        }
        if input.is_empty() {
            log::warn!(target: "mapview", "skipping {action} binding without inputs");
            return None;
        }

        let mut modifiers = ModifierRule::any();
        for (name, pressed) in &self.modifiers {
            if !modifiers.set(name, *pressed) {
                log::warn!(target: "mapview", "skipping {action} binding: unknown modifier {name:?}");
                return None;
            }
        }

        let selection_rectangle = match &self.selection_rectangle {
            None | Some(SelectionSpec::Flag(false)) => None,
            Some(SelectionSpec::Flag(true)) => {
                Some(action.default_selection().unwrap_or(SelectionEvent::Select))
            }
            Some(SelectionSpec::Event(name)) => match name.parse::<SelectionEvent>() {
                Ok(event) => Some(event),
                Err(err) => {
                    log::warn!(target: "mapview", "skipping {action} binding: {err}");
                    return None;
                }
            },
        };

        Some(ActionBinding {
            action,
            name: self.name.clone(),
            owner: self.owner.clone(),
            input,
            modifiers,
            selection_rectangle,
        })
    }
}

/// Convert binding records, dropping malformed ones
pub fn bindings_from_config(configs: &[ActionBindingConfig]) -> Vec<ActionBinding> {
    configs.iter().filter_map(ActionBindingConfig::to_binding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods(shift: bool, ctrl: bool) -> KeyModifiers {
        KeyModifiers {
            shift,
            ctrl,
            ..KeyModifiers::default()
        }
    }

    fn left() -> ActiveInputs {
        ActiveInputs {
            left: true,
            ..ActiveInputs::default()
        }
    }

    #[test]
    fn test_default_resolution() {
        let bindings = default_bindings();
        let action = |inputs: ActiveInputs, shift, ctrl| {
            resolve_action(&bindings, &inputs, &mods(shift, ctrl)).map(|b| b.action)
        };
        assert_eq!(action(left(), false, false), Some(NavAction::Pan));
        assert_eq!(action(left(), false, true), Some(NavAction::Rotate));
        assert_eq!(action(left(), true, true), Some(NavAction::Select));
        assert_eq!(action(left(), true, false), Some(NavAction::ZoomSelect));
        assert_eq!(
            action(ActiveInputs { right: true, ..ActiveInputs::default() }, true, false),
            Some(NavAction::UnzoomSelect)
        );
        assert_eq!(action(ActiveInputs::wheel(), false, false), Some(NavAction::Zoom));
        assert_eq!(action(ActiveInputs::wheel(), false, true), Some(NavAction::Rotate));
        assert_eq!(action(ActiveInputs::wheel(), true, false), None);
        assert_eq!(action(ActiveInputs::touch(1), false, false), Some(NavAction::Pan));
        assert_eq!(action(ActiveInputs::touch(2), false, false), Some(NavAction::ZoomRotate));
    }

    #[test]
    fn test_first_match_wins() {
        let bindings = vec![
            ActionBinding::new(NavAction::Rotate, InputName::Left).named("a"),
            ActionBinding::new(NavAction::Pan, InputName::Left).named("b"),
        ];
        let found = resolve_action(&bindings, &left(), &KeyModifiers::default()).unwrap();
        assert_eq!(found.name.as_deref(), Some("a"));
    }

    #[test]
    fn test_add_remove_has() {
        let mut bindings = default_bindings();
        let count = bindings.len();
        add_action(
            &mut bindings,
            ActionBinding::new(NavAction::Rotate, InputName::Middle).owned_by("tool"),
            false,
        );
        assert_eq!(bindings[0].action, NavAction::Rotate);
        assert!(has_action(&bindings, NavAction::Rotate, None, Some("tool")));
        assert_eq!(remove_action(&mut bindings, NavAction::Rotate, None, Some("tool")), 1);
        assert_eq!(bindings.len(), count);
        assert_eq!(remove_action(&mut bindings, NavAction::Pan, Some("touch pan"), None), 1);
        assert!(has_action(&bindings, NavAction::Pan, Some("button pan"), None));
        assert!(!has_action(&bindings, NavAction::Pan, Some("touch pan"), None));
    }

    #[test]
    fn test_config_records() {
        let json = r#"[
            {"action": "pan", "input": "middle", "modifiers": {"shift": false}},
            {"action": "zoomselect", "input": {"left": true, "right": false}, "selection_rectangle": true},
            {"action": "fly", "input": "left"},
            {"action": "pan", "input": "nose"}
        ]"#;
        let configs: Vec<ActionBindingConfig> = serde_json::from_str(json).unwrap();
        let bindings = bindings_from_config(&configs);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].input, vec![(InputName::Middle, true)]);
        assert_eq!(bindings[0].modifiers.shift, Some(false));
        assert_eq!(bindings[1].selection_rectangle, Some(SelectionEvent::ZoomSelect));
        let right = ActiveInputs { left: true, right: true, ..ActiveInputs::default() };
        assert!(!bindings[1].matches(&right, &KeyModifiers::default()));
    }

    #[test]
    fn test_action_names() {
        for action in [
            NavAction::Pan,
            NavAction::Zoom,
            NavAction::Rotate,
            NavAction::Select,
            NavAction::ZoomSelect,
            NavAction::UnzoomSelect,
            NavAction::ZoomRotate,
        ] {
            assert_eq!(action.as_str().parse::<NavAction>().unwrap(), action);
        }
        assert!("wiggle".parse::<NavAction>().is_err());
    }
}
