// Action mapping: named contexts of bindings layered by priority
//
// Raw InputState → (active contexts) → per-action value → ActionEvents.
//
//   Started    the action became active (value went non-zero)
//   Triggered  the mapping's trigger fired this frame
//   Completed  the action stopped being active, including because the
//              context that mapped it was removed
//
// Handlers bind to (action, phase) pairs; swapping contexts is how a game
// turns whole groups of actions on and off.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use super::input::InputState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    Move,
    Look,
    Jump,
    EnterInspect,
    ExitInspect,
    RotateInspect,
}

impl InputAction {
    pub const ALL: [InputAction; 6] = [
        InputAction::Move,
        InputAction::Look,
        InputAction::Jump,
        InputAction::EnterInspect,
        InputAction::ExitInspect,
        InputAction::RotateInspect,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Started,
    Triggered,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionEvent {
    pub action: InputAction,
    pub phase: ActionPhase,
    pub value: Vec2,
}

/// When a mapping reports `Triggered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Every frame the value is non-zero.
    #[default]
    Down,
    /// The frame a bound key or button goes down.
    Pressed,
    /// The frame a bound key or button goes up.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Key(KeyCode),
    MouseButton(MouseButton),
    MouseMotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub source: InputSource,
    /// Value while a key/button is held; per-axis multiplier for mouse motion.
    #[serde(default = "Binding::default_scale")]
    pub scale: Vec2,
}

impl Binding {
    fn default_scale() -> Vec2 {
        Vec2::ONE
    }

    pub fn key(key: KeyCode) -> Self {
        Self { source: InputSource::Key(key), scale: Vec2::ONE }
    }

    pub fn mouse_button(button: MouseButton) -> Self {
        Self { source: InputSource::MouseButton(button), scale: Vec2::ONE }
    }

    pub fn mouse_motion() -> Self {
        Self { source: InputSource::MouseMotion, scale: Vec2::ONE }
    }

    pub fn scaled(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn value(&self, input: &InputState) -> Vec2 {
        match self.source {
            InputSource::Key(key) if input.is_key_held(key) => self.scale,
            InputSource::MouseButton(button) if input.is_button_held(button) => self.scale,
            InputSource::MouseMotion => input.mouse_delta * self.scale,
            _ => Vec2::ZERO,
        }
    }

    fn just_pressed(&self, input: &InputState) -> bool {
        match self.source {
            InputSource::Key(key) => input.key_just_pressed(key),
            InputSource::MouseButton(button) => input.button_just_pressed(button),
            InputSource::MouseMotion => false,
        }
    }

    fn just_released(&self, input: &InputState) -> bool {
        match self.source {
            InputSource::Key(key) => input.key_just_released(key),
            InputSource::MouseButton(button) => input.button_just_released(button),
            InputSource::MouseMotion => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMapping {
    pub action: InputAction,
    #[serde(default)]
    pub trigger: TriggerKind,
    pub bindings: Vec<Binding>,
}

impl ActionMapping {
    pub fn new(action: InputAction, trigger: TriggerKind, bindings: Vec<Binding>) -> Self {
        Self { action, trigger, bindings }
    }

    pub fn value(&self, input: &InputState) -> Vec2 {
        self.bindings.iter().map(|b| b.value(input)).sum()
    }

    fn fired(&self, input: &InputState, value: Vec2) -> bool {
        match self.trigger {
            TriggerKind::Down => value != Vec2::ZERO,
            TriggerKind::Pressed => self.bindings.iter().any(|b| b.just_pressed(input)),
            TriggerKind::Released => self.bindings.iter().any(|b| b.just_released(input)),
        }
    }
}

/// A named set of action mappings that can be swapped in and out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingContext {
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<ActionMapping>,
}

impl MappingContext {
    pub fn new(name: impl Into<String>, mappings: Vec<ActionMapping>) -> Self {
        Self { name: name.into(), mappings }
    }

    pub fn maps(&self, action: InputAction) -> bool {
        self.mappings.iter().any(|m| m.action == action)
    }
}

/// Swap which mapping contexts are active.
pub trait InputContextSwitch {
    /// Activate a registered context. Re-adding an active one updates its priority.
    /// Returns false for unknown contexts.
    fn add_mapping_context(&mut self, name: &str, priority: i32) -> bool;

    /// Returns false when the context was not active.
    fn remove_mapping_context(&mut self, name: &str) -> bool;

    fn is_context_active(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveContext {
    name: String,
    priority: i32,
}

/// All registered contexts plus the active stack, highest priority first.
#[derive(Resource, Debug, Default)]
pub struct InputMappings {
    contexts: Vec<MappingContext>,
    active: Vec<ActiveContext>,
}

impl InputMappings {
    pub fn new(contexts: Vec<MappingContext>) -> Self {
        let mut mappings = Self::default();
        for context in contexts {
            mappings.register(context);
        }
        mappings
    }

    /// Register a context, replacing any previous one with the same name.
    pub fn register(&mut self, context: MappingContext) {
        match self.contexts.iter_mut().find(|c| c.name == context.name) {
            Some(existing) => *existing = context,
            None => self.contexts.push(context),
        }
    }

    pub fn context(&self, name: &str) -> Option<&MappingContext> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn active_contexts(&self) -> impl Iterator<Item = &MappingContext> {
        self.active.iter().filter_map(|a| self.context(&a.name))
    }

    pub fn active_names(&self) -> Vec<&str> {
        self.active.iter().map(|a| a.name.as_str()).collect()
    }

    /// Actions no registered context maps.
    pub fn unmapped_actions(&self) -> Vec<InputAction> {
        InputAction::ALL
            .into_iter()
            .filter(|&action| !self.contexts.iter().any(|c| c.maps(action)))
            .collect()
    }
}

impl InputContextSwitch for InputMappings {
    fn add_mapping_context(&mut self, name: &str, priority: i32) -> bool {
        if self.context(name).is_none() {
            warn!("Mapping context '{name}' is not registered");
            return false;
        }
        self.active.retain(|a| a.name != name);
        // Equal priorities keep insertion order.
        let index = self
            .active
            .iter()
            .position(|a| a.priority < priority)
            .unwrap_or(self.active.len());
        self.active.insert(index, ActiveContext { name: name.to_owned(), priority });
        debug!("Mapping context '{name}' added at priority {priority}");
        true
    }

    fn remove_mapping_context(&mut self, name: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|a| a.name != name);
        let removed = self.active.len() != before;
        if removed {
            debug!("Mapping context '{name}' removed");
        }
        removed
    }

    fn is_context_active(&self, name: &str) -> bool {
        self.active.iter().any(|a| a.name == name)
    }
}

/// Resolved actions for the current frame.
#[derive(Resource, Debug, Default)]
pub struct ActionState {
    pub events: Vec<ActionEvent>,
    active: HashSet<InputAction>,
}

impl ActionState {
    pub fn is_active(&self, action: InputAction) -> bool {
        self.active.contains(&action)
    }

    pub fn triggered(&self, action: InputAction) -> bool {
        self.events
            .iter()
            .any(|e| e.action == action && e.phase == ActionPhase::Triggered)
    }

    pub fn resolve(&mut self, input: &InputState, mappings: &InputMappings) {
        self.events.clear();

        // (action, summed value, fired) in context priority order
        let mut frame: Vec<(InputAction, Vec2, bool)> = Vec::new();
        for context in mappings.active_contexts() {
            for mapping in &context.mappings {
                let value = mapping.value(input);
                let fired = mapping.fired(input, value);
                match frame.iter_mut().find(|(action, ..)| *action == mapping.action) {
                    Some(entry) => {
                        entry.1 += value;
                        entry.2 |= fired;
                    }
                    None => frame.push((mapping.action, value, fired)),
                }
            }
        }

        let mut now_active = HashSet::new();
        for (action, value, fired) in frame {
            if value != Vec2::ZERO {
                now_active.insert(action);
                if !self.active.contains(&action) {
                    self.events.push(ActionEvent { action, phase: ActionPhase::Started, value });
                }
            }
            if fired {
                self.events.push(ActionEvent { action, phase: ActionPhase::Triggered, value });
            }
        }

        let mut completed: Vec<InputAction> = self.active.difference(&now_active).copied().collect();
        completed.sort();
        self.events.extend(completed.into_iter().map(|action| ActionEvent {
            action,
            phase: ActionPhase::Completed,
            value: Vec2::ZERO,
        }));

        self.active = now_active;
    }
}

pub fn resolve_input_actions(
    input: Res<InputState>,
    mappings: Res<InputMappings>,
    mut actions: ResMut<ActionState>,
) {
    actions.resolve(&input, &mappings);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> InputMappings {
        let mut mappings = InputMappings::new(vec![
            MappingContext::new(
                "default",
                vec![
                    ActionMapping::new(
                        InputAction::Move,
                        TriggerKind::Down,
                        vec![
                            Binding::key(KeyCode::KeyW).scaled(Vec2::Y),
                            Binding::key(KeyCode::KeyD).scaled(Vec2::X),
                        ],
                    ),
                    ActionMapping::new(InputAction::Jump, TriggerKind::Down, vec![Binding::key(KeyCode::Space)]),
                    ActionMapping::new(InputAction::EnterInspect, TriggerKind::Pressed, vec![Binding::key(KeyCode::KeyE)]),
                ],
            ),
            MappingContext::new(
                "inspect",
                vec![
                    ActionMapping::new(InputAction::ExitInspect, TriggerKind::Pressed, vec![Binding::key(KeyCode::KeyE)]),
                    ActionMapping::new(
                        InputAction::RotateInspect,
                        TriggerKind::Down,
                        vec![Binding::mouse_motion().scaled(Vec2::new(1.0, -1.0))],
                    ),
                ],
            ),
        ]);
        mappings.add_mapping_context("default", 0);
        mappings
    }

    fn phases(actions: &ActionState, action: InputAction) -> Vec<ActionPhase> {
        actions.events.iter().filter(|e| e.action == action).map(|e| e.phase).collect()
    }

    #[test]
    fn held_action_starts_triggers_and_completes() {
        let mappings = mappings();
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_key(KeyCode::KeyW);
        input.press_key(KeyCode::KeyD);
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Move), vec![ActionPhase::Started, ActionPhase::Triggered]);
        assert_eq!(actions.events[0].value, Vec2::new(1.0, 1.0));

        input.end_frame();
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Move), vec![ActionPhase::Triggered]);

        input.release_key(KeyCode::KeyW);
        input.release_key(KeyCode::KeyD);
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Move), vec![ActionPhase::Completed]);
        assert!(!actions.is_active(InputAction::Move));
    }

    #[test]
    fn pressed_trigger_fires_once_per_press() {
        let mappings = mappings();
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_key(KeyCode::KeyE);
        actions.resolve(&input, &mappings);
        assert!(actions.triggered(InputAction::EnterInspect));

        input.end_frame();
        actions.resolve(&input, &mappings);
        assert!(!actions.triggered(InputAction::EnterInspect));
    }

    #[test]
    fn released_trigger_fires_on_key_up() {
        let mut mappings = InputMappings::new(vec![MappingContext::new(
            "default",
            vec![ActionMapping::new(InputAction::Jump, TriggerKind::Released, vec![Binding::key(KeyCode::Space)])],
        )]);
        mappings.add_mapping_context("default", 0);
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_key(KeyCode::Space);
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Jump), vec![ActionPhase::Started]);

        input.end_frame();
        input.release_key(KeyCode::Space);
        actions.resolve(&input, &mappings);
        assert_eq!(
            phases(&actions, InputAction::Jump),
            vec![ActionPhase::Triggered, ActionPhase::Completed]
        );
    }

    #[test]
    fn mouse_button_binding_follows_the_button() {
        let mut mappings = InputMappings::new(vec![MappingContext::new(
            "default",
            vec![ActionMapping::new(
                InputAction::EnterInspect,
                TriggerKind::Pressed,
                vec![Binding::mouse_button(MouseButton::Left).scaled(Vec2::X)],
            )],
        )]);
        mappings.add_mapping_context("default", 0);
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_button(MouseButton::Left);
        actions.resolve(&input, &mappings);
        assert_eq!(
            phases(&actions, InputAction::EnterInspect),
            vec![ActionPhase::Started, ActionPhase::Triggered]
        );
        assert_eq!(actions.events[0].value, Vec2::X);

        input.end_frame();
        actions.resolve(&input, &mappings);
        assert!(phases(&actions, InputAction::EnterInspect).is_empty());
        assert!(actions.is_active(InputAction::EnterInspect));

        input.release_button(MouseButton::Left);
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::EnterInspect), vec![ActionPhase::Completed]);
    }

    #[test]
    fn swapping_contexts_while_key_held_does_not_retrigger() {
        let mut mappings = mappings();
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_key(KeyCode::KeyE);
        actions.resolve(&input, &mappings);
        assert!(actions.triggered(InputAction::EnterInspect));
        assert!(!actions.triggered(InputAction::ExitInspect));

        mappings.remove_mapping_context("default");
        mappings.add_mapping_context("inspect", 0);
        input.end_frame();
        actions.resolve(&input, &mappings);
        assert!(!actions.triggered(InputAction::ExitInspect));
        assert_eq!(phases(&actions, InputAction::EnterInspect), vec![ActionPhase::Completed]);

        input.release_key(KeyCode::KeyE);
        input.end_frame();
        input.press_key(KeyCode::KeyE);
        actions.resolve(&input, &mappings);
        assert!(actions.triggered(InputAction::ExitInspect));
    }

    #[test]
    fn removed_context_completes_its_active_actions() {
        let mut mappings = mappings();
        let mut input = InputState::new();
        let mut actions = ActionState::default();

        input.press_key(KeyCode::Space);
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Jump), vec![ActionPhase::Started, ActionPhase::Triggered]);

        mappings.remove_mapping_context("default");
        input.end_frame();
        actions.resolve(&input, &mappings);
        assert_eq!(phases(&actions, InputAction::Jump), vec![ActionPhase::Completed]);
    }

    #[test]
    fn mouse_motion_is_scaled_per_axis() {
        let mut mappings = mappings();
        mappings.add_mapping_context("inspect", 1);
        let mut input = InputState::new();
        input.mouse_delta = Vec2::new(2.0, 3.0);
        let mut actions = ActionState::default();

        actions.resolve(&input, &mappings);

        let rotate = actions
            .events
            .iter()
            .find(|e| e.action == InputAction::RotateInspect && e.phase == ActionPhase::Triggered)
            .unwrap();
        assert_eq!(rotate.value, Vec2::new(2.0, -3.0));
    }

    #[test]
    fn active_stack_is_ordered_by_priority() {
        let mut mappings = mappings();
        assert!(mappings.add_mapping_context("inspect", 5));
        assert_eq!(mappings.active_names(), vec!["inspect", "default"]);

        assert!(mappings.add_mapping_context("inspect", -1));
        assert_eq!(mappings.active_names(), vec!["default", "inspect"]);

        assert!(!mappings.add_mapping_context("missing", 0));
        assert!(mappings.remove_mapping_context("inspect"));
        assert!(!mappings.remove_mapping_context("inspect"));
        assert!(mappings.is_context_active("default"));
    }

    #[test]
    fn unmapped_actions_are_reported() {
        let mappings = mappings();
        assert_eq!(mappings.unmapped_actions(), vec![InputAction::Look]);
    }
}
