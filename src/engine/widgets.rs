// HUD-facing state written by gameplay and read by the overlay each frame.

use std::collections::VecDeque;

use bevy_ecs::prelude::*;

use super::components::Color;

/// Something that can show or hide the interaction prompt.
pub trait PromptSink {
    fn set_prompt(&mut self, visible: bool);
}

/// The player's on-screen widget: crosshair plus the interaction prompt.
#[derive(Resource, Debug, Clone)]
pub struct PlayerWidget {
    pub prompt_visible: bool,
    pub prompt_text: String,
}

impl PlayerWidget {
    pub fn new(prompt_text: impl Into<String>) -> Self {
        Self { prompt_visible: false, prompt_text: prompt_text.into() }
    }
}

impl PromptSink for PlayerWidget {
    fn set_prompt(&mut self, visible: bool) {
        self.prompt_visible = visible;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugMessage {
    pub text: String,
    pub color: Color,
    pub remaining: f32,
}

/// Short-lived on-screen messages, newest first.
#[derive(Resource, Debug, Clone)]
pub struct DebugMessages {
    messages: VecDeque<DebugMessage>,
    capacity: usize,
}

impl Default for DebugMessages {
    fn default() -> Self {
        Self::with_capacity(12)
    }
}

impl DebugMessages {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { messages: VecDeque::with_capacity(capacity), capacity }
    }

    /// Show `text` for `seconds`. The oldest message is dropped when full.
    pub fn push(&mut self, text: impl Into<String>, seconds: f32, color: Color) {
        if self.capacity == 0 {
            return;
        }
        if self.messages.len() == self.capacity {
            self.messages.pop_back();
        }
        self.messages.push_front(DebugMessage { text: text.into(), color, remaining: seconds });
    }

    pub fn tick(&mut self, dt: f32) {
        for message in &mut self.messages {
            message.remaining -= dt;
        }
        self.messages.retain(|m| m.remaining > 0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DebugMessage> {
        self.messages.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);

    #[test]
    fn messages_expire_after_their_duration() {
        let mut messages = DebugMessages::default();
        messages.push("short", 0.5, RED);
        messages.push("long", 2.0, RED);

        messages.tick(1.0);

        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["long"]);
    }

    #[test]
    fn full_queue_drops_the_oldest() {
        let mut messages = DebugMessages::with_capacity(2);
        messages.push("a", 1.0, RED);
        messages.push("b", 1.0, RED);
        messages.push("c", 1.0, RED);

        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "b"]);
    }

    #[test]
    fn prompt_sink_toggles_visibility() {
        let mut widget = PlayerWidget::new("Inspect");
        widget.set_prompt(true);
        assert!(widget.prompt_visible);
        widget.set_prompt(false);
        assert!(!widget.prompt_visible);
    }
}
