// Engine-level ECS resources and systems that every frame needs

use bevy_ecs::prelude::*;

use super::widgets::DebugMessages;

/// Time step of the current frame, written by the main loop before the schedule runs.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct FrameTime {
    /// Seconds since the previous frame, clamped so a stall doesn't launch the player.
    pub delta: f32,
    pub elapsed: f32,
}

impl FrameTime {
    pub const MAX_DELTA: f32 = 0.1;

    pub fn advance(&mut self, seconds: f32) {
        self.delta = seconds.clamp(0.0, Self::MAX_DELTA);
        self.elapsed += self.delta;
    }
}

/// Count down on-screen messages and drop expired ones
pub fn expire_debug_messages(time: Res<FrameTime>, mut messages: ResMut<DebugMessages>) {
    messages.tick(time.delta);
}
