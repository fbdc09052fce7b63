// Engine module - reusable game engine components
// Scene graph, traces, input mapping, camera and the HUD overlay; nothing in
// here knows about characters or inspection.

pub mod camera;
pub mod components;
pub mod hierarchy;
pub mod hud;
pub mod input;
pub mod mapping;
pub mod mesh;
pub mod raycast;
pub mod systems;
pub mod widgets;

// Re-export commonly used items
pub use camera::FirstPersonCamera;
pub use components::*;
pub use hierarchy::{AttachRule, Children, DetachRule, HierarchyError, Parent};
pub use input::InputState;
pub use mapping::*;
pub use raycast::LineTrace;
pub use systems::FrameTime;
pub use widgets::{DebugMessages, PlayerWidget, PromptSink};
