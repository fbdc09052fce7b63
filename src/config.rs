// Game configuration, loaded from TOML with built-in defaults for anything missing

use std::fs;
use std::path::{Path, PathBuf};

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use winit::keyboard::KeyCode;

use crate::engine::{
    ActionMapping, Binding, Color, CollisionChannel, InputAction, MappingContext, TriggerKind,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/inspect_mode.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub character: CharacterConfig,
    pub inspect: InspectConfig,
    pub input: InputConfig,
    pub level: LevelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fov_degrees: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Inspect Mode".to_owned(),
            width: 1280,
            height: 720,
            fov_degrees: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Capsule centre at spawn.
    pub spawn_position: Vec3,
    pub capsule_radius: f32,
    pub capsule_half_height: f32,
    /// Metres per second.
    pub walk_speed: f32,
    pub jump_velocity: f32,
    pub gravity: f32,
    /// Falling below this height respawns the character.
    pub kill_height: f32,
    /// Camera position relative to the capsule centre.
    pub camera_offset: Vec3,
    /// First-person hands box, relative to the camera.
    pub hands_offset: Vec3,
    pub hands_scale: Vec3,
    pub hands_color: Color,
    /// Radians of control rotation per unit of look input.
    pub look_sensitivity: f32,
    pub pitch_limit_degrees: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            spawn_position: Vec3::new(0.0, 0.96, 4.0),
            capsule_radius: 0.55,
            capsule_half_height: 0.96,
            walk_speed: 6.0,
            jump_velocity: 4.2,
            gravity: 9.81,
            kill_height: -20.0,
            camera_offset: Vec3::new(0.0, 0.6, 0.1),
            hands_offset: Vec3::new(0.28, -0.32, -0.45),
            hands_scale: Vec3::new(0.12, 0.12, 0.4),
            hands_color: Color::rgb(0.85, 0.68, 0.55),
            look_sensitivity: 0.0025,
            pitch_limit_degrees: 89.0,
        }
    }
}

/// Tuning for the candidate scan and the inspect state machine.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Length of the forward trace from the camera.
    pub trace_distance: f32,
    pub trace_channel: CollisionChannel,
    /// Anchor position relative to the camera.
    pub anchor_offset: Vec3,
    pub prompt_text: String,
    pub rotate_message: String,
    pub rotate_message_seconds: f32,
    pub default_context: String,
    pub inspect_context: String,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            trace_distance: 50.0,
            trace_channel: CollisionChannel::WorldDynamic,
            anchor_offset: Vec3::new(0.0, 0.0, -0.9),
            prompt_text: "[E] Inspect".to_owned(),
            rotate_message: "Rotating".to_owned(),
            rotate_message_seconds: 1.0,
            default_context: "default".to_owned(),
            inspect_context: "inspect".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub contexts: Vec<MappingContext>,
}

impl Default for InputConfig {
    fn default() -> Self {
        let mouse = Binding::mouse_motion().scaled(Vec2::new(1.0, -1.0));
        Self {
            contexts: vec![
                MappingContext::new(
                    "default",
                    vec![
                        ActionMapping::new(
                            InputAction::Move,
                            TriggerKind::Down,
                            vec![
                                Binding::key(KeyCode::KeyW).scaled(Vec2::Y),
                                Binding::key(KeyCode::KeyS).scaled(Vec2::NEG_Y),
                                Binding::key(KeyCode::KeyD).scaled(Vec2::X),
                                Binding::key(KeyCode::KeyA).scaled(Vec2::NEG_X),
                            ],
                        ),
                        ActionMapping::new(InputAction::Look, TriggerKind::Down, vec![mouse]),
                        ActionMapping::new(InputAction::Jump, TriggerKind::Down, vec![Binding::key(KeyCode::Space)]),
                        ActionMapping::new(
                            InputAction::EnterInspect,
                            TriggerKind::Pressed,
                            vec![Binding::key(KeyCode::KeyE)],
                        ),
                    ],
                ),
                MappingContext::new(
                    "inspect",
                    vec![
                        ActionMapping::new(
                            InputAction::ExitInspect,
                            TriggerKind::Pressed,
                            vec![Binding::key(KeyCode::KeyE), Binding::key(KeyCode::KeyQ)],
                        ),
                        ActionMapping::new(InputAction::RotateInspect, TriggerKind::Down, vec![mouse]),
                    ],
                ),
            ],
        }
    }
}

/// One box in the level. Props on the inspect trace channel can be picked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropConfig {
    pub name: String,
    pub position: Vec3,
    /// Euler angles (yaw, pitch, roll) in degrees.
    #[serde(default)]
    pub rotation_degrees: Vec3,
    #[serde(default = "PropConfig::default_scale")]
    pub scale: Vec3,
    pub color: Color,
    pub channel: CollisionChannel,
}

impl PropConfig {
    fn default_scale() -> Vec3 {
        Vec3::ONE
    }

    fn new(name: &str, position: Vec3, scale: Vec3, color: Color, channel: CollisionChannel) -> Self {
        Self {
            name: name.to_owned(),
            position,
            rotation_degrees: Vec3::ZERO,
            scale,
            color,
            channel,
        }
    }

    fn rotated(mut self, yaw_degrees: f32) -> Self {
        self.rotation_degrees.x = yaw_degrees;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub props: Vec<PropConfig>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        use CollisionChannel::{WorldDynamic, WorldStatic};
        let stone = Color::rgb(0.45, 0.45, 0.5);
        Self {
            props: vec![
                PropConfig::new("Floor", Vec3::new(0.0, -0.1, 0.0), Vec3::new(40.0, 0.2, 40.0), Color::rgb(0.3, 0.32, 0.3), WorldStatic),
                PropConfig::new("Pedestal", Vec3::new(0.0, 0.625, 0.0), Vec3::new(0.8, 1.25, 0.8), stone, WorldStatic),
                PropConfig::new("Brass Lantern", Vec3::new(0.0, 1.45, 0.0), Vec3::new(0.3, 0.4, 0.3), Color::rgb(0.85, 0.65, 0.2), WorldDynamic)
                    .rotated(20.0),
                PropConfig::new("Pedestal", Vec3::new(-2.5, 0.625, -1.0), Vec3::new(0.8, 1.25, 0.8), stone, WorldStatic),
                PropConfig::new("Old Book", Vec3::new(-2.5, 1.35, -1.0), Vec3::new(0.45, 0.2, 0.6), Color::rgb(0.55, 0.15, 0.12), WorldDynamic)
                    .rotated(-35.0),
                PropConfig::new("Pedestal", Vec3::new(2.5, 0.625, -1.0), Vec3::new(0.8, 1.25, 0.8), stone, WorldStatic),
                PropConfig::new("Crystal", Vec3::new(2.5, 1.5, -1.0), Vec3::new(0.25, 0.5, 0.25), Color::rgb(0.4, 0.8, 0.95), WorldDynamic)
                    .rotated(45.0),
                PropConfig::new("Crate", Vec3::new(4.0, 0.5, -6.0), Vec3::ONE, Color::rgb(0.6, 0.45, 0.25), WorldDynamic)
                    .rotated(15.0),
                PropConfig::new("Back Wall", Vec3::new(0.0, 2.0, -12.0), Vec3::new(24.0, 4.0, 0.5), stone, WorldStatic),
            ],
        }
    }
}

impl GameConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration, falling back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_path(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config not found at {}. Using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("{err}. Using defaults");
                Self::default()
            }
        }
    }
}
