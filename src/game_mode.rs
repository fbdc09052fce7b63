// Game mode: builds the world from config, spawns the default pawn and owns
// the per-frame schedule.

use bevy_ecs::prelude::*;
use glam::{EulerRot, Quat};
use log::info;

use crate::character::{self, character_movement, dispatch_input_actions, setup_player_input};
use crate::config::{GameConfig, LevelConfig};
use crate::engine::hierarchy::{propagate_transforms, world_matrix, HierarchyError};
use crate::engine::mapping::resolve_input_actions;
use crate::engine::systems::expire_debug_messages;
use crate::engine::{
    ActionState, Collider, DebugMessages, FrameTime, GlobalTransform, InputContextSwitch,
    InputMappings, InputState, Name, PlayerWidget, Transform,
};
use crate::inspect::scan_for_inspect_candidate;

pub struct GameMode {
    config: GameConfig,
}

impl GameMode {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Insert the shared resources, build the level and spawn the player.
    /// Returns the player entity.
    pub fn start_play(&self, world: &mut World) -> Result<Entity, HierarchyError> {
        let config = &self.config;

        let mut mappings = InputMappings::new(config.input.contexts.clone());
        setup_player_input(&mappings);
        mappings.add_mapping_context(&config.inspect.default_context, 0);

        world.insert_resource(mappings);
        world.insert_resource(InputState::new());
        world.insert_resource(ActionState::default());
        world.insert_resource(FrameTime::default());
        world.insert_resource(PlayerWidget::new(config.inspect.prompt_text.clone()));
        world.insert_resource(DebugMessages::default());
        world.insert_resource(config.inspect.clone());

        let props = spawn_level(world, &config.level);
        let player = character::spawn_character(
            world,
            &config.character,
            &config.inspect,
            config.window.fov_degrees,
        )?;
        sync_global_transforms(world);

        info!("Started play with {props} props, player {player:?}");
        Ok(player)
    }

    /// Systems run once per frame, in order.
    pub fn frame_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                resolve_input_actions,
                dispatch_input_actions,
                character_movement,
                propagate_transforms,
                scan_for_inspect_candidate,
                expire_debug_messages,
            )
                .chain(),
        );
        schedule
    }
}

/// Spawn one box per prop. Returns how many were spawned.
pub fn spawn_level(world: &mut World, level: &LevelConfig) -> usize {
    for prop in &level.props {
        let [yaw, pitch, roll] = prop.rotation_degrees.to_array().map(f32::to_radians);
        let transform = Transform::from_position(prop.position)
            .with_rotation(Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll))
            .with_scale(prop.scale);
        world.spawn((
            Name::new(prop.name.clone()),
            transform,
            GlobalTransform(transform.to_matrix()),
            Collider::unit_cube(prop.channel),
            prop.color,
        ));
    }
    level.props.len()
}

/// Bring every GlobalTransform up to date outside the schedule.
fn sync_global_transforms(world: &mut World) {
    let mut query = world.query_filtered::<Entity, With<GlobalTransform>>();
    let entities: Vec<Entity> = query.iter(world).collect();
    for entity in entities {
        if let Some(matrix) = world_matrix(world, entity) {
            if let Some(mut global) = world.get_mut::<GlobalTransform>(entity) {
                global.0 = matrix;
            }
        }
    }
}
