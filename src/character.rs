// The player character: capsule body, first-person camera rig, the handlers
// bound to input actions, and per-frame movement.
//
// Rig layout (all attached with KeepRelative):
//
//   Player (capsule, yaw)
//   └── FirstPersonCamera (pitch)
//       ├── InspectOrigin (anchor for inspected objects)
//       └── Hands

use bevy_ecs::prelude::*;
use glam::{Quat, Vec2, Vec3};
use log::{error, warn};

use crate::config::{CharacterConfig, InspectConfig};
use crate::engine::hierarchy::attach_to;
use crate::engine::{
    ActionEvent, ActionPhase, ActionState, AttachRule, Collider, CollisionChannel,
    FirstPersonCamera, FrameTime, GlobalTransform, HierarchyError, InputAction, InputMappings,
    LineTrace, Name, Transform,
};
use crate::inspect::{self, InspectAnchor, InspectController};

/// Extra reach of the ground trace below the capsule base.
const GROUND_SNAP: f32 = 0.05;

#[derive(Component, Debug, Clone, Copy)]
pub struct Character {
    pub half_height: f32,
}

/// Control rotation. Its presence means the character is possessed.
#[derive(Component, Debug, Clone, Copy)]
pub struct PlayerController {
    pub yaw: f32,
    pub pitch: f32,
    pub look_sensitivity: f32,
    /// Radians
    pub pitch_limit: f32,
}

impl PlayerController {
    pub fn add_yaw_input(&mut self, value: f32) {
        self.yaw = wrap_angle(self.yaw - value * self.look_sensitivity);
    }

    pub fn add_pitch_input(&mut self, value: f32) {
        self.pitch = (self.pitch + value * self.look_sensitivity).clamp(-self.pitch_limit, self.pitch_limit);
    }
}

#[derive(Component, Debug, Clone, Copy)]
pub struct CharacterMovement {
    pub velocity: Vec3,
    pub walk_speed: f32,
    pub jump_velocity: f32,
    pub gravity: f32,
    pub grounded: bool,
    /// World-space movement input accumulated since the last movement step.
    pub pending_input: Vec3,
    pub jump_requested: bool,
    pub kill_height: f32,
    pub spawn_position: Vec3,
}

/// Entities making up the first-person rig.
#[derive(Component, Debug, Clone, Copy)]
pub struct CharacterRig {
    pub camera: Entity,
    pub anchor: Entity,
}

/// Spawn the player character with its camera rig.
pub fn spawn_character(
    world: &mut World,
    config: &CharacterConfig,
    inspect: &InspectConfig,
    fov_degrees: f32,
) -> Result<Entity, HierarchyError> {
    let player = world
        .spawn((
            Name::new("Player"),
            Transform::from_position(config.spawn_position),
            GlobalTransform::default(),
            Character { half_height: config.capsule_half_height },
            Collider::capsule(config.capsule_radius, config.capsule_half_height, CollisionChannel::Pawn),
            CharacterMovement {
                velocity: Vec3::ZERO,
                walk_speed: config.walk_speed,
                jump_velocity: config.jump_velocity,
                gravity: config.gravity,
                grounded: false,
                pending_input: Vec3::ZERO,
                jump_requested: false,
                kill_height: config.kill_height,
                spawn_position: config.spawn_position,
            },
            PlayerController {
                yaw: 0.0,
                pitch: 0.0,
                look_sensitivity: config.look_sensitivity,
                pitch_limit: config.pitch_limit_degrees.to_radians(),
            },
            InspectController::default(),
        ))
        .id();

    let camera = world
        .spawn((
            Name::new("FirstPersonCamera"),
            Transform::from_position(config.camera_offset),
            GlobalTransform::default(),
            FirstPersonCamera::with_fov_degrees(fov_degrees),
        ))
        .id();
    attach_to(world, camera, player, AttachRule::KeepRelative)?;

    let anchor = world
        .spawn((
            Name::new("InspectOrigin"),
            Transform::from_position(inspect.anchor_offset),
            GlobalTransform::default(),
            InspectAnchor,
        ))
        .id();
    attach_to(world, anchor, camera, AttachRule::KeepRelative)?;

    let hands = world
        .spawn((
            Name::new("Hands"),
            Transform::from_position(config.hands_offset).with_scale(config.hands_scale),
            GlobalTransform::default(),
            config.hands_color,
        ))
        .id();
    attach_to(world, hands, camera, AttachRule::KeepRelative)?;

    world.entity_mut(player).insert(CharacterRig { camera, anchor });
    Ok(player)
}

/// Check the mapping contexts cover every action the character binds.
pub fn setup_player_input(mappings: &InputMappings) {
    let unmapped = mappings.unmapped_actions();
    if !unmapped.is_empty() {
        error!("No mapping context binds {unmapped:?}; those actions will never fire");
    }
}

/// Run the handler bound to each resolved action for every possessed character
pub fn dispatch_input_actions(world: &mut World) {
    let Some(actions) = world.get_resource::<ActionState>() else {
        return;
    };
    if actions.events.is_empty() {
        return;
    }
    let events = actions.events.clone();

    let mut players = world.query_filtered::<Entity, With<PlayerController>>();
    let players: Vec<Entity> = players.iter(world).collect();
    for player in players {
        for event in &events {
            handle_action(world, player, event);
        }
    }
}

fn handle_action(world: &mut World, player: Entity, event: &ActionEvent) {
    match (event.action, event.phase) {
        (InputAction::Move, ActionPhase::Triggered) => move_character(world, player, event.value),
        (InputAction::Look, ActionPhase::Triggered) => look(world, player, event.value),
        (InputAction::Jump, ActionPhase::Started) => jump(world, player),
        (InputAction::Jump, ActionPhase::Completed) => stop_jumping(world, player),
        (InputAction::EnterInspect, ActionPhase::Triggered) => {
            inspect::enter_inspect(world, player);
        }
        (InputAction::ExitInspect, ActionPhase::Triggered) => {
            inspect::exit_inspect(world, player);
        }
        (InputAction::RotateInspect, ActionPhase::Triggered) => {
            inspect::rotate_inspect(world, player, event.value)
        }
        _ => {}
    }
}

/// Add movement input along the character's facing: `value.y` forward, `value.x` right.
pub fn move_character(world: &mut World, player: Entity, value: Vec2) {
    if world.get::<PlayerController>(player).is_none() {
        return;
    }
    let Some(transform) = world.get::<Transform>(player) else {
        return;
    };
    let forward = flatten(transform.forward());
    let right = flatten(transform.right());
    if let Some(mut movement) = world.get_mut::<CharacterMovement>(player) {
        movement.pending_input += forward * value.y + right * value.x;
    }
}

/// Add yaw (`value.x`) and pitch (`value.y`) to the control rotation.
pub fn look(world: &mut World, player: Entity, value: Vec2) {
    let Some(mut controller) = world.get_mut::<PlayerController>(player) else {
        return;
    };
    controller.add_yaw_input(value.x);
    controller.add_pitch_input(value.y);
    let controller = *controller;
    apply_control_rotation(world, player, &controller);
}

/// The body turns with the control yaw; the camera tilts with the control pitch.
fn apply_control_rotation(world: &mut World, player: Entity, controller: &PlayerController) {
    if let Some(mut transform) = world.get_mut::<Transform>(player) {
        transform.rotation = Quat::from_rotation_y(controller.yaw);
    }
    let Some(&CharacterRig { camera, .. }) = world.get::<CharacterRig>(player) else {
        return;
    };
    if let Some(mut transform) = world.get_mut::<Transform>(camera) {
        transform.rotation = Quat::from_rotation_x(controller.pitch);
    }
}

pub fn jump(world: &mut World, player: Entity) {
    if let Some(mut movement) = world.get_mut::<CharacterMovement>(player) {
        movement.jump_requested = true;
    }
}

pub fn stop_jumping(world: &mut World, player: Entity) {
    if let Some(mut movement) = world.get_mut::<CharacterMovement>(player) {
        movement.jump_requested = false;
    }
}

/// Walk, jump and fall. The floor is found with a downward trace against
/// world-static geometry from where the capsule was at the start of the step.
pub fn character_movement(
    time: Res<FrameTime>,
    mut characters: Query<(Entity, &Character, &mut CharacterMovement, &mut Transform)>,
    colliders: Query<(Entity, &GlobalTransform, &Collider)>,
) {
    let dt = time.delta;

    for (entity, character, mut movement, mut transform) in &mut characters {
        let input = std::mem::take(&mut movement.pending_input).clamp_length_max(1.0);
        movement.velocity.x = input.x * movement.walk_speed;
        movement.velocity.z = input.z * movement.walk_speed;

        if movement.jump_requested && movement.grounded {
            movement.velocity.y = movement.jump_velocity;
            movement.grounded = false;
        }
        if !movement.grounded {
            movement.velocity.y -= movement.gravity * dt;
        }

        let previous = transform.position;
        let mut position = previous + movement.velocity * dt;

        let drop = (previous.y - position.y).max(0.0);
        let start = Vec3::new(position.x, previous.y, position.z);
        let reach = character.half_height + GROUND_SNAP + drop;
        let ignore = [entity];
        let floor = LineTrace::along(start, Vec3::NEG_Y, reach, CollisionChannel::WorldStatic)
            .ignoring(&ignore)
            .single(colliders.iter());

        match floor {
            Some(hit) if movement.velocity.y <= 0.0 => {
                position.y = hit.point.y + character.half_height;
                movement.velocity.y = 0.0;
                movement.grounded = true;
            }
            _ => movement.grounded = false,
        }

        if position.y < movement.kill_height {
            warn!("Character fell below {:.1}, respawning", movement.kill_height);
            position = movement.spawn_position;
            movement.velocity = Vec3::ZERO;
            movement.grounded = false;
        }

        transform.position = position;
    }
}

fn flatten(direction: Vec3) -> Vec3 {
    Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero()
}

fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

/// Unit-cube floor spanning [-half_size, half_size] on X/Z with its top at y = 0.
#[cfg(test)]
pub(crate) fn spawn_test_floor(world: &mut World, half_size: f32) -> Entity {
    use crate::engine::Color;

    let transform = Transform::from_position(Vec3::new(0.0, -0.1, 0.0))
        .with_scale(Vec3::new(half_size * 2.0, 0.2, half_size * 2.0));
    world
        .spawn((
            transform,
            GlobalTransform(transform.to_matrix()),
            Collider::unit_cube(CollisionChannel::WorldStatic),
            Color::rgb(0.3, 0.3, 0.3),
        ))
        .id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hierarchy::{propagate_transforms, world_matrix};

    struct Harness {
        world: World,
        schedule: Schedule,
        player: Entity,
    }

    impl Harness {
        fn new() -> Self {
            let mut world = World::new();
            world.insert_resource(FrameTime::default());
            spawn_test_floor(&mut world, 20.0);
            let player = spawn_character(
                &mut world,
                &CharacterConfig::default(),
                &InspectConfig::default(),
                70.0,
            )
            .unwrap();

            let mut schedule = Schedule::default();
            schedule.add_systems((character_movement, propagate_transforms).chain());
            Self { world, schedule, player }
        }

        fn step(&mut self, dt: f32) {
            self.world.resource_mut::<FrameTime>().advance(dt);
            self.schedule.run(&mut self.world);
        }

        fn position(&self) -> Vec3 {
            self.world.get::<Transform>(self.player).unwrap().position
        }

        fn movement(&self) -> CharacterMovement {
            *self.world.get::<CharacterMovement>(self.player).unwrap()
        }
    }

    #[test]
    fn character_settles_on_the_floor() {
        let mut h = Harness::new();
        for _ in 0..5 {
            h.step(1.0 / 60.0);
        }
        assert!(h.movement().grounded);
        assert!((h.position().y - 0.96).abs() < 1e-4);
    }

    #[test]
    fn forward_input_walks_along_facing() {
        let mut h = Harness::new();
        h.step(1.0 / 60.0);
        let start = h.position();

        move_character(&mut h.world, h.player, Vec2::Y);
        h.step(0.1);

        let moved = h.position() - start;
        assert!(moved.z < -0.5);
        assert!(moved.x.abs() < 1e-4);
    }

    #[test]
    fn diagonal_input_is_not_faster() {
        let mut h = Harness::new();
        h.step(1.0 / 60.0);
        let start = h.position();

        move_character(&mut h.world, h.player, Vec2::new(1.0, 1.0));
        h.step(0.1);

        let moved = (h.position() - start) * Vec3::new(1.0, 0.0, 1.0);
        assert!((moved.length() - 0.6).abs() < 1e-3);
    }

    #[test]
    fn jump_only_launches_when_grounded() {
        let mut h = Harness::new();
        h.step(1.0 / 60.0);

        jump(&mut h.world, h.player);
        h.step(1.0 / 60.0);
        assert!(!h.movement().grounded);
        assert!(h.movement().velocity.y > 0.0);
        let vy = h.movement().velocity.y;

        // Still held mid-air: no second launch.
        h.step(1.0 / 60.0);
        assert!(h.movement().velocity.y < vy);

        stop_jumping(&mut h.world, h.player);
        for _ in 0..120 {
            h.step(1.0 / 60.0);
        }
        assert!(h.movement().grounded);
    }

    #[test]
    fn look_turns_body_and_tilts_camera_with_clamped_pitch() {
        let mut h = Harness::new();
        look(&mut h.world, h.player, Vec2::new(0.0, 1.0e6));

        let controller = *h.world.get::<PlayerController>(h.player).unwrap();
        assert!((controller.pitch - 89.0_f32.to_radians()).abs() < 1e-5);

        look(&mut h.world, h.player, Vec2::new(100.0, 0.0));
        let body = h.world.get::<Transform>(h.player).unwrap();
        // Positive x input turns right, away from -Z toward +X.
        assert!(body.forward().x > 0.0);

        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        let eye = world_matrix(&h.world, rig.camera).unwrap();
        assert!(eye.transform_vector3(Vec3::NEG_Z).y > 0.99);
    }

    #[test]
    fn unpossessed_character_ignores_move_and_look() {
        let mut h = Harness::new();
        h.world.entity_mut(h.player).remove::<PlayerController>();

        move_character(&mut h.world, h.player, Vec2::Y);
        look(&mut h.world, h.player, Vec2::new(100.0, 0.0));

        assert_eq!(h.movement().pending_input, Vec3::ZERO);
        assert_eq!(h.world.get::<Transform>(h.player).unwrap().rotation, Quat::IDENTITY);
    }

    #[test]
    fn falling_below_kill_height_respawns() {
        let mut h = Harness::new();
        h.world.get_mut::<Transform>(h.player).unwrap().position = Vec3::new(100.0, -19.99, 100.0);
        h.world.get_mut::<CharacterMovement>(h.player).unwrap().velocity.y = -5.0;

        h.step(0.1);

        assert_eq!(h.position(), CharacterConfig::default().spawn_position);
    }

    #[test]
    fn rig_places_anchor_in_front_of_the_eye() {
        let h = Harness::new();
        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        let eye = world_matrix(&h.world, rig.camera).unwrap().w_axis.truncate();
        let anchor = world_matrix(&h.world, rig.anchor).unwrap().w_axis.truncate();
        assert!(anchor.abs_diff_eq(eye + Vec3::new(0.0, 0.0, -0.9), 1e-5));
    }

    #[test]
    fn hands_ride_on_the_camera() {
        use crate::engine::{Children, Color, Parent};

        let mut h = Harness::new();
        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        let mut names = h.world.query::<(Entity, &Name)>();
        let hands = names
            .iter(&h.world)
            .find(|(_, name)| name.0 == "Hands")
            .map(|(entity, _)| entity)
            .unwrap();

        assert_eq!(h.world.get::<Parent>(hands), Some(&Parent(rig.camera)));
        assert!(h.world.get::<Children>(rig.camera).unwrap().0.contains(&hands));
        assert!(h.world.get::<Color>(hands).is_some());
    }
}
