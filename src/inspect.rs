// Inspect mode: pick up whatever dynamic object is under the crosshair and
// hold it in front of the camera until the player lets go.
//
//   Idle ──EnterInspect (candidate present)──▶ Inspecting
//     ▲                                            │
//     └──────────────ExitInspect───────────────────┘
//
// While idle a forward trace from the eye keeps `candidate` and the prompt up
// to date. Entering snaps the object onto the anchor and swaps the default
// mapping context for the inspect one; exiting restores the object's world
// transform and swaps back.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec2};
use log::{debug, info, warn};

use crate::character::{CharacterRig, PlayerController};
use crate::config::InspectConfig;
use crate::engine::camera::eye_ray;
use crate::engine::hierarchy::{
    attach_to, detach, remove_child, set_world_transform, world_transform,
};
use crate::engine::{
    AttachRule, Collider, Color, DebugMessages, DetachRule, FirstPersonCamera, GlobalTransform,
    InputContextSwitch, InputMappings, LineTrace, Name, PlayerWidget, PromptSink, Transform,
};

/// Marks the point in front of the camera inspected objects are held at.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct InspectAnchor;

/// The object being inspected and where it was taken from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InspectTarget {
    pub entity: Entity,
    /// World transform before pickup, restored on exit.
    pub saved: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InspectMode {
    #[default]
    Idle,
    Inspecting(InspectTarget),
}

#[derive(Component, Debug, Clone, Default)]
pub struct InspectController {
    pub mode: InspectMode,
    /// Nearest inspectable object under the crosshair, refreshed while idle.
    pub candidate: Option<Entity>,
}

impl InspectController {
    pub fn is_inspecting(&self) -> bool {
        matches!(self.mode, InspectMode::Inspecting(_))
    }

    pub fn target(&self) -> Option<&InspectTarget> {
        match &self.mode {
            InspectMode::Inspecting(target) => Some(target),
            InspectMode::Idle => None,
        }
    }
}

/// Trace forward from each idle player's eye and update candidate and prompt.
pub fn scan_for_inspect_candidate(
    settings: Res<InspectConfig>,
    mut widget: ResMut<PlayerWidget>,
    mut players: Query<(Entity, &CharacterRig, &mut InspectController)>,
    eyes: Query<&GlobalTransform, With<FirstPersonCamera>>,
    colliders: Query<(Entity, &GlobalTransform, &Collider)>,
) {
    for (player, rig, mut inspect) in &mut players {
        if inspect.is_inspecting() {
            continue;
        }
        let Ok(eye) = eyes.get(rig.camera) else {
            continue;
        };

        let (start, forward) = eye_ray(eye);
        let ignore = [player];
        let hit = LineTrace::along(start, forward, settings.trace_distance, settings.trace_channel)
            .ignoring(&ignore)
            .single(colliders.iter());

        let candidate = hit.map(|hit| hit.entity);
        if candidate != inspect.candidate {
            debug!("Inspect candidate {:?} -> {:?}", inspect.candidate, candidate);
            inspect.candidate = candidate;
        }
        widget.set_prompt(candidate.is_some());
    }
}

/// Pick up the current candidate. Returns false, changing nothing, when already
/// inspecting, nothing is targeted, or the player lacks a controller, rig or
/// input mappings.
pub fn enter_inspect(world: &mut World, player: Entity) -> bool {
    let Some(inspect) = world.get::<InspectController>(player) else {
        return false;
    };
    if inspect.is_inspecting() {
        return false;
    }
    let Some(target) = inspect.candidate.filter(|&e| world.get::<Transform>(e).is_some()) else {
        return false;
    };
    if world.get::<PlayerController>(player).is_none() {
        debug!("Enter inspect ignored: {player:?} has no controller");
        return false;
    }
    let Some(anchor) = world.get::<CharacterRig>(player).map(|rig| rig.anchor) else {
        debug!("Enter inspect ignored: {player:?} has no inspect anchor");
        return false;
    };
    if !world.contains_resource::<InputMappings>() {
        debug!("Enter inspect ignored: no input mappings");
        return false;
    }
    let Some(saved) = world_transform(world, target) else {
        return false;
    };
    let settings = inspect_settings(world);

    if let Some(mut widget) = world.get_resource_mut::<PlayerWidget>() {
        widget.set_prompt(false);
    }
    if let Some(mut anchor_transform) = world.get_mut::<Transform>(anchor) {
        anchor_transform.rotation = Quat::IDENTITY;
    }
    if let Err(err) = attach_to(world, target, anchor, AttachRule::SnapToTarget) {
        warn!("Cannot inspect {target:?}: {err}");
        return false;
    }

    if let Some(mut inspect) = world.get_mut::<InspectController>(player) {
        inspect.mode = InspectMode::Inspecting(InspectTarget { entity: target, saved });
    }
    if let Some(mut mappings) = world.get_resource_mut::<InputMappings>() {
        swap_context(&mut *mappings, &settings.default_context, &settings.inspect_context);
    }

    info!("Inspecting {}", display_name(world, target));
    true
}

/// Put the inspected object back where it came from. Returns false when idle
/// or when the player lacks a controller or input mappings. An object that
/// vanished while held is skipped but the mode still returns to idle.
pub fn exit_inspect(world: &mut World, player: Entity) -> bool {
    let Some(target) = world.get::<InspectController>(player).and_then(|c| c.target().copied()) else {
        return false;
    };
    if world.get::<PlayerController>(player).is_none() {
        debug!("Exit inspect ignored: {player:?} has no controller");
        return false;
    }
    if !world.contains_resource::<InputMappings>() {
        debug!("Exit inspect ignored: no input mappings");
        return false;
    }
    let settings = inspect_settings(world);

    if world.get::<Transform>(target.entity).is_some() {
        detach(world, target.entity, DetachRule::KeepWorld);
        set_world_transform(world, target.entity, target.saved);
        info!("Put back {}", display_name(world, target.entity));
    } else {
        warn!("Inspected object {:?} no longer exists", target.entity);
        if let Some(&CharacterRig { anchor, .. }) = world.get::<CharacterRig>(player) {
            remove_child(world, anchor, target.entity);
        }
    }

    if let Some(mut inspect) = world.get_mut::<InspectController>(player) {
        inspect.mode = InspectMode::Idle;
        inspect.candidate = None;
    }
    if let Some(mut mappings) = world.get_resource_mut::<InputMappings>() {
        swap_context(&mut *mappings, &settings.inspect_context, &settings.default_context);
    }
    true
}

/// Rotation input while inspecting. Only acknowledges the input on screen for now.
pub fn rotate_inspect(world: &mut World, _player: Entity, value: Vec2) {
    debug!("Rotate inspect {value}");
    let settings = inspect_settings(world);
    if let Some(mut messages) = world.get_resource_mut::<DebugMessages>() {
        messages.push(settings.rotate_message, settings.rotate_message_seconds, Color::rgb(1.0, 0.0, 0.0));
    }
}

fn swap_context(switch: &mut impl InputContextSwitch, from: &str, to: &str) {
    switch.remove_mapping_context(from);
    switch.add_mapping_context(to, 0);
}

fn inspect_settings(world: &World) -> InspectConfig {
    world.get_resource::<InspectConfig>().cloned().unwrap_or_default()
}

fn display_name(world: &World, entity: Entity) -> String {
    match world.get::<Name>(entity) {
        Some(name) => name.0.clone(),
        None => format!("{entity:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{spawn_character, spawn_test_floor};
    use crate::config::{CharacterConfig, GameConfig};
    use crate::engine::hierarchy::{propagate_transforms, world_matrix};
    use crate::engine::{Children, CollisionChannel, Parent};
    use glam::Vec3;

    struct Harness {
        world: World,
        scan: Schedule,
        player: Entity,
        lantern: Entity,
    }

    impl Harness {
        fn new() -> Self {
            let config = GameConfig::default();
            let mut world = World::new();
            world.insert_resource(config.inspect.clone());
            world.insert_resource(PlayerWidget::new(config.inspect.prompt_text.clone()));
            world.insert_resource(DebugMessages::default());
            let mut mappings = InputMappings::new(config.input.contexts.clone());
            mappings.add_mapping_context(&config.inspect.default_context, 0);
            world.insert_resource(mappings);

            spawn_test_floor(&mut world, 20.0);
            let player = spawn_character(&mut world, &CharacterConfig::default(), &config.inspect, 70.0).unwrap();

            // Eye height is 0.96 + 0.6; the lantern sits dead ahead.
            let lantern_transform = Transform::from_position(Vec3::new(0.0, 1.56, 0.0))
                .with_rotation(Quat::from_rotation_y(0.35))
                .with_scale(Vec3::new(0.3, 0.4, 0.3));
            let lantern = world
                .spawn((
                    Name::new("Lantern"),
                    lantern_transform,
                    GlobalTransform::default(),
                    Collider::unit_cube(CollisionChannel::WorldDynamic),
                ))
                .id();

            let mut scan = Schedule::default();
            scan.add_systems((propagate_transforms, scan_for_inspect_candidate).chain());
            Self { world, scan, player, lantern }
        }

        fn scan(&mut self) {
            self.scan.run(&mut self.world);
        }

        fn controller(&self) -> &InspectController {
            self.world.get::<InspectController>(self.player).unwrap()
        }

        fn prompt_visible(&self) -> bool {
            self.world.resource::<PlayerWidget>().prompt_visible
        }

        fn active_contexts(&self) -> Vec<String> {
            self.world
                .resource::<InputMappings>()
                .active_names()
                .into_iter()
                .map(str::to_owned)
                .collect()
        }

        fn lantern_transform(&self) -> Transform {
            *self.world.get::<Transform>(self.lantern).unwrap()
        }

        fn turn_away(&mut self) {
            self.world.get_mut::<Transform>(self.player).unwrap().rotation = Quat::from_rotation_y(std::f32::consts::PI);
        }
    }

    #[test]
    fn scan_finds_the_object_under_the_crosshair() {
        let mut h = Harness::new();
        h.scan();
        assert_eq!(h.controller().candidate, Some(h.lantern));
        assert!(h.prompt_visible());

        h.turn_away();
        h.scan();
        assert_eq!(h.controller().candidate, None);
        assert!(!h.prompt_visible());
    }

    #[test]
    fn static_geometry_is_not_a_candidate() {
        let mut h = Harness::new();
        h.world.get_mut::<Collider>(h.lantern).unwrap().channel = CollisionChannel::WorldStatic;
        h.scan();
        assert_eq!(h.controller().candidate, None);
    }

    #[test]
    fn candidate_beyond_trace_distance_is_ignored() {
        let mut h = Harness::new();
        h.world.resource_mut::<InspectConfig>().trace_distance = 2.0;
        h.scan();
        assert_eq!(h.controller().candidate, None);
    }

    #[test]
    fn enter_and_exit_round_trip() {
        let mut h = Harness::new();
        let before = h.lantern_transform();
        h.scan();

        assert!(enter_inspect(&mut h.world, h.player));
        assert!(h.controller().is_inspecting());
        assert_eq!(h.controller().target().unwrap().entity, h.lantern);
        assert!(!h.prompt_visible());
        assert_eq!(h.active_contexts(), vec!["inspect".to_owned()]);

        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        assert_eq!(h.world.get::<Parent>(h.lantern), Some(&Parent(rig.anchor)));
        let held = world_matrix(&h.world, h.lantern).unwrap();
        let anchor = world_matrix(&h.world, rig.anchor).unwrap();
        let (held_scale, _, held_position) = held.to_scale_rotation_translation();
        assert!(held_position.abs_diff_eq(anchor.w_axis.truncate(), 1e-5));
        assert!(held_scale.abs_diff_eq(before.scale, 1e-5));

        assert!(exit_inspect(&mut h.world, h.player));
        assert!(!h.controller().is_inspecting());
        assert_eq!(h.controller().candidate, None);
        assert_eq!(h.world.get::<Parent>(h.lantern), None);
        assert_eq!(h.lantern_transform(), before);
        assert_eq!(h.active_contexts(), vec!["default".to_owned()]);
    }

    #[test]
    fn looking_around_while_inspecting_still_restores_the_starting_spot() {
        let mut h = Harness::new();
        let before = h.lantern_transform();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));

        crate::character::look(&mut h.world, h.player, Vec2::new(300.0, -120.0));
        h.world.get_mut::<Transform>(h.player).unwrap().position += Vec3::new(3.0, 0.0, -1.0);

        assert!(exit_inspect(&mut h.world, h.player));
        assert_eq!(h.lantern_transform(), before);
    }

    #[test]
    fn enter_twice_keeps_the_first_snapshot() {
        let mut h = Harness::new();
        let before = h.lantern_transform();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));
        let target = *h.controller().target().unwrap();

        assert!(!enter_inspect(&mut h.world, h.player));
        assert_eq!(h.controller().target(), Some(&target));
        assert_eq!(target.saved, before);
    }

    #[test]
    fn exit_while_idle_is_a_no_op() {
        let mut h = Harness::new();
        h.scan();
        let before = h.lantern_transform();

        assert!(!exit_inspect(&mut h.world, h.player));
        assert_eq!(h.controller().candidate, Some(h.lantern));
        assert_eq!(h.lantern_transform(), before);
        assert_eq!(h.active_contexts(), vec!["default".to_owned()]);
    }

    #[test]
    fn enter_without_candidate_is_a_no_op() {
        let mut h = Harness::new();
        h.turn_away();
        h.scan();

        assert!(!enter_inspect(&mut h.world, h.player));
        assert!(!h.controller().is_inspecting());
        assert_eq!(h.active_contexts(), vec!["default".to_owned()]);
    }

    #[test]
    fn enter_without_controller_or_mappings_is_a_no_op() {
        let mut h = Harness::new();
        h.scan();
        h.world.entity_mut(h.player).remove::<PlayerController>();
        assert!(!enter_inspect(&mut h.world, h.player));
        assert!(h.prompt_visible());

        let mut h = Harness::new();
        h.scan();
        h.world.remove_resource::<InputMappings>();
        assert!(!enter_inspect(&mut h.world, h.player));
        assert!(!h.controller().is_inspecting());
        assert_eq!(h.world.get::<Parent>(h.lantern), None);
    }

    #[test]
    fn enter_resets_anchor_rotation() {
        let mut h = Harness::new();
        h.scan();
        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        h.world.get_mut::<Transform>(rig.anchor).unwrap().rotation = Quat::from_rotation_z(1.0);

        assert!(enter_inspect(&mut h.world, h.player));
        assert_eq!(h.world.get::<Transform>(rig.anchor).unwrap().rotation, Quat::IDENTITY);
    }

    #[test]
    fn scan_is_suspended_while_inspecting() {
        let mut h = Harness::new();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));

        h.scan();
        assert!(!h.prompt_visible());
        assert_eq!(h.controller().target().unwrap().entity, h.lantern);
    }

    #[test]
    fn prompt_returns_on_the_first_scan_after_exit() {
        let mut h = Harness::new();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));
        assert!(exit_inspect(&mut h.world, h.player));
        assert!(!h.prompt_visible());

        h.scan();
        assert!(h.prompt_visible());
        assert_eq!(h.controller().candidate, Some(h.lantern));
    }

    #[test]
    fn exit_after_target_despawned_still_returns_to_idle() {
        let mut h = Harness::new();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));
        h.world.despawn(h.lantern);

        assert!(exit_inspect(&mut h.world, h.player));
        assert!(!h.controller().is_inspecting());
        assert_eq!(h.active_contexts(), vec!["default".to_owned()]);

        let rig = *h.world.get::<CharacterRig>(h.player).unwrap();
        let children = h.world.get::<Children>(rig.anchor).unwrap();
        assert!(children.0.is_empty());
    }

    #[test]
    fn rotate_posts_a_message_and_leaves_the_object_alone() {
        let mut h = Harness::new();
        h.scan();
        assert!(enter_inspect(&mut h.world, h.player));
        let held = h.lantern_transform();

        rotate_inspect(&mut h.world, h.player, Vec2::new(4.0, 2.0));

        let messages = h.world.resource::<DebugMessages>();
        let message = messages.iter().next().unwrap();
        assert_eq!(message.text, "Rotating");
        assert_eq!(message.color, Color::rgb(1.0, 0.0, 0.0));
        assert!((message.remaining - 1.0).abs() < 1e-6);
        assert_eq!(h.lantern_transform(), held);
    }
}
