// Parent/child scene graph
//
// Local transforms live in `Transform`; world matrices are either computed on
// demand (world_matrix, walking up the Parent chain) or written once per frame
// into `GlobalTransform` by propagate_transforms.

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use thiserror::Error;

use super::components::{GlobalTransform, Transform};

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(pub Vec<Entity>);

/// How the child's transform is treated when it is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachRule {
    /// The child's local transform is kept and becomes relative to the parent.
    KeepRelative,
    /// The child stays where it is in the world.
    KeepWorld,
    /// Location and rotation snap onto the parent; world scale is kept.
    SnapToTarget,
}

/// How the child's transform is treated when it is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachRule {
    KeepRelative,
    KeepWorld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("entity {0:?} has no transform")]
    MissingTransform(Entity),
    #[error("attaching {child:?} to {parent:?} would create a cycle")]
    Cycle { child: Entity, parent: Entity },
}

/// World matrix of `entity`, walking up its parents. A dangling parent ends the walk.
pub fn world_matrix(world: &World, entity: Entity) -> Option<Mat4> {
    let mut matrix = world.get::<Transform>(entity)?.to_matrix();
    let mut current = entity;
    while let Some(&Parent(parent)) = world.get::<Parent>(current) {
        let Some(parent_local) = world.get::<Transform>(parent) else {
            break;
        };
        matrix = parent_local.to_matrix() * matrix;
        current = parent;
    }
    Some(matrix)
}

/// World transform of `entity`. Root entities return their local transform
/// untouched, so a snapshot of a root reapplies bit-for-bit.
pub fn world_transform(world: &World, entity: Entity) -> Option<Transform> {
    if world.get::<Parent>(entity).is_none() {
        return world.get::<Transform>(entity).copied();
    }
    world_matrix(world, entity).map(Transform::from_matrix)
}

/// Place `entity` at `target` in world space, whatever its parent.
pub fn set_world_transform(world: &mut World, entity: Entity, target: Transform) -> bool {
    let local = match world.get::<Parent>(entity).copied() {
        Some(Parent(parent)) => match world_matrix(world, parent) {
            Some(parent_matrix) => Transform::from_matrix(parent_matrix.inverse() * target.to_matrix()),
            None => target,
        },
        None => target,
    };
    match world.get_mut::<Transform>(entity) {
        Some(mut transform) => {
            *transform = local;
            true
        }
        None => false,
    }
}

fn is_ancestor(world: &World, ancestor: Entity, entity: Entity) -> bool {
    let mut current = entity;
    while let Some(&Parent(parent)) = world.get::<Parent>(current) {
        if parent == ancestor {
            return true;
        }
        current = parent;
    }
    false
}

fn unlink_from_parent(world: &mut World, child: Entity) -> Option<Entity> {
    let Parent(parent) = world.get::<Parent>(child).copied()?;
    remove_child(world, parent, child);
    world.entity_mut(child).remove::<Parent>();
    Some(parent)
}

/// Drop `child` from `parent`'s `Children`. Also works for a child that was
/// despawned while still linked. Returns false when it was not listed.
pub fn remove_child(world: &mut World, parent: Entity, child: Entity) -> bool {
    let Some(mut children) = world.get_mut::<Children>(parent) else {
        return false;
    };
    let before = children.0.len();
    children.0.retain(|&c| c != child);
    children.0.len() != before
}

/// Attach `child` under `parent`, replacing any previous parent.
pub fn attach_to(
    world: &mut World,
    child: Entity,
    parent: Entity,
    rule: AttachRule,
) -> Result<(), HierarchyError> {
    let child_matrix = world_matrix(world, child).ok_or(HierarchyError::MissingTransform(child))?;
    let parent_matrix = world_matrix(world, parent).ok_or(HierarchyError::MissingTransform(parent))?;
    if child == parent || is_ancestor(world, child, parent) {
        return Err(HierarchyError::Cycle { child, parent });
    }

    let current = world.get::<Transform>(child).copied().unwrap_or_default();
    let local = match rule {
        AttachRule::KeepRelative => current,
        AttachRule::KeepWorld => Transform::from_matrix(parent_matrix.inverse() * child_matrix),
        AttachRule::SnapToTarget => {
            let (child_scale, _, _) = child_matrix.to_scale_rotation_translation();
            let (parent_scale, _, _) = parent_matrix.to_scale_rotation_translation();
            Transform::IDENTITY.with_scale(relative_scale(child_scale, parent_scale))
        }
    };

    unlink_from_parent(world, child);
    world.entity_mut(child).insert((Parent(parent), local));
    match world.get_mut::<Children>(parent) {
        Some(mut children) => children.0.push(child),
        None => {
            world.entity_mut(parent).insert(Children(vec![child]));
        }
    }
    Ok(())
}

/// Detach `child` from its parent. Returns false when it had none.
pub fn detach(world: &mut World, child: Entity, rule: DetachRule) -> bool {
    let world_before = world_matrix(world, child);
    if unlink_from_parent(world, child).is_none() {
        return false;
    }
    if let (DetachRule::KeepWorld, Some(matrix)) = (rule, world_before) {
        if let Some(mut transform) = world.get_mut::<Transform>(child) {
            *transform = Transform::from_matrix(matrix);
        }
    }
    true
}

fn relative_scale(child: Vec3, parent: Vec3) -> Vec3 {
    let divide = |c: f32, p: f32| if p.abs() > f32::EPSILON { c / p } else { c };
    Vec3::new(
        divide(child.x, parent.x),
        divide(child.y, parent.y),
        divide(child.z, parent.z),
    )
}

/// Write every entity's world matrix into its `GlobalTransform`, roots first.
pub fn propagate_transforms(
    roots: Query<Entity, (With<Transform>, Without<Parent>)>,
    nodes: Query<(&Transform, Option<&Children>)>,
    mut globals: Query<&mut GlobalTransform>,
) {
    let mut stack: Vec<(Entity, Mat4)> = roots.iter().map(|e| (e, Mat4::IDENTITY)).collect();
    while let Some((entity, parent_matrix)) = stack.pop() {
        let Ok((transform, children)) = nodes.get(entity) else {
            continue;
        };
        let matrix = parent_matrix * transform.to_matrix();
        if let Ok(mut global) = globals.get_mut(entity) {
            global.0 = matrix;
        }
        if let Some(children) = children {
            stack.extend(children.0.iter().map(|&child| (child, matrix)));
        }
    }
}
