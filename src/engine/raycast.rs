// Line traces against box colliders
//
// Each collider is an oriented box: its half extents in local space, placed by
// the entity's GlobalTransform. The segment is moved into the box's local space
// and clipped against the three slabs, so rotation and scale come for free.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::components::{Collider, CollisionChannel, GlobalTransform};

const PARALLEL_EPSILON: f32 = 1e-8;

/// A segment query restricted to one collision channel.
#[derive(Debug, Clone)]
pub struct LineTrace<'a> {
    pub start: Vec3,
    pub end: Vec3,
    pub channel: CollisionChannel,
    /// Entities the trace passes through regardless of channel.
    pub ignore: &'a [Entity],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    pub entity: Entity,
    pub point: Vec3,
    /// World distance from the trace start.
    pub distance: f32,
}

impl<'a> LineTrace<'a> {
    pub fn new(start: Vec3, end: Vec3, channel: CollisionChannel) -> Self {
        Self { start, end, channel, ignore: &[] }
    }

    /// Trace from `start` along `direction` for `length` world units.
    pub fn along(start: Vec3, direction: Vec3, length: f32, channel: CollisionChannel) -> Self {
        Self::new(start, start + direction.normalize_or_zero() * length, channel)
    }

    pub fn ignoring(mut self, ignore: &'a [Entity]) -> Self {
        self.ignore = ignore;
        self
    }

    /// Closest blocking hit, if any.
    pub fn single<'w>(
        &self,
        colliders: impl IntoIterator<Item = (Entity, &'w GlobalTransform, &'w Collider)>,
    ) -> Option<TraceHit> {
        let segment = self.end - self.start;
        let length = segment.length();

        let mut best: Option<(f32, Entity)> = None;
        for (entity, global, collider) in colliders {
            if collider.channel != self.channel || self.ignore.contains(&entity) {
                continue;
            }
            if global.0.determinant().abs() < PARALLEL_EPSILON {
                continue;
            }
            let inverse = global.0.inverse();
            let origin = inverse.transform_point3(self.start);
            let direction = inverse.transform_vector3(segment);
            let Some(fraction) = clip_segment_to_box(origin, direction, collider.half_extents) else {
                continue;
            };
            if best.is_none_or(|(closest, _)| fraction < closest) {
                best = Some((fraction, entity));
            }
        }

        best.map(|(fraction, entity)| TraceHit {
            entity,
            point: self.start + segment * fraction,
            distance: length * fraction,
        })
    }
}

/// Entry fraction in [0, 1] of the segment `origin + direction * t` into the
/// axis-aligned box [-half, half]. A start inside the box enters at 0.
fn clip_segment_to_box(origin: Vec3, direction: Vec3, half: Vec3) -> Option<f32> {
    let mut enter = 0.0_f32;
    let mut exit = 1.0_f32;

    for axis in 0..3 {
        let (o, d, h) = (origin[axis], direction[axis], half[axis]);
        if d.abs() < PARALLEL_EPSILON {
            if o < -h || o > h {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut near, mut far) = ((-h - o) * inv, (h - o) * inv);
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        enter = enter.max(near);
        exit = exit.min(far);
        if enter > exit {
            return None;
        }
    }

    Some(enter)
}
