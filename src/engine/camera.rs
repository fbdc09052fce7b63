// First-person camera
//
// The camera is an ordinary entity in the scene graph: it rides on the
// character it is attached to and is pitched by the controller, so the eye is
// simply its GlobalTransform. This component only carries the projection.

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

use super::components::GlobalTransform;

#[derive(Component, Debug, Clone, Copy)]
pub struct FirstPersonCamera {
    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for FirstPersonCamera {
    fn default() -> Self {
        Self {
            fov: 70.0_f32.to_radians(),
            near: 0.05,
            far: 500.0,
        }
    }
}

impl FirstPersonCamera {
    pub fn with_fov_degrees(fov_degrees: f32) -> Self {
        Self { fov: fov_degrees.to_radians(), ..Self::default() }
    }

    /// View matrix: inverse of the eye's world matrix, scale stripped.
    pub fn view_matrix(eye: &GlobalTransform) -> Mat4 {
        let (_, rotation, translation) = eye.0.to_scale_rotation_translation();
        Mat4::from_rotation_translation(rotation, translation).inverse()
    }

    /// Perspective projection matrix.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, eye: &GlobalTransform, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * Self::view_matrix(eye)
    }
}

/// Eye position and look direction of a camera entity.
pub fn eye_ray(eye: &GlobalTransform) -> (Vec3, Vec3) {
    (eye.translation(), eye.forward())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::Transform;
    use glam::Quat;

    #[test]
    fn view_matrix_maps_eye_to_origin_looking_down_negative_z() {
        let eye = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_y(0.7));
        let global = GlobalTransform(eye.to_matrix());
        let view = FirstPersonCamera::view_matrix(&global);

        assert!(view.transform_point3(eye.position).abs_diff_eq(Vec3::ZERO, 1e-5));
        let ahead = eye.position + eye.forward() * 4.0;
        assert!(view.transform_point3(ahead).abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), 1e-5));
    }

    #[test]
    fn eye_ray_follows_rotation() {
        let eye = Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        let (_, forward) = eye_ray(&GlobalTransform(eye.to_matrix()));
        assert!(forward.abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
