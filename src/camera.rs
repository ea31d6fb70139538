//! Fixed orthographic camera for the offscreen scene pass.

use glam::{Mat4, Vec3};

use crate::constants::{CAMERA_EYE, CAMERA_FAR, CAMERA_HALF_EXTENT, CAMERA_NEAR, CAMERA_TARGET};

/// Symmetric orthographic camera. It observes the model, not the viewer:
/// position and frustum never change after construction.
#[derive(Debug, Clone, Copy)]
pub struct OrthographicCamera {
    half_extent: f32,
    near: f32,
    far: f32,
    eye: Vec3,
    target: Vec3,
}

impl OrthographicCamera {
    pub fn model_viewer() -> Self {
        Self {
            half_extent: CAMERA_HALF_EXTENT,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            eye: CAMERA_EYE,
            target: CAMERA_TARGET,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let projection = Mat4::orthographic_rh(
            -self.half_extent,
            self.half_extent,
            -self.half_extent,
            self.half_extent,
            self.near,
            self.far,
        );
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        projection * view
    }
}
