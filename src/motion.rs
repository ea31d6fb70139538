//! Per-tick motion state: scripted sine animation blended with
//! pointer-driven damped rotation.

use glam::{Vec2, Vec3};

use crate::constants::{
    MAX_POINTER_ROTATION, POINTER_SENSITIVITY, ROTATION_LERP_FACTOR, ROTATION_SWAY_AMPLITUDE,
    ROTATION_SWAY_SPEED, TILT_AMPLITUDE, TILT_SPEED, VERTICAL_BOB_AMPLITUDE, VERTICAL_BOB_SPEED,
};

/// Pose written into the model root once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelPose {
    pub position: Vec3,
    /// Euler rotation in radians, X then Y then Z.
    pub rotation: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct MotionConfig {
    pub animate: bool,
    pub max_rotation: f32,
    pub sensitivity: f32,
    pub smoothing: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            animate: true,
            max_rotation: MAX_POINTER_ROTATION,
            sensitivity: POINTER_SENSITIVITY,
            smoothing: ROTATION_LERP_FACTOR,
        }
    }
}

/// Pointer-rotation state. `current` only ever moves by fixed-ratio lerp
/// toward `target`; it never jumps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub target: Vec2,
    pub current: Vec2,
}

/// Rotation target for a pointer position normalized to [-1, 1] on both
/// axes (origin top-left, so the surface center is zero).
pub fn pointer_rotation_target(normalized: Vec2, max_rotation: f32, sensitivity: f32) -> Vec2 {
    Vec2::new(
        -normalized.y * max_rotation * sensitivity,
        normalized.x * max_rotation * sensitivity,
    )
}

pub struct MotionController {
    config: MotionConfig,
    state: MotionState,
}

impl MotionController {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: MotionState::default(),
        }
    }

    pub fn animate(&self) -> bool {
        self.config.animate
    }

    pub fn set_animate(&mut self, animate: bool) {
        self.config.animate = animate;
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// One state transition per tick. `elapsed_seconds` is the monotonic
    /// animation clock; `pointer` is the latest pointer position in
    /// [-1, 1] coordinates, or `None` after the pointer left the surface.
    pub fn update(&mut self, elapsed_seconds: f32, pointer: Option<Vec2>) -> ModelPose {
        self.state.target = match pointer {
            Some(normalized) => {
                pointer_rotation_target(normalized, self.config.max_rotation, self.config.sensitivity)
            }
            None => Vec2::ZERO,
        };

        let mut pose = ModelPose::default();
        if self.config.animate {
            pose.position.y =
                (elapsed_seconds * VERTICAL_BOB_SPEED).sin() * VERTICAL_BOB_AMPLITUDE;
            pose.rotation.y =
                (elapsed_seconds * ROTATION_SWAY_SPEED).sin() * ROTATION_SWAY_AMPLITUDE;
            pose.rotation.z = (elapsed_seconds * TILT_SPEED).sin() * TILT_AMPLITUDE;
        }

        self.state.current = self
            .state
            .current
            .lerp(self.state.target, self.config.smoothing);

        // Pointer rotation always controls X/Y; the Y write supersedes the
        // sway term above.
        pose.rotation.x = -self.state.current.x;
        pose.rotation.y = self.state.current.y;

        pose
    }
}
