//! Shared configuration constants. The pattern-shader values here are
//! interpolated into the WGSL source so host math and shader math cannot
//! diverge.

use glam::Vec3;

/// Offscreen scene target size as a fraction of the viewport.
pub const OFFSCREEN_SCALE: f32 = 0.5;

/// Number of stylization cells across the viewport width.
pub const TARGET_CELLS_HORIZONTAL: u32 = 150;

/// Width of one glyph strip in the pattern atlas, pixels.
pub const PATTERN_STRIP_WIDTH_PX: f32 = 64.0;

/// Total pattern atlas width, pixels. Six strips at 64 px each.
pub const PATTERN_ATLAS_WIDTH_PX: f32 = 384.0;

/// Scene samples at or below this brightness render as flat background.
pub const INTENSITY_FLOOR: f32 = 0.01;

/// Off-white background, normalized RGB.
pub const BACKGROUND_COLOR: [f32; 3] = [250.0 / 255.0, 250.0 / 255.0, 250.0 / 255.0];

// Orthographic camera observing the model. Immutable after construction.
pub const CAMERA_HALF_EXTENT: f32 = 1.6;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 20.0;
pub const CAMERA_EYE: Vec3 = Vec3::new(0.0, 2.0, 1.5);
pub const CAMERA_TARGET: Vec3 = Vec3::ZERO;

/// Loaded models are rescaled so their smallest bounding-box extent
/// matches this.
pub const MODEL_NORMALIZED_MIN_EXTENT: f32 = 2.0;

// Scripted animation: phase speeds (rad/s) and amplitudes.
pub const VERTICAL_BOB_SPEED: f32 = 1.0;
pub const ROTATION_SWAY_SPEED: f32 = 0.6;
pub const TILT_SPEED: f32 = 0.8;
pub const VERTICAL_BOB_AMPLITUDE: f32 = 0.2;
pub const ROTATION_SWAY_AMPLITUDE: f32 = 0.1;
pub const TILT_AMPLITUDE: f32 = 0.05;

/// Pointer-follow rotation ceiling, radians (45 degrees).
pub const MAX_POINTER_ROTATION: f32 = std::f32::consts::FRAC_PI_4;

/// Fraction of the rotation ceiling the pointer can actually reach.
pub const POINTER_SENSITIVITY: f32 = 0.3;

/// Fixed-ratio smoothing step applied to the pointer rotation each tick.
pub const ROTATION_LERP_FACTOR: f32 = 0.1;
