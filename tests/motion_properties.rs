use glam::{Vec2, Vec3};

use amv::constants::{
    MAX_POINTER_ROTATION, POINTER_SENSITIVITY, ROTATION_LERP_FACTOR, ROTATION_SWAY_AMPLITUDE,
    ROTATION_SWAY_SPEED, TILT_AMPLITUDE, TILT_SPEED, VERTICAL_BOB_AMPLITUDE, VERTICAL_BOB_SPEED,
};
use amv::motion::{pointer_rotation_target, MotionConfig, MotionController};

fn controller(animate: bool) -> MotionController {
    MotionController::new(MotionConfig {
        animate,
        ..MotionConfig::default()
    })
}

#[test]
fn smoothing_converges_within_a_thousandth_in_100_ticks() {
    let mut motion = controller(false);
    let pointer = Vec2::new(1.0, 0.0);
    let target = pointer_rotation_target(pointer, MAX_POINTER_ROTATION, POINTER_SENSITIVITY);

    let mut previous_distance = f32::INFINITY;
    for tick in 0..100 {
        motion.update(tick as f32 * 0.016, Some(pointer));
        let distance = motion.state().current.distance(target);
        assert!(
            distance <= previous_distance + 1e-7,
            "distance to target should never grow (tick {tick})"
        );
        previous_distance = distance;
    }
    assert!(
        previous_distance < 1e-3,
        "smoothing should converge, still {previous_distance} away after 100 ticks"
    );
}

#[test]
fn rest_state_is_a_fixed_point() {
    let mut motion = controller(false);
    let pose = motion.update(0.0, None);
    assert_eq!(pose.rotation, Vec3::ZERO);
    assert_eq!(pose.position, Vec3::ZERO);
    assert_eq!(motion.state().current, Vec2::ZERO);

    let pose = motion.update(10.0, None);
    assert_eq!(pose.rotation, Vec3::ZERO);
}

#[test]
fn settled_pointer_pose_stops_moving() {
    let mut motion = controller(false);
    let pointer = Some(Vec2::new(0.25, 0.75));
    for tick in 0..400 {
        motion.update(tick as f32 * 0.016, pointer);
    }

    let settled = motion.state().current;
    motion.update(6.4, pointer);
    assert!(
        motion.state().current.distance(settled) < 1e-6,
        "a settled pose should not keep drifting"
    );
}

#[test]
fn pointer_leave_recenters_rotation() {
    let mut motion = controller(false);
    for tick in 0..50 {
        motion.update(tick as f32 * 0.016, Some(Vec2::ONE));
    }
    assert!(motion.state().current.length() > 0.0);

    for tick in 50..250 {
        motion.update(tick as f32 * 0.016, None);
    }
    assert_eq!(motion.state().target, Vec2::ZERO);
    assert!(
        motion.state().current.length() < 1e-3,
        "rotation should decay back to center after the pointer leaves"
    );
}

#[test]
fn pointer_rotation_stays_clamped_for_any_position() {
    let bound = MAX_POINTER_ROTATION * POINTER_SENSITIVITY + 1e-6;
    for ix in 0..=4 {
        for iy in 0..=4 {
            let pointer = Vec2::new(ix as f32 / 2.0 - 1.0, iy as f32 / 2.0 - 1.0);
            let mut motion = controller(true);
            for tick in 0..200 {
                let pose = motion.update(tick as f32 * 0.016, Some(pointer));
                assert!(
                    pose.rotation.x.abs() <= bound,
                    "rotation.x exceeded the clamp at pointer {pointer:?}"
                );
                assert!(
                    pose.rotation.y.abs() <= bound,
                    "rotation.y exceeded the clamp at pointer {pointer:?}"
                );
                assert!(pose.rotation.z.abs() <= TILT_AMPLITUDE + 1e-6);
            }
        }
    }
}

#[test]
fn pointer_rotation_overrides_idle_sway() {
    let mut motion = controller(true);
    // Elapsed time chosen so the sway term sits at its peak.
    let elapsed = std::f32::consts::FRAC_PI_2 / ROTATION_SWAY_SPEED;
    let pointer = Vec2::new(1.0, 0.0);

    let pose = motion.update(elapsed, Some(pointer));
    let expected =
        pointer_rotation_target(pointer, MAX_POINTER_ROTATION, POINTER_SENSITIVITY)
            * ROTATION_LERP_FACTOR;
    assert!(
        (pose.rotation.y - expected.y).abs() < 1e-6,
        "pointer tracking must win the rotation.y write"
    );
    assert!(
        (pose.rotation.y - ROTATION_SWAY_AMPLITUDE).abs() > 0.05,
        "the sway term should not leak into rotation.y"
    );

    // Bob and tilt still run; only rotation.y is taken over.
    let bob = (elapsed * VERTICAL_BOB_SPEED).sin() * VERTICAL_BOB_AMPLITUDE;
    let tilt = (elapsed * TILT_SPEED).sin() * TILT_AMPLITUDE;
    assert!((pose.position.y - bob).abs() < 1e-6);
    assert!((pose.rotation.z - tilt).abs() < 1e-6);
}

#[test]
fn disabling_animation_freezes_position_but_not_pointer_tilt() {
    let mut motion = controller(false);
    let pose = motion.update(3.0, Some(Vec2::ONE));
    assert_eq!(pose.position, Vec3::ZERO);
    assert_eq!(pose.rotation.z, 0.0);
    // Pointer at the bottom-right corner pulls both axes positive.
    assert!(pose.rotation.x > 0.0);
    assert!(pose.rotation.y > 0.0);
}
