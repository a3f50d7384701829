//! Integration tests for weft-math.

use approx::assert_relative_eq;
use weft_math::{DQuat, DVec3, MotionCurve, MotionKey, Transform};

fn assert_vec_eq(a: DVec3, b: DVec3) {
    assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
    assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
    assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
}

fn slide_and_turn() -> MotionCurve {
    MotionCurve::new(vec![
        MotionKey {
            time: 1.0,
            transform: Transform::new(
                DVec3::new(2.0, 0.0, 0.0),
                DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2),
                1.0,
            ),
        },
        MotionKey {
            time: 0.0,
            transform: Transform::IDENTITY,
        },
    ])
}

// ─── Transform Tests ──────────────────────────────────────────

#[test]
fn identity_leaves_points() {
    let p = DVec3::new(1.0, -2.0, 3.0);
    assert_vec_eq(Transform::IDENTITY.apply(p), p);
}

#[test]
fn compose_then_inverse_is_identity() {
    let t = Transform::new(
        DVec3::new(0.5, 1.0, -3.0),
        DQuat::from_rotation_z(0.7),
        2.0,
    );
    let p = DVec3::new(0.3, 0.2, 0.1);
    assert_vec_eq((t * t.inverse()).apply(p), p);
    assert_vec_eq((t.inverse() * t).apply(p), p);
}

#[test]
fn compose_applies_right_first() {
    let shift = Transform::from_translation(DVec3::X);
    let turn = Transform::new(DVec3::ZERO, DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2), 1.0);
    // Turn then shift: X -> Y -> Y + X.
    assert_vec_eq((shift * turn).apply(DVec3::X), DVec3::new(1.0, 1.0, 0.0));
}

// ─── Motion Curve Tests ───────────────────────────────────────

#[test]
fn keys_are_sorted() {
    let curve = slide_and_turn();
    assert!(curve.is_well_ordered());
    assert_eq!(curve.keys()[0].time, 0.0);
}

#[test]
fn clamps_outside_key_range() {
    let curve = slide_and_turn();
    let before = curve.evaluate(-1.0);
    assert_eq!(before.transform, Transform::IDENTITY);
    assert_eq!(before.linear_velocity, DVec3::ZERO);
    assert_vec_eq(curve.transform_at(5.0).translation, DVec3::new(2.0, 0.0, 0.0));
}

#[test]
fn midpoint_interpolation() {
    let curve = slide_and_turn();
    let mid = curve.evaluate(0.5);
    assert_vec_eq(mid.transform.translation, DVec3::new(1.0, 0.0, 0.0));
    assert_vec_eq(mid.linear_velocity, DVec3::new(2.0, 0.0, 0.0));
    assert_relative_eq!(mid.angular_velocity.y, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
}

#[test]
fn point_velocity_matches_finite_difference() {
    let curve = slide_and_turn();
    let p = DVec3::new(0.0, 0.0, 1.0);
    let (_, v) = curve.evaluate(0.4).apply(p);
    let h = 1e-6;
    let fd = (curve.transform_at(0.4 + h).apply(p) - curve.transform_at(0.4 - h).apply(p)) / (2.0 * h);
    assert_relative_eq!(v.x, fd.x, epsilon = 1e-5);
    assert_relative_eq!(v.y, fd.y, epsilon = 1e-5);
    assert_relative_eq!(v.z, fd.z, epsilon = 1e-5);
}

#[test]
fn relative_transform_carries_pose() {
    let curve = slide_and_turn();
    let p = DVec3::new(0.1, 0.2, 0.3);
    let at_a = curve.transform_at(0.25).apply(p);
    let at_b = curve.transform_at(0.75).apply(p);
    assert_vec_eq(curve.relative(0.25, 0.75).apply(at_a), at_b);
}

#[test]
fn empty_curve_is_identity() {
    let curve = MotionCurve::default();
    assert!(curve.is_empty());
    assert_eq!(curve.relative(0.0, 1.0), Transform::IDENTITY);
}

#[test]
fn curve_from_json() {
    let json = r#"[{"time": 0.0}, {"time": 2.0, "translation": [0.0, 1.0, 0.0]}]"#;
    let curve: MotionCurve = serde_json::from_str(json).unwrap();
    assert_eq!(curve.keys().len(), 2);
    assert_vec_eq(curve.transform_at(1.0).translation, DVec3::new(0.0, 0.5, 0.0));
}
