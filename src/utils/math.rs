//! Additional math helpers layered on top of `glam`.

use std::f32::consts::TAU;

use glam::Vec3;

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wraps every Euler component into `[0, 2π)`.
pub fn wrap_euler(angles: Vec3) -> Vec3 {
    Vec3::new(
        wrap_angle(angles.x),
        wrap_angle(angles.y),
        wrap_angle(angles.z),
    )
}

/// Sign used for contact normals: non-negative deltas map to `+1`.
pub fn axis_sign(delta: f32) -> f32 {
    if delta < 0.0 {
        -1.0
    } else {
        1.0
    }
}
