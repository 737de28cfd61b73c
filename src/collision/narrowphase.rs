use glam::Vec3;

use crate::{core::Aabb, utils::math::axis_sign};

/// Minimum-translation result of an AABB overlap test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Signed unit axis from A toward B.
    pub normal: Vec3,
    pub depth: f32,
    /// 0, 1 or 2 for x, y, z.
    pub axis: usize,
}

/// Separating-axis test for two boxes.
///
/// The axis with the smallest positive overlap wins; ties resolve to the
/// earlier axis in x, y, z order. Returns `None` when any axis does not overlap.
pub fn compute_penetration(a: &Aabb, b: &Aabb) -> Option<Penetration> {
    let delta = b.center() - a.center();
    let overlap = (a.half_extents() + b.half_extents()) - delta.abs();

    let mut axis = 0;
    for candidate in 0..3 {
        if overlap[candidate].is_nan() || overlap[candidate] <= 0.0 {
            return None;
        }
        if overlap[candidate] < overlap[axis] {
            axis = candidate;
        }
    }

    let mut normal = Vec3::ZERO;
    normal[axis] = axis_sign(delta[axis]);

    Some(Penetration {
        normal,
        depth: overlap[axis],
        axis,
    })
}

/// Contact point for an overlapping pair.
///
/// Non-collision axes take the midpoint of the overlap region; the collision
/// axis is snapped onto A's face that points toward B.
pub fn estimate_contact_point(a: &Aabb, b: &Aabb, axis: usize, normal: Vec3) -> Vec3 {
    let overlap_min = a.min.max(b.min);
    let overlap_max = a.max.min(b.max);
    let mut point = (overlap_min + overlap_max) * 0.5;

    point[axis] = if normal[axis] >= 0.0 {
        a.max[axis]
    } else {
        a.min[axis]
    };
    point
}
