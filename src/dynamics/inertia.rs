//! Box inertia helpers.
//!
//! Tensors are diagonal in body axes and stored as `Vec3`. The rotational
//! frame is not tracked, so applying a tensor is an element-wise product.

use glam::Vec3;

use crate::{
    config::{DEFAULT_HALF_EXTENTS, INERTIA_FLOOR, MAX_INVERSE_INERTIA},
    core::GameObject,
};

/// Collider half-extents scaled by the transform; unit cube without a collider.
pub fn world_half_extents(object: &GameObject) -> Vec3 {
    let transform = object.transform();
    match object.collider() {
        Some(collider) => collider.world_half_extents(transform),
        None => (Vec3::from_array(DEFAULT_HALF_EXTENTS) * transform.scale).abs(),
    }
}

/// Diagonal inertia of a solid box, floored to avoid singular thin shapes.
pub fn body_inertia_tensor(half_extents: Vec3, mass: f32) -> Vec3 {
    let size = half_extents * 2.0;
    let factor = mass / 12.0;
    Vec3::new(
        factor * (size.y * size.y + size.z * size.z),
        factor * (size.x * size.x + size.z * size.z),
        factor * (size.x * size.x + size.y * size.y),
    )
    .max(Vec3::splat(INERTIA_FLOOR))
}

/// Element-wise reciprocal clamped to [`MAX_INVERSE_INERTIA`].
pub fn invert_inertia(inertia: Vec3) -> Vec3 {
    inertia.recip().min(Vec3::splat(MAX_INVERSE_INERTIA))
}

/// World inverse inertia of an object; zero for anything the solver cannot rotate.
pub fn inverse_inertia_tensor(object: &GameObject) -> Vec3 {
    if !object.is_movable() {
        return Vec3::ZERO;
    }
    let inertia = body_inertia_tensor(world_half_extents(object), object.physics().mass);
    invert_inertia(inertia)
}

pub fn apply_inverse_inertia(inverse_tensor: Vec3, vector: Vec3) -> Vec3 {
    inverse_tensor * vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Collider, RigidBodyProperties};
    use approx::assert_relative_eq;

    fn cube(mass: f32, collider: Collider) -> GameObject {
        GameObject::new("cube")
            .with_physics(RigidBodyProperties::dynamic(mass))
            .with_collider(collider)
    }

    #[test]
    fn solid_cube_inertia_matches_closed_form() {
        let object = cube(2.0, Collider::cuboid(Vec3::splat(0.5)));
        let inertia = body_inertia_tensor(world_half_extents(&object), 2.0);
        let expected = (2.0 / 12.0) * (1.0 + 1.0);
        assert_relative_eq!(inertia.x, expected, epsilon = 1e-6);
        assert_relative_eq!(inertia.y, expected, epsilon = 1e-6);
        assert_relative_eq!(inertia.z, expected, epsilon = 1e-6);

        let inverse = inverse_inertia_tensor(&object);
        assert_relative_eq!(inverse.x, 1.0 / expected, epsilon = 1e-4);
        assert_relative_eq!(inverse.y, 1.0 / expected, epsilon = 1e-4);
        assert_relative_eq!(inverse.z, 1.0 / expected, epsilon = 1e-4);
    }

    #[test]
    fn static_collider_has_zero_inverse_inertia() {
        let object = cube(2.0, Collider::static_cuboid(Vec3::splat(0.5)));
        assert_eq!(inverse_inertia_tensor(&object), Vec3::ZERO);
    }

    #[test]
    fn invalid_mass_has_zero_inverse_inertia() {
        let mut object = cube(2.0, Collider::cuboid(Vec3::splat(0.5)));
        object.physics_mut().mass = f32::INFINITY;
        assert_eq!(inverse_inertia_tensor(&object), Vec3::ZERO);
    }

    #[test]
    fn degenerate_shapes_are_floored_and_clamped() {
        let inertia = body_inertia_tensor(Vec3::ZERO, 1.0);
        assert_eq!(inertia, Vec3::splat(INERTIA_FLOOR));
        assert_eq!(invert_inertia(inertia), Vec3::splat(MAX_INVERSE_INERTIA));
    }

    #[test]
    fn inverse_inertia_is_applied_per_axis() {
        let applied = apply_inverse_inertia(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0));
        assert_eq!(applied, Vec3::new(2.0, 4.0, 6.0));
    }
}
