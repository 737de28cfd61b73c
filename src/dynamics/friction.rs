use glam::Vec3;

use crate::{
    config::SolverConfig,
    core::GameObject,
    dynamics::solver::{apply_contact_impulse, effective_mass, relative_velocity, Contact},
};

/// Coulomb friction for one contact, run right after its normal impulse.
///
/// The impulse that would cancel tangential slip is kept while it stays
/// inside the static cone; beyond that it is replaced by the kinetic limit
/// opposing the slip. Returns the signed impulse applied along the slip
/// direction.
pub fn apply_friction(
    body_a: &mut GameObject,
    body_b: &mut GameObject,
    contact: &Contact,
    normal_impulse: f32,
    config: &SolverConfig,
) -> f32 {
    let relative = relative_velocity(body_a, body_b, contact);
    let Some(tangent) = slip_direction(relative, contact.normal) else {
        return 0.0;
    };
    if relative.dot(tangent) <= config.friction_velocity_threshold {
        return 0.0;
    }

    let denominator = effective_mass(contact, tangent);
    if denominator <= f32::EPSILON {
        return 0.0;
    }

    let mut impulse = -relative.dot(tangent) / denominator;
    let static_limit = normal_impulse * contact.static_friction;
    if impulse.abs() > static_limit {
        impulse = -normal_impulse * contact.dynamic_friction;
    }
    let impulse = impulse.clamp(-config.max_friction_impulse, config.max_friction_impulse);

    if impulse != 0.0 {
        apply_contact_impulse(body_a, body_b, contact, tangent * impulse, config);
    }
    impulse
}

/// Tangent direction of the current slip at a contact, if any.
pub fn slip_direction(relative_velocity: Vec3, normal: Vec3) -> Option<Vec3> {
    let tangent = relative_velocity - normal * relative_velocity.dot(normal);
    let direction = tangent.normalize_or_zero();
    (direction != Vec3::ZERO).then_some(direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Collider, RigidBodyProperties, Transform};

    fn contact_on_floor(static_friction: f32, dynamic_friction: f32) -> Contact {
        Contact {
            object_a: 0,
            object_b: 1,
            normal: Vec3::Y,
            point: Vec3::ZERO,
            ra: Vec3::ZERO,
            rb: Vec3::new(0.0, -0.5, 0.0),
            penetration: 0.0,
            restitution: 0.0,
            static_friction,
            dynamic_friction,
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_inertia_a: Vec3::ZERO,
            inv_inertia_b: Vec3::ZERO,
        }
    }

    fn sliding_pair(speed: f32) -> (GameObject, GameObject) {
        let floor = GameObject::new("floor").with_collider(Collider::static_cuboid(Vec3::ONE));
        let mut crate_ = GameObject::new("crate")
            .with_transform(Transform::from_position(Vec3::new(0.0, 0.5, 0.0)))
            .with_physics(RigidBodyProperties::dynamic(1.0))
            .with_collider(Collider::cuboid(Vec3::splat(0.5)));
        crate_.physics_mut().velocity = Vec3::new(speed, 0.0, 0.0);
        (floor, crate_)
    }

    #[test]
    fn sticking_contact_cancels_slip() {
        let (mut floor, mut crate_) = sliding_pair(0.5);
        let contact = contact_on_floor(1.0, 0.8);

        let impulse = apply_friction(&mut floor, &mut crate_, &contact, 1.0, &SolverConfig::default());
        assert!((impulse + 0.5).abs() < 1e-5);
        assert!(crate_.physics().velocity.x.abs() < 1e-5);
    }

    #[test]
    fn sliding_contact_uses_kinetic_limit() {
        let (mut floor, mut crate_) = sliding_pair(4.0);
        let contact = contact_on_floor(0.5, 0.25);

        let impulse = apply_friction(&mut floor, &mut crate_, &contact, 2.0, &SolverConfig::default());
        assert!((impulse + 0.5).abs() < 1e-5);
        assert!((crate_.physics().velocity.x - 3.5).abs() < 1e-5);
        assert_eq!(floor.physics().velocity, Vec3::ZERO);
    }

    #[test]
    fn slip_direction_ignores_normal_motion() {
        assert_eq!(slip_direction(Vec3::new(0.0, 3.0, 0.0), Vec3::Y), None);
        assert_eq!(slip_direction(Vec3::new(2.0, 3.0, 0.0), Vec3::Y), Some(Vec3::X));
    }
}
