use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, Euler orientation (radians, XYZ order), and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Quaternion view of the Euler rotation, for presentation only.
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    /// Builds a homogeneous matrix representation of the transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.position)
    }
}

/// Per-object rigid body state and material coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyProperties {
    /// Opt-in flag; bodies that do not simulate are never integrated.
    pub simulate: bool,
    /// `0`, negative, or non-finite mass marks the body as immovable.
    pub mass: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Cleared after every integration step.
    pub accumulated_forces: Vec3,
    /// Cleared after every integration step.
    pub accumulated_torque: Vec3,
    /// Fraction of linear velocity removed per second.
    pub linear_damping: f32,
    /// Fraction of angular velocity removed per second.
    pub angular_damping: f32,
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    /// Acceleration applied during the most recent sub-step.
    pub last_acceleration: Vec3,
}

impl Default for RigidBodyProperties {
    fn default() -> Self {
        Self {
            simulate: false,
            mass: 1.0,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            accumulated_forces: Vec3::ZERO,
            accumulated_torque: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.05,
            restitution: 0.2,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            last_acceleration: Vec3::ZERO,
        }
    }
}

impl RigidBodyProperties {
    /// A simulated body with the given mass and default material.
    pub fn dynamic(mass: f32) -> Self {
        Self {
            simulate: true,
            mass,
            ..Self::default()
        }
    }

    /// An immovable body (infinite mass).
    pub fn immovable() -> Self {
        Self {
            simulate: false,
            mass: 0.0,
            ..Self::default()
        }
    }

    pub fn rubber(mass: f32) -> Self {
        Self {
            restitution: 0.8,
            static_friction: 1.2,
            dynamic_friction: 1.0,
            ..Self::dynamic(mass)
        }
    }

    pub fn steel(mass: f32) -> Self {
        Self {
            restitution: 0.4,
            static_friction: 0.58,
            dynamic_friction: 0.44,
            ..Self::dynamic(mass)
        }
    }

    pub fn ice(mass: f32) -> Self {
        Self {
            restitution: 0.05,
            static_friction: 0.05,
            dynamic_friction: 0.03,
            ..Self::dynamic(mass)
        }
    }

    pub fn has_valid_mass(&self) -> bool {
        self.mass.is_finite() && self.mass > 0.0
    }

    /// `1/mass`, or `0` for invalid (infinite) mass.
    pub fn inverse_mass(&self) -> f32 {
        if self.has_valid_mass() {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.accumulated_forces += force;
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        self.accumulated_torque += torque;
    }

    /// Applies a force at a world-space point, adding the induced torque about `center`.
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3, center: Vec3) {
        self.accumulated_forces += force;
        self.accumulated_torque += (point - center).cross(force);
    }

    pub fn clear_accumulators(&mut self) {
        self.accumulated_forces = Vec3::ZERO;
        self.accumulated_torque = Vec3::ZERO;
    }
}

/// Combines two material coefficients by geometric mean.
///
/// Returns `0` when either coefficient is not positive.
pub fn combine_coefficient(a: f32, b: f32) -> f32 {
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    (a * b).sqrt()
}

/// Pairwise restitution: the smaller of the two, clamped to `[0, max]`.
pub fn combine_restitution(a: f32, b: f32, max: f32) -> f32 {
    a.min(b).clamp(0.0, max.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_coefficient_uses_geometric_mean() {
        let expected = (0.6_f32 * 0.2_f32).sqrt();
        assert!((combine_coefficient(0.6, 0.2) - expected).abs() < 1e-6);
        assert_eq!(combine_coefficient(-1.0, 0.5), 0.0);
        assert_eq!(combine_coefficient(0.5, 0.0), 0.0);
    }

    #[test]
    fn restitution_never_exceeds_ceiling() {
        assert_eq!(combine_restitution(1.0, 1.5, 0.9), 0.9);
        assert_eq!(combine_restitution(0.3, 0.7, 0.9), 0.3);
        assert_eq!(combine_restitution(-0.2, 0.7, 0.9), 0.0);
    }

    #[test]
    fn invalid_mass_has_zero_inverse() {
        let mut props = RigidBodyProperties::dynamic(2.0);
        assert_eq!(props.inverse_mass(), 0.5);

        for mass in [0.0, -1.0, f32::INFINITY, f32::NAN] {
            props.mass = mass;
            assert!(!props.has_valid_mass());
            assert_eq!(props.inverse_mass(), 0.0);
        }
    }

    #[test]
    fn force_at_point_induces_torque() {
        let mut props = RigidBodyProperties::dynamic(1.0);
        props.apply_force_at_point(Vec3::X, Vec3::Y, Vec3::ZERO);
        assert_eq!(props.accumulated_forces, Vec3::X);
        assert_eq!(props.accumulated_torque, Vec3::new(0.0, 0.0, -1.0));

        props.clear_accumulators();
        assert_eq!(props.accumulated_forces, Vec3::ZERO);
        assert_eq!(props.accumulated_torque, Vec3::ZERO);
    }
}
