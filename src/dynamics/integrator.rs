use glam::Vec3;

use crate::{
    config::IntegratorConfig,
    core::GameObject,
    dynamics::inertia::{apply_inverse_inertia, inverse_inertia_tensor},
    utils::math::wrap_euler,
};

/// Explicit integrator with velocity-driven sub-step selection.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    pub config: IntegratorConfig,
}

impl Integrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }

    /// Fastest speed any body would reach after one trial Euler step of `dt`.
    pub fn estimate_max_speed(&self, objects: &[GameObject], gravity: Vec3, dt: f32) -> f32 {
        objects
            .iter()
            .filter(|object| object.is_movable())
            .map(|object| {
                let physics = object.physics();
                let acceleration =
                    (gravity * physics.mass + physics.accumulated_forces) / physics.mass;
                (physics.velocity + acceleration * dt).length()
            })
            .filter(|speed| speed.is_finite())
            .fold(0.0, f32::max)
    }

    /// Number of sub-steps that keeps per-step displacement under the configured bound.
    pub fn substep_count(&self, max_speed: f32, dt: f32) -> u32 {
        let max_substeps = self.config.max_substeps.max(1);
        let step = self.config.max_step_displacement;
        if step <= 0.0 {
            return max_substeps;
        }
        let needed = (max_speed * dt / step).ceil();
        if !needed.is_finite() {
            return if needed.is_nan() { 1 } else { max_substeps };
        }
        (needed as u32).clamp(1, max_substeps)
    }

    pub fn integrate_velocity(&self, object: &mut GameObject, gravity: Vec3, dt: f32) {
        let physics = object.physics_mut();
        let acceleration = (gravity * physics.mass + physics.accumulated_forces) / physics.mass;

        physics.velocity += acceleration * dt;
        physics.velocity *= (1.0 - physics.linear_damping * dt).max(0.0);
        physics.last_acceleration = acceleration;
    }

    pub fn integrate_position(&self, object: &mut GameObject, dt: f32) {
        let velocity = object.physics().velocity;
        object.transform_mut().position += velocity * dt;
    }

    pub fn integrate_angular(&self, object: &mut GameObject, dt: f32) {
        let inverse_inertia = inverse_inertia_tensor(object);
        let cfg = &self.config;

        let physics = object.physics_mut();
        let angular_acceleration = apply_inverse_inertia(inverse_inertia, physics.accumulated_torque);
        physics.angular_velocity += angular_acceleration * dt;

        let damping = physics.angular_damping.max(cfg.min_angular_damping);
        physics.angular_velocity *= (1.0 - damping * dt).max(0.0);
        physics.angular_velocity = physics
            .angular_velocity
            .clamp_length_max(cfg.max_angular_speed);
        if physics.angular_velocity.length() < cfg.angular_rest_threshold {
            physics.angular_velocity = Vec3::ZERO;
        }

        let spin = physics.angular_velocity * dt;
        let transform = object.transform_mut();
        transform.rotation = wrap_euler(transform.rotation + spin);
    }

    /// Advances every object by one sub-step and clears force accumulators.
    pub fn step(&self, objects: &mut [GameObject], gravity: Vec3, dt: f32) {
        for object in objects.iter_mut() {
            if object.is_movable() {
                self.integrate_velocity(object, gravity, dt);
                self.integrate_position(object, dt);
                self.integrate_angular(object, dt);
            } else {
                object.physics_mut().last_acceleration = Vec3::ZERO;
            }
            object.physics_mut().clear_accumulators();
        }
    }
}
