use glam::Vec3;

use crate::{
    collision::ContactCandidate,
    config::SolverConfig,
    core::{combine_coefficient, combine_restitution, scene::pair_mut, GameObject},
    dynamics::{friction::apply_friction, inertia::inverse_inertia_tensor},
};

/// Solver-ready contact between two objects, rebuilt every sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub object_a: usize,
    pub object_b: usize,
    /// Points from A toward B.
    pub normal: Vec3,
    pub point: Vec3,
    /// Moment arm from A's position to the contact point.
    pub ra: Vec3,
    pub rb: Vec3,
    pub penetration: f32,
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_inertia_a: Vec3,
    pub inv_inertia_b: Vec3,
}

impl Contact {
    pub fn inv_mass_sum(&self) -> f32 {
        self.inv_mass_a + self.inv_mass_b
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SolverStepMetrics {
    pub contacts_solved: usize,
    /// Contacts whose penetration was partly removed before iterating.
    pub deep_corrections: usize,
    pub normal_impulse_sum: f32,
    pub friction_impulse_sum: f32,
}

impl SolverStepMetrics {
    pub fn merge(&mut self, other: &Self) {
        self.contacts_solved += other.contacts_solved;
        self.deep_corrections += other.deep_corrections;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.friction_impulse_sum += other.friction_impulse_sum;
    }
}

/// Velocity of `b` relative to `a` at the contact point.
pub(crate) fn relative_velocity(a: &GameObject, b: &GameObject, contact: &Contact) -> Vec3 {
    let pa = a.physics();
    let pb = b.physics();
    let va = pa.velocity + pa.angular_velocity.cross(contact.ra);
    let vb = pb.velocity + pb.angular_velocity.cross(contact.rb);
    vb - va
}

/// Impulse denominator along `direction`, including rotational terms.
pub(crate) fn effective_mass(contact: &Contact, direction: Vec3) -> f32 {
    let ra_n = contact.ra.cross(direction);
    let rb_n = contact.rb.cross(direction);
    contact.inv_mass_sum()
        + ra_n.dot(contact.inv_inertia_a * ra_n)
        + rb_n.dot(contact.inv_inertia_b * rb_n)
}

/// Applies `impulse` to B and its opposite to A, linear and angular.
pub(crate) fn apply_contact_impulse(
    a: &mut GameObject,
    b: &mut GameObject,
    contact: &Contact,
    impulse: Vec3,
    config: &SolverConfig,
) {
    let angular = |inv_inertia: Vec3, arm: Vec3, impulse: Vec3| {
        (inv_inertia * arm.cross(impulse) * config.angular_impulse_scale)
            .clamp_length_max(config.max_angular_impulse)
    };

    let body_a = a.physics_mut();
    body_a.velocity -= impulse * contact.inv_mass_a;
    body_a.angular_velocity += angular(contact.inv_inertia_a, contact.ra, -impulse);

    let body_b = b.physics_mut();
    body_b.velocity += impulse * contact.inv_mass_b;
    body_b.angular_velocity += angular(contact.inv_inertia_b, contact.rb, impulse);
}

/// Sequential-impulse solver shared by every collision detector.
#[derive(Debug, Clone, Default)]
pub struct ContactSolver {
    pub config: SolverConfig,
}

impl ContactSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Resolves one sub-step worth of candidates against `objects`.
    ///
    /// Candidates are processed in the order given.
    pub fn solve(
        &self,
        objects: &mut [GameObject],
        candidates: &[ContactCandidate],
        dt: f32,
    ) -> SolverStepMetrics {
        let mut metrics = SolverStepMetrics::default();
        let contacts = self.build_contacts(objects, candidates, &mut metrics);
        if contacts.is_empty() {
            return metrics;
        }

        for _ in 0..self.config.iterations {
            for contact in &contacts {
                let Some((a, b)) = pair_mut(objects, contact.object_a, contact.object_b) else {
                    continue;
                };
                let normal_impulse = self.resolve_velocity(a, b, contact, dt);
                metrics.normal_impulse_sum += normal_impulse;
                let friction = apply_friction(a, b, contact, normal_impulse, &self.config);
                metrics.friction_impulse_sum += friction.abs();
            }
        }

        self.correct_positions(objects, &contacts);
        self.damp_touched_bodies(objects, &contacts);

        metrics.contacts_solved = contacts.len();
        metrics
    }

    /// Turns candidates into contacts, pre-correcting deep overlaps.
    pub fn build_contacts(
        &self,
        objects: &mut [GameObject],
        candidates: &[ContactCandidate],
        metrics: &mut SolverStepMetrics,
    ) -> Vec<Contact> {
        let cfg = &self.config;
        let deep_threshold = cfg.slop * cfg.deep_penetration_slop_factor;
        let mut contacts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let Some((a, b)) = pair_mut(objects, candidate.object_a, candidate.object_b) else {
                continue;
            };
            let inv_mass_a = a.inverse_mass();
            let inv_mass_b = b.inverse_mass();
            let inv_mass_sum = inv_mass_a + inv_mass_b;
            if inv_mass_sum <= 0.0 || candidate.penetration <= 0.0 {
                continue;
            }

            let normal = candidate.normal;
            let mut penetration = candidate.penetration;
            if penetration > deep_threshold {
                let correction = (penetration - deep_threshold) * 0.5;
                a.transform_mut().position -= normal * (correction * inv_mass_a / inv_mass_sum);
                b.transform_mut().position += normal * (correction * inv_mass_b / inv_mass_sum);
                penetration -= correction;
                metrics.deep_corrections += 1;
            }

            let pa = a.physics();
            let pb = b.physics();
            contacts.push(Contact {
                object_a: candidate.object_a,
                object_b: candidate.object_b,
                normal,
                point: candidate.point,
                ra: candidate.point - a.transform().position,
                rb: candidate.point - b.transform().position,
                penetration,
                restitution: combine_restitution(pa.restitution, pb.restitution, cfg.max_restitution),
                static_friction: combine_coefficient(pa.static_friction, pb.static_friction),
                dynamic_friction: combine_coefficient(pa.dynamic_friction, pb.dynamic_friction),
                inv_mass_a,
                inv_mass_b,
                inv_inertia_a: inverse_inertia_tensor(a),
                inv_inertia_b: inverse_inertia_tensor(b),
            });
        }

        contacts
    }

    /// Normal impulse for one contact; returns the magnitude applied.
    fn resolve_velocity(
        &self,
        a: &mut GameObject,
        b: &mut GameObject,
        contact: &Contact,
        dt: f32,
    ) -> f32 {
        let cfg = &self.config;
        let velocity_along_normal = relative_velocity(a, b, contact).dot(contact.normal);
        if velocity_along_normal > 0.0 && contact.penetration <= cfg.slop {
            return 0.0;
        }

        let denominator = effective_mass(contact, contact.normal);
        if denominator <= f32::EPSILON {
            return 0.0;
        }

        let bias = cfg.baumgarte * (contact.penetration - cfg.slop).max(0.0) / dt;
        let impulse = ((-(1.0 + contact.restitution) * velocity_along_normal + bias) / denominator)
            .clamp(0.0, cfg.max_normal_impulse);

        if impulse > 0.0 {
            apply_contact_impulse(a, b, contact, contact.normal * impulse, cfg);
        }
        impulse
    }

    fn correct_positions(&self, objects: &mut [GameObject], contacts: &[Contact]) {
        let cfg = &self.config;
        for contact in contacts {
            let inv_mass_sum = contact.inv_mass_sum();
            if inv_mass_sum <= 0.0 {
                continue;
            }
            let Some((a, b)) = pair_mut(objects, contact.object_a, contact.object_b) else {
                continue;
            };

            let magnitude =
                (contact.penetration - cfg.slop).max(0.0) * cfg.correction_percent / inv_mass_sum;
            let correction = contact.normal * magnitude;
            a.transform_mut().position -= correction * contact.inv_mass_a;
            b.transform_mut().position += correction * contact.inv_mass_b;
        }
    }

    fn damp_touched_bodies(&self, objects: &mut [GameObject], contacts: &[Contact]) {
        let mut touched = vec![false; objects.len()];
        for contact in contacts {
            touched[contact.object_a] = true;
            touched[contact.object_b] = true;
        }

        let damping = self.config.contact_damping;
        for (object, _) in objects
            .iter_mut()
            .zip(touched)
            .filter(|(object, touched)| *touched && object.is_movable())
        {
            let physics = object.physics_mut();
            physics.velocity *= damping;
            physics.angular_velocity *= damping;
        }
    }
}
