//! Explicit mass-spring simulators for cloth sheets and soft volumes.
//!
//! Deformables do not take part in rigid-body contacts. Their only collider
//! is a flat floor plane at a fixed height.

pub mod cloth;
pub mod soft_body;

pub use cloth::DeformableBody;
pub use soft_body::SoftBodyVolume;

use glam::Vec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Springs shorter than this exert no force.
const MIN_SPRING_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeformableNode {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Pinned nodes never move.
    pub pinned: bool,
}

impl DeformableNode {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            pinned: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    /// Multiplier on the body stiffness.
    pub stiffness_scale: f32,
}

impl Spring {
    /// Spring between two nodes, resting at their current distance.
    pub fn between(nodes: &[DeformableNode], a: usize, b: usize, stiffness_scale: f32) -> Self {
        Self {
            a,
            b,
            rest_length: nodes[a].position.distance(nodes[b].position),
            stiffness_scale,
        }
    }
}

/// How the floor plane treats nodes that sink below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloorResponse {
    /// Vertical velocity is removed.
    Inelastic,
    /// Vertical velocity is reversed and scaled.
    Bounce(f32),
}

/// Parameters of one node integration step.
#[derive(Debug, Clone, Copy)]
pub struct NodeStep {
    pub gravity: Vec3,
    pub node_mass: f32,
    pub damping: f32,
    pub dt: f32,
    pub floor_y: f32,
    pub floor: FloorResponse,
}

/// Hookean spring forces, summed per node.
pub fn accumulate_spring_forces(
    nodes: &[DeformableNode],
    springs: &[Spring],
    stiffness: f32,
) -> Vec<Vec3> {
    let mut forces = vec![Vec3::ZERO; nodes.len()];
    for spring in springs {
        let delta = nodes[spring.b].position - nodes[spring.a].position;
        let length = delta.length();
        if length < MIN_SPRING_LENGTH {
            continue;
        }
        let force =
            delta / length * (stiffness * spring.stiffness_scale * (length - spring.rest_length));
        if !nodes[spring.a].pinned {
            forces[spring.a] += force;
        }
        if !nodes[spring.b].pinned {
            forces[spring.b] -= force;
        }
    }
    forces
}

fn integrate_node(node: &mut DeformableNode, force: Vec3, step: &NodeStep) {
    if node.pinned {
        node.velocity = Vec3::ZERO;
        return;
    }

    let mass = if step.node_mass > 0.0 { step.node_mass } else { 1.0 };
    let acceleration = step.gravity + force / mass - node.velocity * step.damping;
    node.velocity += acceleration * step.dt;
    node.position += node.velocity * step.dt;
    node.velocity *= (1.0 - step.damping * 0.5).max(0.0);

    if node.position.y < step.floor_y {
        node.position.y = step.floor_y;
        node.velocity.y = match step.floor {
            FloorResponse::Inelastic => 0.0,
            FloorResponse::Bounce(restitution) => -node.velocity.y * restitution,
        };
    }
}

/// Semi-implicit Euler over every node. Each node is independent, so the
/// parallel and serial paths produce identical results.
pub fn integrate_nodes(nodes: &mut [DeformableNode], forces: &[Vec3], step: &NodeStep) {
    #[cfg(feature = "parallel")]
    nodes
        .par_iter_mut()
        .zip(forces.par_iter())
        .for_each(|(node, force)| integrate_node(node, *force, step));

    #[cfg(not(feature = "parallel"))]
    nodes
        .iter_mut()
        .zip(forces.iter())
        .for_each(|(node, force)| integrate_node(node, *force, step));
}

/// Area-weighted vertex normals; degenerate normals fall back to +Y.
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .map(|normal| {
            if normal.length_squared() > 1e-12 {
                normal.normalize()
            } else {
                Vec3::Y
            }
        })
        .collect()
}

/// Shared surface of both deformable kinds.
pub trait DeformableSurface {
    fn nodes(&self) -> &[DeformableNode];

    fn springs(&self) -> &[Spring];

    /// Triangle list over node indices, counter-clockwise seen from outside.
    fn indices(&self) -> &[u32];

    fn simulate(&mut self, dt: f32, gravity: Vec3);

    fn vertices(&self) -> Vec<Vec3> {
        self.nodes().iter().map(|node| node.position).collect()
    }

    fn normals(&self) -> Vec<Vec3> {
        compute_vertex_normals(&self.vertices(), self.indices())
    }
}
