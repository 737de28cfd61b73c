//! Collision detection: collider snapshots, box narrow-phase, and detectors.
//!
//! Detectors read an immutable [`ColliderProxy`] snapshot of the scene and
//! produce [`ContactCandidate`]s keyed by object index. The contact solver
//! consumes candidates the same way regardless of which detector made them.

pub mod broadphase;
pub mod narrowphase;

use glam::Vec3;

use crate::{
    core::{Aabb, GameObject},
    error::Result,
};

pub use broadphase::CpuAllPairsDetector;
pub use narrowphase::{compute_penetration, estimate_contact_point, Penetration};

/// World-space bounds of one collidable object at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderProxy {
    /// Index of the owning object in the scene.
    pub object: usize,
    pub aabb: Aabb,
    pub is_static: bool,
}

/// Snapshot of every object that carries a collider, in scene order.
pub fn collect_proxies(objects: &[GameObject]) -> Vec<ColliderProxy> {
    objects
        .iter()
        .enumerate()
        .filter_map(|(index, object)| {
            let collider = object.collider()?;
            Some(ColliderProxy {
                object: index,
                aabb: collider.world_bounds(object.transform()),
                is_static: collider.is_static,
            })
        })
        .collect()
}

/// Overlap reported by a detector, before any material data is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactCandidate {
    pub object_a: usize,
    pub object_b: usize,
    /// Unit axis pointing from A toward B.
    pub normal: Vec3,
    pub penetration: f32,
    pub point: Vec3,
}

impl ContactCandidate {
    pub fn pair(&self) -> (usize, usize) {
        (self.object_a, self.object_b)
    }
}

/// Source of contacts for one sub-step.
pub trait CollisionDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, proxies: &[ColliderProxy]) -> Result<Vec<ContactCandidate>>;
}

/// Narrow-phase test of two proxies, producing a candidate when their boxes overlap.
pub fn test_pair(a: &ColliderProxy, b: &ColliderProxy) -> Option<ContactCandidate> {
    let penetration = compute_penetration(&a.aabb, &b.aabb)?;
    Some(ContactCandidate {
        object_a: a.object,
        object_b: b.object,
        normal: penetration.normal,
        penetration: penetration.depth,
        point: estimate_contact_point(&a.aabb, &b.aabb, penetration.axis, penetration.normal),
    })
}
