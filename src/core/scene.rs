//! Minimal scene container the physics core operates on.
//!
//! Objects are stored contiguously in creation order; contacts and GPU
//! snapshots refer to them by index.

use serde::{Deserialize, Serialize};

use super::{
    collider::{Aabb, Collider},
    types::{RigidBodyProperties, Transform},
};

/// Index of an object inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

impl ObjectId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameObject {
    pub name: String,
    transform: Transform,
    physics: RigidBodyProperties,
    collider: Option<Collider>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_physics(mut self, physics: RigidBodyProperties) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn physics(&self) -> &RigidBodyProperties {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut RigidBodyProperties {
        &mut self.physics
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    pub fn has_collider(&self) -> bool {
        self.collider.is_some()
    }

    pub fn has_static_collider(&self) -> bool {
        self.collider.map(|c| c.is_static).unwrap_or(false)
    }

    /// World-space bounds, if the object has a collider.
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.collider.map(|c| c.world_bounds(&self.transform))
    }

    /// Whether the integrator and the solver may move this object.
    pub fn is_movable(&self) -> bool {
        self.physics.simulate && self.physics.has_valid_mass() && !self.has_static_collider()
    }

    /// Inverse mass as seen by the contact solver.
    pub fn inverse_mass(&self) -> f32 {
        if self.is_movable() {
            self.physics.inverse_mass()
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<GameObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: GameObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(object);
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id.0)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id.0)
    }

    /// Objects in creation order.
    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [GameObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Borrows two distinct objects mutably.
pub(crate) fn pair_mut(
    objects: &mut [GameObject],
    a: usize,
    b: usize,
) -> Option<(&mut GameObject, &mut GameObject)> {
    if a == b || a >= objects.len() || b >= objects.len() {
        return None;
    }

    if a < b {
        let (left, right) = objects.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = objects.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn static_collider_makes_object_immovable() {
        let object = GameObject::new("floor")
            .with_physics(RigidBodyProperties::dynamic(5.0))
            .with_collider(Collider::static_cuboid(Vec3::ONE));
        assert!(!object.is_movable());
        assert_eq!(object.inverse_mass(), 0.0);
    }

    #[test]
    fn pair_mut_preserves_argument_order() {
        let mut objects = vec![GameObject::new("a"), GameObject::new("b"), GameObject::new("c")];
        let (first, second) = pair_mut(&mut objects, 2, 0).unwrap();
        assert_eq!(first.name, "c");
        assert_eq!(second.name, "a");
        assert!(pair_mut(&mut objects, 1, 1).is_none());
        assert!(pair_mut(&mut objects, 1, 7).is_none());
    }
}
