use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Axis-aligned box collider attached to a game object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    /// Object-space half-extents, scaled by the transform scale in world space.
    pub half_extents: Vec3,
    pub is_static: bool,
}

impl Default for Collider {
    fn default() -> Self {
        Self {
            half_extents: Vec3::splat(0.5),
            is_static: false,
        }
    }
}

impl Collider {
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            is_static: false,
        }
    }

    pub fn static_cuboid(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            is_static: true,
        }
    }

    pub fn world_half_extents(&self, transform: &Transform) -> Vec3 {
        (self.half_extents * transform.scale).abs()
    }

    pub fn world_bounds(&self, transform: &Transform) -> Aabb {
        Aabb::from_center_half_extents(transform.position, self.world_half_extents(transform))
    }
}

/// World-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Strict overlap; touching faces do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
    }
}
