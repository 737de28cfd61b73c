//! Core types describing simulated objects and the scene they live in.

pub mod types;
pub mod collider;
pub mod scene;

pub use types::{combine_coefficient, combine_restitution, RigidBodyProperties, Transform};
pub use collider::{Aabb, Collider};
pub use scene::{GameObject, ObjectId, Scene};
