//! Impulse Physics – rigid-body and deformable simulation core.
//!
//! A [`PhysicsSystem`] advances a [`Scene`] of box-shaped [`GameObject`]s with
//! adaptive sub-stepping, detects contacts either on the CPU or through a
//! Vulkan compute pipeline ([`gpu::GpuCollisionSystem`]), and resolves them with
//! a sequential-impulse [`ContactSolver`]. Cloth sheets and soft volumes live in
//! [`deformable`] and are stepped separately.

pub mod collision;
pub mod config;
pub mod core;
pub mod deformable;
pub mod dynamics;
pub mod error;
pub mod gpu;
pub mod utils;
pub mod world;

pub use glam::{Quat, Vec3};

pub use collision::{
    collect_proxies, ColliderProxy, CollisionDetector, ContactCandidate, CpuAllPairsDetector,
};
pub use config::{
    ClothConfig, GpuCollisionConfig, IntegratorConfig, PhysicsConfig, SoftBodyConfig,
    SolverConfig,
};
pub use crate::core::{Aabb, Collider, GameObject, ObjectId, RigidBodyProperties, Scene, Transform};
pub use deformable::{DeformableBody, DeformableSurface, SoftBodyVolume};
pub use dynamics::{ContactSolver, Integrator};
pub use error::{PhysicsError, Result};
pub use gpu::{CollisionComputeBackend, GpuCollisionSystem, SoftwareBackend};
pub use world::PhysicsSystem;
