//! Global configuration constants and tuning structures for the physics core.
//!
//! Every stability clamp used by the integrator and the contact solver is a
//! named field here so it can be tuned (and tested) explicitly. The `Default`
//! implementations reproduce the stock engine behaviour.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default gravity vector applied by the physics system (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Upper bound on sub-steps taken within a single `update` call.
pub const DEFAULT_MAX_SUBSTEPS: u32 = 16;

/// Maximum distance a body may travel in one sub-step (world units).
pub const DEFAULT_MAX_STEP_DISPLACEMENT: f32 = 0.25;

/// Number of sequential-impulse iterations performed per sub-step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 16;

/// Penetration tolerance below which no correction is applied.
pub const DEFAULT_SLOP: f32 = 0.0005;

/// Smallest diagonal entry allowed in a body-space inertia tensor.
pub const INERTIA_FLOOR: f32 = 0.001;

/// Largest diagonal entry allowed in an inverse inertia tensor.
pub const MAX_INVERSE_INERTIA: f32 = 100.0;

/// Objects without a collider are treated as a unit cube for inertia purposes.
pub const DEFAULT_HALF_EXTENTS: [f32; 3] = [0.5, 0.5, 0.5];

/// Object count at or below which the GPU path skips spatial hashing.
pub const DEFAULT_GPU_SIMPLIFIED_THRESHOLD: usize = 256;

/// Most spatial hash entries a single detection pass may produce.
pub const DEFAULT_MAX_CELL_ENTRIES: u32 = 1 << 24;

/// Hash cell edge used when a configured size is unusable.
pub const DEFAULT_GPU_CELL_SIZE: f32 = 2.0;

/// Integration limits applied in every sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub max_substeps: u32,
    pub max_step_displacement: f32,
    /// Angular damping never drops below this value.
    pub min_angular_damping: f32,
    /// rad/s
    pub max_angular_speed: f32,
    /// Angular speeds below this are snapped to zero.
    pub angular_rest_threshold: f32,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            max_step_displacement: DEFAULT_MAX_STEP_DISPLACEMENT,
            min_angular_damping: 0.1,
            max_angular_speed: 15.0,
            angular_rest_threshold: 0.01,
        }
    }
}

/// Contact solver tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub iterations: u32,
    pub slop: f32,
    /// Velocity bias factor applied to penetration beyond the slop.
    pub baumgarte: f32,
    /// Fraction of remaining penetration removed by the positional pass.
    pub correction_percent: f32,
    /// Penetration beyond `deep_penetration_slop_factor * slop` is half-corrected
    /// before the velocity iterations run.
    pub deep_penetration_slop_factor: f32,
    pub max_restitution: f32,
    pub max_normal_impulse: f32,
    pub max_friction_impulse: f32,
    /// Scale applied to every angular impulse before it is clamped.
    pub angular_impulse_scale: f32,
    pub max_angular_impulse: f32,
    /// Tangential speeds below this produce no friction impulse.
    pub friction_velocity_threshold: f32,
    /// Velocity multiplier applied to every body touching a contact.
    pub contact_damping: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SOLVER_ITERATIONS,
            slop: DEFAULT_SLOP,
            baumgarte: 0.4,
            correction_percent: 0.95,
            deep_penetration_slop_factor: 2.0,
            max_restitution: 0.9,
            max_normal_impulse: 50.0,
            max_friction_impulse: 15.0,
            angular_impulse_scale: 0.5,
            max_angular_impulse: 5.0,
            friction_velocity_threshold: 1e-4,
            contact_damping: 0.995,
        }
    }
}

/// Sizing of the GPU collision buffers.
///
/// Changing any capacity reallocates device buffers on the next detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuCollisionConfig {
    pub max_objects: u32,
    pub max_pairs: u32,
    pub max_results: u32,
    /// Spatial hash table size is `grid_resolution³` buckets.
    pub grid_resolution: u32,
    /// Must be positive and finite.
    pub cell_size: f32,
    pub simplified_path_threshold: usize,
    /// Spatial hash passes needing more cell entries than this are refused.
    pub max_cell_entries: u32,
}

impl Default for GpuCollisionConfig {
    fn default() -> Self {
        Self {
            max_objects: 4096,
            max_pairs: 65536,
            max_results: 65536,
            grid_resolution: 64,
            cell_size: DEFAULT_GPU_CELL_SIZE,
            simplified_path_threshold: DEFAULT_GPU_SIMPLIFIED_THRESHOLD,
            max_cell_entries: DEFAULT_MAX_CELL_ENTRIES,
        }
    }
}

impl GpuCollisionConfig {
    pub fn table_size(&self) -> u32 {
        self.grid_resolution.max(1).saturating_pow(3)
    }

    pub fn has_valid_cell_size(&self) -> bool {
        self.cell_size.is_finite() && self.cell_size > 0.0
    }

    /// Copy with an unusable cell size replaced by the default.
    pub fn sanitized(mut self) -> Self {
        if !self.has_valid_cell_size() {
            log::warn!(
                "GPU collision cell size {} is invalid, using {}",
                self.cell_size,
                DEFAULT_GPU_CELL_SIZE
            );
            self.cell_size = DEFAULT_GPU_CELL_SIZE;
        }
        self
    }
}

/// Cloth tuning. The grid lies in the XZ plane starting at `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothConfig {
    pub origin: Vec3,
    /// Mass of every node.
    pub node_mass: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub floor_y: f32,
    /// Longest step taken by one `simulate` call.
    pub max_dt: f32,
}

impl Default for ClothConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::new(0.0, 1.0, 0.0),
            node_mass: 1.0,
            stiffness: 120.0,
            damping: 0.05,
            floor_y: 0.0,
            max_dt: 1.0 / 30.0,
        }
    }
}

/// Soft volume tuning. The lattice grows along +X, +Y and +Z from `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftBodyConfig {
    pub origin: Vec3,
    pub node_mass: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub floor_y: f32,
    /// Fraction of downward speed reflected by the floor.
    pub floor_restitution: f32,
    pub max_dt: f32,
}

impl Default for SoftBodyConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::new(0.0, 1.0, 0.0),
            node_mass: 1.0,
            stiffness: 80.0,
            damping: 0.05,
            floor_y: 0.0,
            floor_restitution: 0.3,
            max_dt: 1.0 / 60.0,
        }
    }
}

/// Top-level configuration consumed by [`crate::PhysicsSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    pub integrator: IntegratorConfig,
    pub solver: SolverConfig,
    pub gpu: GpuCollisionConfig,
    pub gpu_collision_enabled: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::from_array(DEFAULT_GRAVITY),
            integrator: IntegratorConfig::default(),
            solver: SolverConfig::default(),
            gpu: GpuCollisionConfig::default(),
            gpu_collision_enabled: false,
        }
    }
}
