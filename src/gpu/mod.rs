//! Compute-shader collision detection.
//!
//! [`GpuCollisionSystem`] snapshots collider bounds, hands them to a
//! [`CollisionComputeBackend`], and turns the backend's results back into
//! [`ContactCandidate`]s for the shared contact solver. Small scenes upload
//! every candidate pair directly and only run the narrow phase; larger
//! scenes go through the spatial hash broad phase first.

pub mod ash_backend;
pub mod kernels;
pub mod types;

pub use ash_backend::AshBackend;
pub use kernels::SoftwareBackend;
pub use types::{
    GpuCellEntry, GpuColliderAabb, GpuCollisionPair, GpuCollisionResult, GpuDispatchParams,
};

use std::{path::Path, sync::Arc};

use ash_renderer::vulkan::VulkanDevice;
use glam::Vec3;
use parking_lot::Mutex;

use crate::{
    collision::{ColliderProxy, CollisionDetector, ContactCandidate},
    config::GpuCollisionConfig,
    error::{PhysicsError, Result},
};

/// Raw output of one detection pass.
#[derive(Debug, Default, Clone)]
pub struct PassOutput {
    /// One slot per narrow-phase pair; invalid slots did not collide.
    pub results: Vec<GpuCollisionResult>,
    pub entry_count: u32,
    pub pair_count: u32,
}

/// Device-side implementation of the collision kernels.
pub trait CollisionComputeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Grows persistent buffers to at least the configured capacities.
    fn reserve(&self, _config: &GpuCollisionConfig) -> Result<()> {
        Ok(())
    }

    /// Narrow phase over an explicit pair list.
    fn narrow_phase(
        &self,
        aabbs: &[GpuColliderAabb],
        pairs: &[GpuCollisionPair],
    ) -> Result<PassOutput>;

    /// Spatial hash broad phase followed by the narrow phase.
    fn spatial_hash(
        &self,
        aabbs: &[GpuColliderAabb],
        config: &GpuCollisionConfig,
    ) -> Result<PassOutput>;
}

/// Counters from the most recent detection call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GpuPassStats {
    pub objects: usize,
    pub cell_entries: u32,
    pub pairs_tested: u32,
    pub contacts: usize,
    pub used_spatial_hash: bool,
}

pub struct GpuCollisionSystem {
    config: GpuCollisionConfig,
    backend: Option<Box<dyn CollisionComputeBackend>>,
    enabled: bool,
    last_stats: Mutex<GpuPassStats>,
}

impl std::fmt::Debug for GpuCollisionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuCollisionSystem")
            .field("config", &self.config)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for GpuCollisionSystem {
    fn default() -> Self {
        Self::new(GpuCollisionConfig::default())
    }
}

impl GpuCollisionSystem {
    /// An unusable cell size falls back to the default.
    pub fn new(config: GpuCollisionConfig) -> Self {
        Self {
            config: config.sanitized(),
            backend: None,
            enabled: true,
            last_stats: Mutex::new(GpuPassStats::default()),
        }
    }

    /// Creates the Vulkan pipelines and buffers on `device`.
    ///
    /// `shader_dir` must contain the compiled `*.comp.spv` kernels.
    pub fn initialize(&mut self, device: Arc<VulkanDevice>, shader_dir: &Path) -> Result<()> {
        let backend = AshBackend::new(device, shader_dir, &self.config)?;
        log::info!("GPU collision initialized with {} backend", backend.name());
        self.backend = Some(Box::new(backend));
        Ok(())
    }

    /// Installs an already constructed backend, replacing any previous one.
    pub fn install_backend(&mut self, backend: Box<dyn CollisionComputeBackend>) -> Result<()> {
        backend.reserve(&self.config)?;
        log::info!("GPU collision using {} backend", backend.name());
        self.backend = Some(backend);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Initialized and not administratively disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.backend.is_some()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn config(&self) -> &GpuCollisionConfig {
        &self.config
    }

    /// Replaces the configuration, reallocating device buffers when capacities grow.
    ///
    /// A cell size that is not positive and finite is rejected.
    pub fn set_config(&mut self, config: GpuCollisionConfig) -> Result<()> {
        if !config.has_valid_cell_size() {
            return Err(PhysicsError::InvalidConfig(format!(
                "GPU collision cell size must be positive and finite, got {}",
                config.cell_size
            )));
        }
        if let Some(backend) = &self.backend {
            if config != self.config {
                backend.reserve(&config)?;
            }
        }
        self.config = config;
        Ok(())
    }

    pub fn last_stats(&self) -> GpuPassStats {
        *self.last_stats.lock()
    }

    /// Contacts between the given colliders; empty when the system is disabled.
    pub fn detect_collisions(&self, proxies: &[ColliderProxy]) -> Result<Vec<ContactCandidate>> {
        let backend = match &self.backend {
            Some(backend) if self.enabled => backend,
            _ => return Ok(Vec::new()),
        };
        if proxies.len() > self.config.max_objects as usize {
            return Err(PhysicsError::CapacityExceeded {
                resource: "object",
                requested: proxies.len(),
                capacity: self.config.max_objects as usize,
            });
        }
        if proxies.len() < 2 {
            return Ok(Vec::new());
        }

        let aabbs = snapshot(proxies);
        let simplified = proxies.len() <= self.config.simplified_path_threshold;
        let output = if simplified {
            backend.narrow_phase(&aabbs, &all_pairs(&aabbs))?
        } else {
            kernels::cell_entry_budget(&aabbs, &self.config)?;
            backend.spatial_hash(&aabbs, &self.config)?
        };

        let candidates = collect_candidates(&output.results, proxies);
        *self.last_stats.lock() = GpuPassStats {
            objects: proxies.len(),
            cell_entries: output.entry_count,
            pairs_tested: output.pair_count,
            contacts: candidates.len(),
            used_spatial_hash: !simplified,
        };
        Ok(candidates)
    }
}

impl CollisionDetector for GpuCollisionSystem {
    fn name(&self) -> &'static str {
        "gpu-spatial-hash"
    }

    fn detect(&self, proxies: &[ColliderProxy]) -> Result<Vec<ContactCandidate>> {
        if !self.is_enabled() {
            return Err(PhysicsError::GpuNotInitialized);
        }
        self.detect_collisions(proxies)
    }
}

/// Packs proxies in order; snapshot index `i` maps back to `proxies[i].object`.
pub fn snapshot(proxies: &[ColliderProxy]) -> Vec<GpuColliderAabb> {
    proxies
        .iter()
        .enumerate()
        .map(|(index, proxy)| GpuColliderAabb::from_proxy(index as u32, proxy))
        .collect()
}

/// Every `i < j` snapshot pair except static against static.
pub fn all_pairs(aabbs: &[GpuColliderAabb]) -> Vec<GpuCollisionPair> {
    let mut pairs = Vec::with_capacity(aabbs.len() * aabbs.len().saturating_sub(1) / 2);
    for (i, a) in aabbs.iter().enumerate() {
        for (j, b) in aabbs.iter().enumerate().skip(i + 1) {
            if !(a.is_static() && b.is_static()) {
                pairs.push(GpuCollisionPair::new(i as u32, j as u32));
            }
        }
    }
    pairs
}

/// Valid results mapped to scene indices, de-duplicated and sorted by pair.
pub fn collect_candidates(
    results: &[GpuCollisionResult],
    proxies: &[ColliderProxy],
) -> Vec<ContactCandidate> {
    let mut candidates: Vec<ContactCandidate> = results
        .iter()
        .filter(|result| result.is_valid())
        .filter_map(|result| {
            let a = proxies.get(result.indices[0] as usize)?;
            let b = proxies.get(result.indices[1] as usize)?;
            let [nx, ny, nz, depth] = result.normal_depth;
            let [px, py, pz, _] = result.contact_point;
            Some(ContactCandidate {
                object_a: a.object,
                object_b: b.object,
                normal: Vec3::new(nx, ny, nz),
                penetration: depth,
                point: Vec3::new(px, py, pz),
            })
        })
        .collect();

    candidates.sort_by_key(ContactCandidate::pair);
    candidates.dedup_by_key(|candidate| candidate.pair());
    candidates
}
