//! Host mirrors of the std430 structures shared with the compute shaders.

use crate::{collision::ColliderProxy, config::GpuCollisionConfig};

/// Marker written into unused cell entries so they sort after every real one.
pub const EMPTY_CELL: u32 = u32::MAX;

/// Collider bounds. `min[3]` carries the snapshot index as raw bits and
/// `max[3]` is `1.0` for static colliders.
#[repr(C, align(16))]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GpuColliderAabb {
    pub min: [f32; 4],
    pub max: [f32; 4],
}

impl GpuColliderAabb {
    pub fn from_proxy(snapshot_index: u32, proxy: &ColliderProxy) -> Self {
        let min = proxy.aabb.min;
        let max = proxy.aabb.max;
        Self {
            min: [min.x, min.y, min.z, f32::from_bits(snapshot_index)],
            max: [max.x, max.y, max.z, if proxy.is_static { 1.0 } else { 0.0 }],
        }
    }

    pub fn snapshot_index(&self) -> u32 {
        self.min[3].to_bits()
    }

    pub fn is_static(&self) -> bool {
        self.max[3] > 0.5
    }
}

#[repr(C, align(16))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GpuCollisionPair {
    pub a: u32,
    pub b: u32,
    pub _pad: [u32; 2],
}

impl GpuCollisionPair {
    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b, _pad: [0; 2] }
    }
}

/// Narrow-phase output, one slot per input pair.
///
/// `indices` holds `(a, b, valid, axis)`.
#[repr(C, align(16))]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GpuCollisionResult {
    pub normal_depth: [f32; 4],
    pub contact_point: [f32; 4],
    pub indices: [u32; 4],
}

impl GpuCollisionResult {
    pub fn is_valid(&self) -> bool {
        self.indices[2] != 0
    }
}

/// Spatial hash bucket membership of one object.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GpuCellEntry {
    pub hash: u32,
    pub object: u32,
}

impl GpuCellEntry {
    pub const EMPTY: Self = Self {
        hash: EMPTY_CELL,
        object: EMPTY_CELL,
    };
}

/// Atomic counters written by the broad phase: entries, then pairs.
pub type GpuCounters = [u32; 4];

pub const COUNTER_ENTRIES: usize = 0;
pub const COUNTER_PAIRS: usize = 1;

/// Push constants shared by every pipeline.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GpuDispatchParams {
    pub object_count: u32,
    pub pair_count: u32,
    pub entry_capacity: u32,
    pub pair_capacity: u32,
    pub result_capacity: u32,
    pub table_size: u32,
    pub sort_j: u32,
    pub sort_k: u32,
    pub cell_size: f32,
    pub _pad: [u32; 3],
}

impl GpuDispatchParams {
    pub fn new(config: &GpuCollisionConfig, object_count: u32) -> Self {
        Self {
            object_count,
            table_size: config.table_size(),
            cell_size: config.cell_size,
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: plain-old-data with no padding holes beyond `_pad`.
        unsafe {
            std::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                std::mem::size_of::<Self>(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Aabb;
    use glam::Vec3;
    use std::mem::size_of;

    #[test]
    fn layouts_match_std430() {
        assert_eq!(size_of::<GpuColliderAabb>(), 32);
        assert_eq!(size_of::<GpuCollisionPair>(), 16);
        assert_eq!(size_of::<GpuCollisionResult>(), 48);
        assert_eq!(size_of::<GpuCellEntry>(), 8);
        assert_eq!(size_of::<GpuCounters>(), 16);
        assert_eq!(size_of::<GpuDispatchParams>(), 48);
    }

    #[test]
    fn snapshot_packs_index_and_static_flag() {
        let proxy = ColliderProxy {
            object: 9,
            aabb: Aabb::new(Vec3::ZERO, Vec3::ONE),
            is_static: true,
        };
        let packed = GpuColliderAabb::from_proxy(3, &proxy);
        assert_eq!(packed.snapshot_index(), 3);
        assert!(packed.is_static());
        assert_eq!(packed.max[..3], [1.0, 1.0, 1.0]);
    }
}
