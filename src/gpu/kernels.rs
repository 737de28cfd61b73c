//! Host implementations of the collision compute kernels.
//!
//! Each function mirrors one shader in `shaders/` invocation for invocation,
//! with atomics replaced by sequential counters. [`SoftwareBackend`] chains
//! them into the same passes the Vulkan backend records.

use glam::{IVec3, Vec3};

use super::{
    types::{GpuCellEntry, GpuColliderAabb, GpuCollisionPair, GpuCollisionResult, EMPTY_CELL},
    CollisionComputeBackend, PassOutput,
};
use crate::{
    collision::{compute_penetration, estimate_contact_point},
    config::GpuCollisionConfig,
    core::Aabb,
    error::{PhysicsError, Result},
};

const HASH_PRIME_X: u32 = 73_856_093;
const HASH_PRIME_Y: u32 = 19_349_663;
const HASH_PRIME_Z: u32 = 83_492_791;

pub fn cell_coord(point: Vec3, cell_size: f32) -> IVec3 {
    (point / cell_size).floor().as_ivec3()
}

/// Spatial hash of an integer cell, reduced into `[0, table_size)`.
pub fn hash_cell(cell: IVec3, table_size: u32) -> u32 {
    let hash = (cell.x as u32).wrapping_mul(HASH_PRIME_X)
        ^ (cell.y as u32).wrapping_mul(HASH_PRIME_Y)
        ^ (cell.z as u32).wrapping_mul(HASH_PRIME_Z);
    hash % table_size.max(1)
}

fn bounds(aabb: &GpuColliderAabb) -> Aabb {
    Aabb::new(
        Vec3::new(aabb.min[0], aabb.min[1], aabb.min[2]),
        Vec3::new(aabb.max[0], aabb.max[1], aabb.max[2]),
    )
}

/// Inclusive range of cells touched by a box.
pub fn cell_span(aabb: &GpuColliderAabb, cell_size: f32) -> (IVec3, IVec3) {
    let bounds = bounds(aabb);
    (
        cell_coord(bounds.min, cell_size),
        cell_coord(bounds.max, cell_size),
    )
}

/// `spatial_hash_count.comp`: cells one object occupies, saturating at `u32::MAX`.
pub fn count_cells(aabb: &GpuColliderAabb, cell_size: f32) -> u32 {
    let (lo, hi) = cell_span(aabb, cell_size);
    let extent = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1).max(0) as u64;
    let cells = extent(lo.x, hi.x)
        .saturating_mul(extent(lo.y, hi.y))
        .saturating_mul(extent(lo.z, hi.z));
    u32::try_from(cells).unwrap_or(u32::MAX)
}

/// Cell entries a spatial hash pass over `aabbs` needs.
///
/// Fails with `CapacityExceeded` above `config.max_cell_entries`, before
/// anything is allocated.
pub fn cell_entry_budget(aabbs: &[GpuColliderAabb], config: &GpuCollisionConfig) -> Result<u32> {
    let total: u64 = aabbs
        .iter()
        .map(|aabb| u64::from(count_cells(aabb, config.cell_size)))
        .sum();
    if total > u64::from(config.max_cell_entries) {
        return Err(PhysicsError::CapacityExceeded {
            resource: "cell entry",
            requested: usize::try_from(total).unwrap_or(usize::MAX),
            capacity: config.max_cell_entries as usize,
        });
    }
    Ok(total as u32)
}

/// `spatial_hash_write.comp`: appends one entry per occupied cell.
///
/// Writes past `entries.len()` are dropped but still counted.
pub fn write_cells(
    aabbs: &[GpuColliderAabb],
    cell_size: f32,
    table_size: u32,
    entries: &mut [GpuCellEntry],
    counter: &mut u32,
) {
    for (object, aabb) in aabbs.iter().enumerate() {
        let (lo, hi) = cell_span(aabb, cell_size);
        let base = *counter as usize;
        *counter = counter.saturating_add(count_cells(aabb, cell_size));

        let mut slot = base;
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    if let Some(entry) = entries.get_mut(slot) {
                        *entry = GpuCellEntry {
                            hash: hash_cell(IVec3::new(x, y, z), table_size),
                            object: object as u32,
                        };
                    }
                    slot += 1;
                }
            }
        }
    }
}

/// `bitonic_sort.comp`: one global compare-exchange pass.
pub fn bitonic_pass(entries: &mut [GpuCellEntry], j: usize, k: usize) {
    for i in 0..entries.len() {
        let partner = i ^ j;
        if partner <= i || partner >= entries.len() {
            continue;
        }
        let ascending = i & k == 0;
        if (entries[i] > entries[partner]) == ascending {
            entries.swap(i, partner);
        }
    }
}

/// Full bitonic network over a power-of-two sized slice.
pub fn bitonic_sort(entries: &mut [GpuCellEntry]) {
    for (j, k) in bitonic_schedule(entries.len()) {
        bitonic_pass(entries, j, k);
    }
}

/// `(j, k)` pass parameters for a bitonic sort of `len` elements.
pub fn bitonic_schedule(len: usize) -> Vec<(usize, usize)> {
    let mut passes = Vec::new();
    let mut k = 2;
    while k <= len {
        let mut j = k / 2;
        while j > 0 {
            passes.push((j, k));
            j /= 2;
        }
        k *= 2;
    }
    passes
}

/// `pair_generation.comp`: candidate pairs from sorted bucket runs.
///
/// A pair is only emitted from the bucket of its home cell, the cell holding
/// the minimum corner of the overlap region. Writes past `pairs.len()` are
/// dropped but still counted.
pub fn generate_pairs(
    entries: &[GpuCellEntry],
    entry_count: usize,
    aabbs: &[GpuColliderAabb],
    cell_size: f32,
    table_size: u32,
    pairs: &mut [GpuCollisionPair],
    counter: &mut u32,
) {
    let entry_count = entry_count.min(entries.len());
    for i in 0..entry_count {
        let entry = entries[i];
        if entry.hash == EMPTY_CELL {
            continue;
        }
        for other in &entries[i + 1..entry_count] {
            if other.hash != entry.hash {
                break;
            }
            if other.object == entry.object {
                continue;
            }

            let lo = entry.object.min(other.object);
            let hi = entry.object.max(other.object);
            let (Some(a), Some(b)) = (aabbs.get(lo as usize), aabbs.get(hi as usize)) else {
                continue;
            };
            if a.is_static() && b.is_static() {
                continue;
            }
            let (box_a, box_b) = (bounds(a), bounds(b));
            if !box_a.overlaps(&box_b) {
                continue;
            }
            let home = cell_coord(box_a.min.max(box_b.min), cell_size);
            if hash_cell(home, table_size) != entry.hash {
                continue;
            }

            let slot = *counter as usize;
            *counter = counter.saturating_add(1);
            if let Some(pair) = pairs.get_mut(slot) {
                *pair = GpuCollisionPair::new(lo, hi);
            }
        }
    }
}

/// `narrow_phase.comp`: box penetration for one pair.
pub fn narrow_phase_pair(aabbs: &[GpuColliderAabb], pair: &GpuCollisionPair) -> GpuCollisionResult {
    let mut result = GpuCollisionResult {
        indices: [pair.a, pair.b, 0, 0],
        ..GpuCollisionResult::default()
    };
    let (Some(a), Some(b)) = (aabbs.get(pair.a as usize), aabbs.get(pair.b as usize)) else {
        return result;
    };

    let (box_a, box_b) = (bounds(a), bounds(b));
    if let Some(hit) = compute_penetration(&box_a, &box_b) {
        let point = estimate_contact_point(&box_a, &box_b, hit.axis, hit.normal);
        result.normal_depth = [hit.normal.x, hit.normal.y, hit.normal.z, hit.depth];
        result.contact_point = [point.x, point.y, point.z, 0.0];
        result.indices[2] = 1;
        result.indices[3] = hit.axis as u32;
    }
    result
}

/// Runs the compute kernels on the calling thread.
///
/// Produces the same results as the Vulkan backend and needs no device,
/// which makes it the reference for parity checks and headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareBackend;

impl CollisionComputeBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn narrow_phase(
        &self,
        aabbs: &[GpuColliderAabb],
        pairs: &[GpuCollisionPair],
    ) -> Result<PassOutput> {
        Ok(PassOutput {
            results: pairs.iter().map(|pair| narrow_phase_pair(aabbs, pair)).collect(),
            entry_count: 0,
            pair_count: pairs.len() as u32,
        })
    }

    fn spatial_hash(
        &self,
        aabbs: &[GpuColliderAabb],
        config: &GpuCollisionConfig,
    ) -> Result<PassOutput> {
        let table_size = config.table_size();
        let entry_count = cell_entry_budget(aabbs, config)?;

        let mut entries =
            vec![GpuCellEntry::EMPTY; (entry_count as usize).max(1).next_power_of_two()];
        let mut written = 0;
        write_cells(aabbs, config.cell_size, table_size, &mut entries, &mut written);
        bitonic_sort(&mut entries);

        let mut pair_count = 0;
        generate_pairs(
            &entries,
            entry_count as usize,
            aabbs,
            config.cell_size,
            table_size,
            &mut [],
            &mut pair_count,
        );
        let mut pairs = vec![GpuCollisionPair::default(); pair_count as usize];
        let mut emitted = 0;
        generate_pairs(
            &entries,
            entry_count as usize,
            aabbs,
            config.cell_size,
            table_size,
            &mut pairs,
            &mut emitted,
        );

        let results = pairs.iter().map(|pair| narrow_phase_pair(aabbs, pair)).collect();
        Ok(PassOutput {
            results,
            entry_count,
            pair_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(center: Vec3, half: f32, is_static: bool) -> GpuColliderAabb {
        GpuColliderAabb {
            min: [center.x - half, center.y - half, center.z - half, 0.0],
            max: [
                center.x + half,
                center.y + half,
                center.z + half,
                if is_static { 1.0 } else { 0.0 },
            ],
        }
    }

    #[test]
    fn hash_is_stable_and_in_range() {
        assert_eq!(hash_cell(IVec3::ZERO, 64), 0);
        let h = hash_cell(IVec3::new(-3, 7, 2), 262_144);
        assert!(h < 262_144);
        assert_eq!(h, hash_cell(IVec3::new(-3, 7, 2), 262_144));
    }

    #[test]
    fn counts_cells_per_axis() {
        let unit = aabb(Vec3::new(1.0, 1.0, 1.0), 0.5, false);
        assert_eq!(count_cells(&unit, 2.0), 1);
        let straddling = aabb(Vec3::ZERO, 0.5, false);
        assert_eq!(count_cells(&straddling, 2.0), 8);
    }

    #[test]
    fn bitonic_sort_orders_entries() {
        let mut entries: Vec<GpuCellEntry> = [7, 3, 9, 3, 1, 8, 2, 5]
            .iter()
            .enumerate()
            .map(|(object, hash)| GpuCellEntry {
                hash: *hash,
                object: object as u32,
            })
            .collect();
        entries[7] = GpuCellEntry::EMPTY;

        bitonic_sort(&mut entries);
        let hashes: Vec<u32> = entries.iter().map(|e| e.hash).collect();
        assert_eq!(hashes, vec![1, 2, 3, 3, 7, 8, 9, EMPTY_CELL]);
        assert_eq!(entries[2].object, 1);
        assert_eq!(entries[3].object, 3);
    }

    #[test]
    fn shared_cells_emit_each_pair_once() {
        // Both boxes straddle the origin and share eight cells.
        let aabbs = vec![
            aabb(Vec3::ZERO, 0.5, false),
            aabb(Vec3::new(0.2, 0.1, 0.0), 0.5, false),
            aabb(Vec3::new(0.1, 0.0, 0.0), 0.5, true),
        ];
        let output = SoftwareBackend.spatial_hash(&aabbs, &GpuCollisionConfig::default()).unwrap();

        let mut pairs: Vec<(u32, u32)> = output
            .results
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| (r.indices[0], r.indices[1]))
            .collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(output.entry_count, 24);
    }

    #[test]
    fn static_pairs_are_not_generated() {
        let aabbs = vec![aabb(Vec3::ONE, 0.5, true), aabb(Vec3::ONE, 0.5, true)];
        let output = SoftwareBackend.spatial_hash(&aabbs, &GpuCollisionConfig::default()).unwrap();
        assert_eq!(output.pair_count, 0);
    }

    #[test]
    fn narrow_phase_flags_separated_pairs_invalid() {
        let aabbs = vec![aabb(Vec3::ZERO, 0.5, false), aabb(Vec3::new(3.0, 0.0, 0.0), 0.5, false)];
        let result = narrow_phase_pair(&aabbs, &GpuCollisionPair::new(0, 1));
        assert!(!result.is_valid());
        let missing = narrow_phase_pair(&aabbs, &GpuCollisionPair::new(0, 9));
        assert!(!missing.is_valid());
    }

    #[test]
    fn unusable_cell_size_saturates_instead_of_overflowing() {
        let unit = aabb(Vec3::ZERO, 0.5, false);
        assert_eq!(count_cells(&unit, 0.0), u32::MAX);
        assert_eq!(count_cells(&unit, f32::NAN), 1);
        assert_eq!(count_cells(&unit, -1.0), 0);
    }

    #[test]
    fn oversized_slab_is_refused_before_allocating() {
        let slab = GpuColliderAabb {
            min: [-4200.0, 0.0, -4200.0, 0.0],
            max: [4200.0, 1.0, 4200.0, 1.0],
        };
        let aabbs = vec![slab, aabb(Vec3::new(0.0, 1.2, 0.0), 0.5, false)];
        let config = GpuCollisionConfig::default();

        assert!(matches!(
            cell_entry_budget(&aabbs, &config),
            Err(PhysicsError::CapacityExceeded { resource: "cell entry", .. })
        ));
        assert!(matches!(
            SoftwareBackend.spatial_hash(&aabbs, &config),
            Err(PhysicsError::CapacityExceeded { .. })
        ));
    }
}
