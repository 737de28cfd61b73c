use super::{test_pair, ColliderProxy, CollisionDetector, ContactCandidate};
use crate::error::Result;

/// Brute-force `i < j` scan over the collider snapshot.
///
/// Candidates come out in discovery order, which is the order the solver
/// processes them in.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuAllPairsDetector;

impl CpuAllPairsDetector {
    pub fn new() -> Self {
        Self
    }

    /// Index pairs (into `proxies`) whose boxes strictly overlap.
    ///
    /// Pairs of two static colliders are never reported.
    pub fn overlapping_pairs(proxies: &[ColliderProxy]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in proxies.iter().enumerate() {
            for (offset, b) in proxies[i + 1..].iter().enumerate() {
                if a.is_static && b.is_static {
                    continue;
                }
                if a.aabb.overlaps(&b.aabb) {
                    pairs.push((i, i + 1 + offset));
                }
            }
        }
        pairs
    }
}

impl CollisionDetector for CpuAllPairsDetector {
    fn name(&self) -> &'static str {
        "cpu-all-pairs"
    }

    fn detect(&self, proxies: &[ColliderProxy]) -> Result<Vec<ContactCandidate>> {
        Ok(Self::overlapping_pairs(proxies)
            .into_iter()
            .filter_map(|(i, j)| test_pair(&proxies[i], &proxies[j]))
            .collect())
    }
}
