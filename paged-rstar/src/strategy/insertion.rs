//! Child selection for single-object insertion.

use crate::bounding_box::HyperBoundingBox;
use crate::rtree::rtree_types::DirectoryEntry;

use super::InsertionStrategy;

/// Picks the child whose rectangle grows least, by volume, when extended to
/// cover the object. Ties go to the child with the smaller volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastEnlargementInsertionStrategy;

impl InsertionStrategy for LeastEnlargementInsertionStrategy {
    fn choose(&self, candidates: &[DirectoryEntry], object: &HyperBoundingBox) -> Option<usize> {
        let mut best: Option<(usize, f64, f64)> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            let enlargement = candidate.mbr.enlargement(object);
            let volume = candidate.mbr.volume();
            let better = match best {
                None => true,
                Some((_, best_enlargement, best_volume)) => {
                    enlargement < best_enlargement
                        || (enlargement == best_enlargement && volume < best_volume)
                }
            };
            if better {
                best = Some((i, enlargement, volume));
            }
        }

        best.map(|(i, _, _)| i)
    }
}

/// Picks the child whose overlap with its siblings grows least when extended
/// to cover the object. Ties fall back to least volume enlargement, then to
/// smaller volume.
///
/// Costs quadratic time in the number of candidates, so it is normally only
/// used on the level directly above the leaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastOverlapInsertionStrategy;

impl LeastOverlapInsertionStrategy {
    fn overlap_enlargement(
        candidates: &[DirectoryEntry],
        index: usize,
        object: &HyperBoundingBox,
    ) -> f64 {
        let current = &candidates[index].mbr;
        let enlarged = current.union(object);
        candidates
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, other)| enlarged.overlap(&other.mbr) - current.overlap(&other.mbr))
            .sum()
    }
}

impl InsertionStrategy for LeastOverlapInsertionStrategy {
    fn choose(&self, candidates: &[DirectoryEntry], object: &HyperBoundingBox) -> Option<usize> {
        let mut best: Option<(usize, (f64, f64, f64))> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            let key = (
                Self::overlap_enlargement(candidates, i, object),
                candidate.mbr.enlargement(object),
                candidate.mbr.volume(),
            );
            let better = match &best {
                None => true,
                Some((_, best_key)) => key < *best_key,
            };
            if better {
                best = Some((i, key));
            }
        }

        best.map(|(i, _)| i)
    }
}
