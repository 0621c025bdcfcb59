//! Pluggable strategies used by the tree engine.
//!
//! - [`BulkSplit`] groups items into nodes while bulk loading
//! - [`InsertionStrategy`] picks the subtree that receives a new object

pub mod bulk_split;
pub mod insertion;

use crate::bounding_box::{HyperBoundingBox, SpatialComparable};
use crate::rtree::rtree_types::DirectoryEntry;

pub use bulk_split::{tile, OneDimSortBulkSplit, SortTileRecursiveBulkSplit};
pub use insertion::{LeastEnlargementInsertionStrategy, LeastOverlapInsertionStrategy};

/// Partitions a sequence of same-kind items into node-sized groups.
///
/// Implementations must return groups whose concatenation is a permutation
/// of the input (nothing dropped, nothing duplicated) and whose sizes lie in
/// `[min_entries, max_entries]`. Only the final group may be smaller than
/// `min_entries`, and only when no packing satisfies both bounds.
pub trait BulkSplit {
    fn partition<T: SpatialComparable>(
        &self,
        items: Vec<T>,
        min_entries: usize,
        max_entries: usize,
    ) -> Vec<Vec<T>>;
}

/// Chooses the child of a directory node that should receive a new object.
pub trait InsertionStrategy {
    /// Index into `candidates` of the chosen child, `None` if there are no
    /// candidates.
    fn choose(&self, candidates: &[DirectoryEntry], object: &HyperBoundingBox) -> Option<usize>;
}
