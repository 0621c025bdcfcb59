//! Bulk split strategies.
//!
//! Both strategies only decide on an ordering of the items; cutting that
//! ordering into groups is shared by [`tile`].

use std::cmp::Ordering;

use crate::bounding_box::SpatialComparable;

use super::BulkSplit;

/// Cuts an ordered sequence into consecutive groups.
///
/// Uses the fewest groups that respect `max_entries` and spreads the items
/// evenly over them. When even spreading would undercut `min_entries`, no
/// packing satisfies both bounds; groups are then filled to `max_entries`
/// and the final group takes the rest.
pub fn tile<T>(items: Vec<T>, min_entries: usize, max_entries: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let max_entries = max_entries.max(1);
    let groups = n.div_ceil(max_entries);
    let base = n / groups;

    let sizes: Vec<usize> = if base >= min_entries {
        let extra = n % groups;
        (0..groups).map(|i| base + usize::from(i < extra)).collect()
    } else {
        (0..groups)
            .map(|i| max_entries.min(n - i * max_entries))
            .collect()
    };

    let mut iter = items.into_iter();
    sizes
        .into_iter()
        .map(|size| iter.by_ref().take(size).collect())
        .collect()
}

fn by_center<T: SpatialComparable>(dim: usize) -> impl Fn(&T, &T) -> Ordering {
    move |a, b| a.center(dim).total_cmp(&b.center(dim))
}

/// Sorts items by their center along the first dimension and tiles them.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneDimSortBulkSplit;

impl BulkSplit for OneDimSortBulkSplit {
    fn partition<T: SpatialComparable>(
        &self,
        mut items: Vec<T>,
        min_entries: usize,
        max_entries: usize,
    ) -> Vec<Vec<T>> {
        if items.first().is_some_and(|item| item.dimensionality() > 0) {
            items.sort_by(by_center(0));
        }
        tile(items, min_entries, max_entries)
    }
}

/// Sort-Tile-Recursive ordering.
///
/// With `p = ceil(n / max_entries)` groups and `d` dimensions, the items are
/// sorted along dimension 0 and cut into about `p^(1/d)` slabs; every slab
/// is then ordered the same way along the remaining dimensions. The final
/// order is tiled into groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortTileRecursiveBulkSplit;

impl SortTileRecursiveBulkSplit {
    fn order<T: SpatialComparable>(items: &mut [T], dim: usize, dims: usize, max_entries: usize) {
        if items.len() <= 1 || dim >= dims {
            return;
        }
        items.sort_by(by_center(dim));
        if dim + 1 == dims {
            return;
        }

        let groups = items.len().div_ceil(max_entries);
        let remaining = (dims - dim) as f64;
        let slabs = ((groups as f64).powf(1.0 / remaining).ceil() as usize).max(1);
        let slab_size = groups.div_ceil(slabs) * max_entries;

        for slab in items.chunks_mut(slab_size) {
            Self::order(slab, dim + 1, dims, max_entries);
        }
    }
}

impl BulkSplit for SortTileRecursiveBulkSplit {
    fn partition<T: SpatialComparable>(
        &self,
        mut items: Vec<T>,
        min_entries: usize,
        max_entries: usize,
    ) -> Vec<Vec<T>> {
        let max_entries = max_entries.max(1);
        let dims = items.first().map_or(0, |item| item.dimensionality());
        Self::order(&mut items, 0, dims, max_entries);
        tile(items, min_entries, max_entries)
    }
}
