//! Node capacity policy and the overflow/underflow predicates built on it.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::rtree_constants::{
    directory_entry_size, leaf_entry_size, NODE_OVERHEAD, SMALL_DIRECTORY_CAPACITY,
};
use super::rtree_types::{Node, NodeKind, SpatialError, SpatialResult};

/// Bounds on the number of entries per node.
///
/// The root is exempt from the minimums. `dir_capacity` counts one slot that
/// bulk loading keeps free, so directory nodes built by bulk load hold at most
/// `dir_capacity - 1` children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    leaf_capacity: usize,
    leaf_minimum: usize,
    dir_capacity: usize,
    dir_minimum: usize,
}

impl CapacityPolicy {
    /// Creates a policy after checking
    /// `leaf_capacity >= leaf_minimum >= 1`, `dir_capacity >= 3` and
    /// `dir_capacity - 1 >= dir_minimum >= 1`.
    pub fn new(
        leaf_capacity: usize,
        leaf_minimum: usize,
        dir_capacity: usize,
        dir_minimum: usize,
    ) -> SpatialResult<Self> {
        if leaf_minimum == 0 || leaf_minimum > leaf_capacity {
            return Err(SpatialError::InvalidConfiguration(format!(
                "leaf minimum {} must be in [1, {}]",
                leaf_minimum, leaf_capacity
            )));
        }
        if dir_capacity < 3 {
            return Err(SpatialError::InvalidConfiguration(format!(
                "directory capacity {} is too small, at least 3 is required",
                dir_capacity
            )));
        }
        if dir_minimum == 0 || dir_minimum > dir_capacity - 1 {
            return Err(SpatialError::InvalidConfiguration(format!(
                "directory minimum {} must be in [1, {}]",
                dir_minimum,
                dir_capacity - 1
            )));
        }

        Ok(Self {
            leaf_capacity,
            leaf_minimum,
            dir_capacity,
            dir_minimum,
        })
    }

    /// Derives capacities from the page size and the dimensionality of the
    /// indexed objects. Minimums are `relative_min_fill` of the capacity,
    /// rounded, and never below one.
    pub fn from_page_size(
        page_size: usize,
        dimensionality: usize,
        relative_min_fill: f64,
    ) -> SpatialResult<Self> {
        if dimensionality == 0 {
            return Err(SpatialError::InvalidConfiguration(
                "dimensionality must be at least 1".into(),
            ));
        }
        if !(relative_min_fill > 0.0 && relative_min_fill <= 0.5) {
            return Err(SpatialError::InvalidConfiguration(format!(
                "relative minimum fill {} must be in (0, 0.5]",
                relative_min_fill
            )));
        }

        let usable = page_size.saturating_sub(NODE_OVERHEAD);
        let leaf_capacity = usable / leaf_entry_size(dimensionality);
        let dir_capacity = usable / directory_entry_size(dimensionality);

        if leaf_capacity < 1 || dir_capacity < 3 {
            return Err(SpatialError::InvalidConfiguration(format!(
                "node size of {} bytes is chosen too small for {} dimensions",
                page_size, dimensionality
            )));
        }
        if dir_capacity < SMALL_DIRECTORY_CAPACITY {
            warn!(
                "Page size {} gives a directory capacity of only {}",
                page_size, dir_capacity
            );
        }

        let leaf_minimum = scaled_minimum(leaf_capacity, relative_min_fill).min(leaf_capacity);
        let dir_minimum = scaled_minimum(dir_capacity, relative_min_fill).min(dir_capacity - 1);

        debug!(
            "Derived capacities for page size {} and {} dimensions: leaf {}/{}, directory {}/{}",
            page_size, dimensionality, leaf_minimum, leaf_capacity, dir_minimum, dir_capacity
        );

        Self::new(leaf_capacity, leaf_minimum, dir_capacity, dir_minimum)
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn leaf_minimum(&self) -> usize {
        self.leaf_minimum
    }

    pub fn dir_capacity(&self) -> usize {
        self.dir_capacity
    }

    pub fn dir_minimum(&self) -> usize {
        self.dir_minimum
    }

    pub fn capacity_of(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => self.leaf_capacity,
            NodeKind::Directory => self.dir_capacity,
        }
    }

    pub fn minimum_of(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => self.leaf_minimum,
            NodeKind::Directory => self.dir_minimum,
        }
    }

    /// True iff the node holds exactly as many entries as its kind allows.
    ///
    /// Nodes never exceed their capacity: an insert that would create one
    /// more entry has to split first.
    pub fn has_overflow(&self, node: &Node) -> bool {
        node.len() == self.capacity_of(node.kind())
    }

    /// True iff the node holds fewer entries than its kind's minimum.
    /// Callers must not apply this to the root.
    pub fn has_underflow(&self, node: &Node) -> bool {
        node.len() < self.minimum_of(node.kind())
    }
}

fn scaled_minimum(capacity: usize, relative_min_fill: f64) -> usize {
    ((capacity as f64 * relative_min_fill).round() as usize).max(1)
}
