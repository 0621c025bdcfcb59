//! Structural integrity checking.
//!
//! Walks the tree from the root and verifies the invariants every bulk
//! loaded tree has to satisfy: node kinds, fill bounds, balance, and exact
//! bounding rectangles along every path.

use log::{debug, warn};

use crate::bounding_box::HyperBoundingBox;

use super::capacity::CapacityPolicy;
use super::page_store::PageStore;
use super::rtree_types::{NodeEntries, PageId, SpatialError, SpatialResult};

/// Integrity check result
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Total pages checked
    pub pages_checked: u64,
    pub leaf_nodes: u64,
    pub directory_nodes: u64,
    /// Number of objects reachable from the root
    pub object_count: u64,
    /// Pages that failed to load (missing or failing their checksum)
    pub corrupted_pages: Vec<PageId>,
    /// Summary of findings
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            pages_checked: 0,
            leaf_nodes: 0,
            directory_nodes: 0,
            object_count: 0,
            corrupted_pages: Vec::new(),
            is_valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        self.errors.push(message);
        self.is_valid = false;
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A page waiting to be visited, with what its parent claims about it.
struct Pending {
    page_id: PageId,
    depth: usize,
    expected_mbr: Option<HyperBoundingBox>,
}

/// Checks the tree rooted at `root` against `capacity` and `height`.
///
/// Structural problems end up in the report. Only storage I/O failures are
/// returned as errors.
pub fn check_tree<S: PageStore + ?Sized>(
    store: &S,
    root: PageId,
    capacity: &CapacityPolicy,
    height: usize,
) -> SpatialResult<IntegrityReport> {
    let mut report = IntegrityReport::new();
    let mut pending = vec![Pending {
        page_id: root,
        depth: 1,
        expected_mbr: None,
    }];

    while let Some(Pending {
        page_id,
        depth,
        expected_mbr,
    }) = pending.pop()
    {
        let node = match store.read_node(page_id) {
            Ok(node) => node,
            Err(e @ (SpatialError::Corrupted(_) | SpatialError::PageNotFound(_))) => {
                report.corrupted_pages.push(page_id);
                report.fail(format!("Page {}: {}", page_id, e));
                continue;
            }
            Err(e) => return Err(e),
        };
        report.pages_checked += 1;

        if node.page_id() != page_id {
            report.fail(format!(
                "Page {} holds a node claiming page id {}",
                page_id,
                node.page_id()
            ));
        }

        let is_root = page_id == root;
        let len = node.len();
        let max = capacity.capacity_of(node.kind());
        let min = capacity.minimum_of(node.kind());
        if len > max {
            report.fail(format!(
                "Page {}: {} entries exceed the {} capacity {}",
                page_id,
                len,
                node.kind(),
                max
            ));
        }
        if !is_root && len < min {
            report.fail(format!(
                "Page {}: {} entries are below the {} minimum {}",
                page_id,
                len,
                node.kind(),
                min
            ));
        }

        if let Some(expected) = expected_mbr {
            match node.compute_mbr() {
                Some(actual) if actual == expected => {}
                Some(actual) => report.fail(format!(
                    "Page {}: parent rectangle {} differs from node rectangle {}",
                    page_id, expected, actual
                )),
                None => report.fail(format!("Page {}: referenced node is empty", page_id)),
            }
        }

        match node.entries() {
            NodeEntries::Leaf(entries) => {
                report.leaf_nodes += 1;
                report.object_count += entries.len() as u64;
                if depth != height {
                    report.fail(format!(
                        "Page {}: leaf at depth {} but tree height is {}",
                        page_id, depth, height
                    ));
                }
            }
            NodeEntries::Directory(entries) => {
                report.directory_nodes += 1;
                if entries.is_empty() {
                    report.fail(format!("Page {}: directory node has no children", page_id));
                }
                if depth >= height {
                    report.fail(format!(
                        "Page {}: directory node at depth {} in a tree of height {}",
                        page_id, depth, height
                    ));
                    continue;
                }
                for entry in entries {
                    pending.push(Pending {
                        page_id: entry.child,
                        depth: depth + 1,
                        expected_mbr: Some(entry.mbr.clone()),
                    });
                }
            }
        }
    }

    if report.is_valid {
        debug!(
            "Integrity check passed: {} pages, {} objects",
            report.pages_checked, report.object_count
        );
    } else {
        warn!(
            "Integrity check found {} problems in {} pages",
            report.errors.len(),
            report.pages_checked
        );
    }
    Ok(report)
}
