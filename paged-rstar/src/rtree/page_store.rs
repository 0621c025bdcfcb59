//! Page store abstraction and the in-memory arena store.
//!
//! The tree engine never holds on to nodes: it builds a node, hands it to
//! the store, and fetches it again by page id when needed. Caching and
//! durability are entirely up to the store.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::capacity::CapacityPolicy;
use super::rtree_types::{Node, PageId, SpatialError, SpatialResult};

/// Tree-level metadata a store keeps so that a tree can be reattached.
///
/// Height is deliberately absent: it is recomputed from the pages on attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMetadata {
    pub root_page: PageId,
    pub capacity: CapacityPolicy,
}

/// Statistics about page store operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub page_count: u64,
    pub reads: u64,
    pub writes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Durable mapping from page id to node content.
pub trait PageStore {
    /// Reserves a fresh page id. Ids are never handed out twice.
    fn allocate_page_id(&self) -> SpatialResult<PageId>;

    /// Persists the full node under its own page id, replacing any previous
    /// content of that page.
    fn write_node(&self, node: &Node) -> SpatialResult<()>;

    /// Loads the node stored under `page_id`.
    fn read_node(&self, page_id: PageId) -> SpatialResult<Node>;

    /// Metadata recorded by [`PageStore::set_metadata`], if any.
    fn metadata(&self) -> SpatialResult<Option<TreeMetadata>>;

    fn set_metadata(&self, metadata: TreeMetadata) -> SpatialResult<()>;

    /// Makes all previous writes durable.
    fn flush(&self) -> SpatialResult<()> {
        Ok(())
    }

    fn stats(&self) -> StoreStats;
}

/// Arena-backed page store keeping every node in memory.
///
/// Page ids are slot indices. A slot is `None` between allocation and the
/// first write.
pub struct MemoryPageStore {
    slots: RwLock<Vec<Option<Node>>>,
    metadata: RwLock<Option<TreeMetadata>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            metadata: RwLock::new(None),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of allocated page ids, written or not.
    pub fn allocated_pages(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of pages holding a node.
    pub fn written_pages(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for MemoryPageStore {
    fn allocate_page_id(&self) -> SpatialResult<PageId> {
        let mut slots = self.slots.write();
        slots.push(None);
        Ok((slots.len() - 1) as PageId)
    }

    fn write_node(&self, node: &Node) -> SpatialResult<()> {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(node.page_id() as usize)
            .ok_or(SpatialError::PageNotFound(node.page_id()))?;
        *slot = Some(node.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_node(&self, page_id: PageId) -> SpatialResult<Node> {
        let slots = self.slots.read();
        let node = slots
            .get(page_id as usize)
            .and_then(|slot| slot.clone())
            .ok_or(SpatialError::PageNotFound(page_id))?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(node)
    }

    fn metadata(&self) -> SpatialResult<Option<TreeMetadata>> {
        Ok(*self.metadata.read())
    }

    fn set_metadata(&self, metadata: TreeMetadata) -> SpatialResult<()> {
        *self.metadata.write() = Some(metadata);
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            page_count: self.written_pages() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            cache_hits: 0,
            cache_misses: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_box::HyperBoundingBox;
    use crate::rtree::rtree_types::LeafEntry;

    #[test]
    fn test_allocate_is_sequential() {
        let store = MemoryPageStore::new();
        assert_eq!(store.allocate_page_id().unwrap(), 0);
        assert_eq!(store.allocate_page_id().unwrap(), 1);
        assert_eq!(store.allocated_pages(), 2);
        assert_eq!(store.written_pages(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryPageStore::new();
        let id = store.allocate_page_id().unwrap();
        let mut node = Node::new_leaf(id);
        node.add_leaf_entry(LeafEntry::new(HyperBoundingBox::point(vec![1.0, 2.0]), 9))
            .unwrap();
        store.write_node(&node).unwrap();
        assert_eq!(store.read_node(id).unwrap(), node);

        let stats = store.stats();
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 1);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let store = MemoryPageStore::new();
        let id = store.allocate_page_id().unwrap();
        store.write_node(&Node::new_directory(id)).unwrap();
        store.write_node(&Node::new_leaf(id)).unwrap();
        assert!(store.read_node(id).unwrap().is_leaf());
        assert_eq!(store.written_pages(), 1);
    }

    #[test]
    fn test_unallocated_and_unwritten_pages() {
        let store = MemoryPageStore::new();
        assert!(matches!(
            store.write_node(&Node::new_leaf(3)),
            Err(SpatialError::PageNotFound(3))
        ));
        let id = store.allocate_page_id().unwrap();
        assert!(matches!(
            store.read_node(id),
            Err(SpatialError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_metadata_round() {
        let store = MemoryPageStore::new();
        assert!(store.metadata().unwrap().is_none());
        let metadata = TreeMetadata {
            root_page: 0,
            capacity: CapacityPolicy::new(4, 2, 5, 2).unwrap(),
        };
        store.set_metadata(metadata).unwrap();
        assert_eq!(store.metadata().unwrap(), Some(metadata));
    }
}
