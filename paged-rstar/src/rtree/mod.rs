//! Paged R*-tree engine.
//!
//! This module provides the tree maintenance engine and everything it
//! needs around it:
//! - Node capacity policy and overflow/underflow predicates
//! - Page store trait with in-memory and file-backed stores
//! - LRU read cache and checksummed page format for the file store
//! - Bottom-up bulk loading and structural integrity checks
//!
//! Nodes are never shared by reference. The engine builds a node, writes it
//! to the page store, and reads it back by page id whenever it needs it.

pub mod capacity;
pub mod integrity;
pub mod page_store;
mod rtree_cache;
pub mod rtree_constants;
pub mod rtree_storage;
pub mod rtree_types;
mod rtree_impl;

pub use capacity::CapacityPolicy;
pub use integrity::IntegrityReport;
pub use page_store::{MemoryPageStore, PageStore, StoreStats, TreeMetadata};
pub use rtree_constants::{DEFAULT_CACHE_PAGES, DEFAULT_PAGE_SIZE, DEFAULT_RELATIVE_MIN_FILL};
pub use rtree_impl::RStarTree;
pub use rtree_storage::FilePageStore;
pub use rtree_types::{
    DirectoryEntry, Entry, FileHeader, LeafEntry, Node, NodeEntries, NodeKind, ObjectId, PageId,
    PageWithChecksum, SpatialError, SpatialResult,
};
