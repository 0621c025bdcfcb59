//! # Paged R*-tree
//!
//! A page-oriented multidimensional R*-tree engine. Nodes live in fixed-size
//! pages behind a [`PageStore`]; the engine keeps only the root page id, the
//! height and the capacity policy.
//!
//! ## Features
//!
//! - **Bulk Loading**: Balanced trees built bottom-up from a batch of objects
//! - **Pluggable Strategies**: Bulk split and child selection are traits
//! - **Page Stores**: In-memory arena store and checksummed file store
//! - **Integrity Checks**: Capacity, balance and rectangle invariants verified on demand
//!
//! ## Quick Start
//!
//! ```rust
//! use paged_rstar::{
//!     HyperBoundingBox, LeafEntry, LeastEnlargementInsertionStrategy, MemoryPageStore,
//!     RStarTree, RTreeConfig, SortTileRecursiveBulkSplit,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = RStarTree::new(
//!     MemoryPageStore::new(),
//!     SortTileRecursiveBulkSplit,
//!     LeastEnlargementInsertionStrategy,
//!     RTreeConfig::new(),
//! )?;
//!
//! let objects = (0..1000u64).map(|i| {
//!     let x = (i % 40) as f64;
//!     let y = (i / 40) as f64;
//!     LeafEntry::new(HyperBoundingBox::new(vec![x, y], vec![x + 0.5, y + 0.5]), i)
//! });
//! tree.bulk_load(objects)?;
//!
//! assert_eq!(tree.height(), tree.compute_height()?);
//! assert!(tree.check_integrity()?.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod config;
pub mod rtree;
pub mod strategy;

pub use bounding_box::{HyperBoundingBox, SpatialComparable};
pub use config::RTreeConfig;
pub use rtree::{
    CapacityPolicy, DirectoryEntry, Entry, FilePageStore, IntegrityReport, LeafEntry,
    MemoryPageStore, Node, NodeKind, ObjectId, PageId, PageStore, RStarTree, SpatialError,
    SpatialResult, StoreStats, TreeMetadata,
};
pub use strategy::{
    BulkSplit, InsertionStrategy, LeastEnlargementInsertionStrategy, LeastOverlapInsertionStrategy,
    OneDimSortBulkSplit, SortTileRecursiveBulkSplit,
};
