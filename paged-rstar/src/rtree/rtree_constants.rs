//! Constants for the paged R*-tree.

/// Default page size (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default minimum fill of a non-root node, relative to its capacity
pub const DEFAULT_RELATIVE_MIN_FILL: f64 = 0.4;

/// Default read cache size of the file store, in pages
pub const DEFAULT_CACHE_PAGES: usize = 256;

/// Directory capacities below this work but make for very deep trees
pub const SMALL_DIRECTORY_CAPACITY: usize = 10;

/// Bytes reserved per page for the node header, checksum and encoding overhead
pub const NODE_OVERHEAD: usize = 64;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x50525354; // "PRST"

/// File format version
pub const FORMAT_VERSION: u32 = 1;

/// Encoded size of a leaf entry with `dim` dimensions.
///
/// Object id and two length-prefixed coordinate vectors, plus four bytes of slack.
pub const fn leaf_entry_size(dim: usize) -> usize {
    4 + 8 + 2 * (8 + 8 * dim)
}

/// Encoded size of a directory entry with `dim` dimensions.
pub const fn directory_entry_size(dim: usize) -> usize {
    4 + 8 + 2 * (8 + 8 * dim)
}
