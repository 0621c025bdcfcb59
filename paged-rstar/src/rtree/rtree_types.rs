//! Core types and data structures for the paged R*-tree.
//!
//! This module defines the fundamental types used throughout the tree:
//! - Error types and result types
//! - Entry types (leaf and directory)
//! - Node type with its leaf/directory body
//! - File header and checksummed page wrapper used by the file store

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::io;
use thiserror::Error;

use crate::bounding_box::{HyperBoundingBox, SpatialComparable};

use super::capacity::CapacityPolicy;
use super::rtree_constants::{FORMAT_VERSION, MAGIC};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while building or maintaining the tree
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Unexpected {found} item while filling {expected} node {page_id}")]
    KindMismatch {
        page_id: PageId,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("Tree is not initialized")]
    NotInitialized,

    #[error("Corrupted page: {0}")]
    Corrupted(String),
}

/// Result type for tree operations
pub type SpatialResult<T> = Result<T, SpatialError>;

/// Reference to an indexed object, stored in leaf entries
pub type ObjectId = u64;

/// Page ID - unique identifier for a node/page in the page store
pub type PageId = u64;

// ============================================================================
// Entry Types
// ============================================================================

/// The two kinds a node or an entry can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Leaf,
    Directory,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Leaf => write!(f, "leaf"),
            NodeKind::Directory => write!(f, "directory"),
        }
    }
}

/// An entry in a leaf node: the bounds of an indexed object and its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub mbr: HyperBoundingBox,
    pub object_id: ObjectId,
}

impl LeafEntry {
    pub fn new(mbr: HyperBoundingBox, object_id: ObjectId) -> Self {
        Self { mbr, object_id }
    }
}

/// An entry in a directory node: a child page and the MBR of its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub mbr: HyperBoundingBox,
    pub child: PageId,
}

impl DirectoryEntry {
    pub fn new(mbr: HyperBoundingBox, child: PageId) -> Self {
        Self { mbr, child }
    }
}

/// Either kind of entry. Used where leaf and directory entries travel
/// through the same sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    Leaf(LeafEntry),
    Directory(DirectoryEntry),
}

impl Entry {
    pub fn kind(&self) -> NodeKind {
        match self {
            Entry::Leaf(_) => NodeKind::Leaf,
            Entry::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn mbr(&self) -> &HyperBoundingBox {
        match self {
            Entry::Leaf(e) => &e.mbr,
            Entry::Directory(e) => &e.mbr,
        }
    }
}

impl From<LeafEntry> for Entry {
    fn from(entry: LeafEntry) -> Self {
        Entry::Leaf(entry)
    }
}

impl From<DirectoryEntry> for Entry {
    fn from(entry: DirectoryEntry) -> Self {
        Entry::Directory(entry)
    }
}

impl SpatialComparable for LeafEntry {
    fn dimensionality(&self) -> usize {
        self.mbr.dimensionality()
    }

    fn min(&self, dim: usize) -> f64 {
        self.mbr.min(dim)
    }

    fn max(&self, dim: usize) -> f64 {
        self.mbr.max(dim)
    }
}

impl SpatialComparable for DirectoryEntry {
    fn dimensionality(&self) -> usize {
        self.mbr.dimensionality()
    }

    fn min(&self, dim: usize) -> f64 {
        self.mbr.min(dim)
    }

    fn max(&self, dim: usize) -> f64 {
        self.mbr.max(dim)
    }
}

impl SpatialComparable for Entry {
    fn dimensionality(&self) -> usize {
        self.mbr().dimensionality()
    }

    fn min(&self, dim: usize) -> f64 {
        self.mbr().min(dim)
    }

    fn max(&self, dim: usize) -> f64 {
        self.mbr().max(dim)
    }
}

// ============================================================================
// Node Types
// ============================================================================

/// Entries of a node. The variant is fixed when the node is created, so a
/// node can never hold entries of both kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeEntries {
    /// Leaf node containing object entries
    Leaf(Vec<LeafEntry>),
    /// Directory node containing child references
    Directory(Vec<DirectoryEntry>),
}

/// A tree node as stored in one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    page_id: PageId,
    entries: NodeEntries,
}

impl Node {
    pub fn new_leaf(page_id: PageId) -> Self {
        Self {
            page_id,
            entries: NodeEntries::Leaf(Vec::new()),
        }
    }

    pub fn new_directory(page_id: PageId) -> Self {
        Self {
            page_id,
            entries: NodeEntries::Directory(Vec::new()),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn kind(&self) -> NodeKind {
        match self.entries {
            NodeEntries::Leaf(_) => NodeKind::Leaf,
            NodeEntries::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.entries, NodeEntries::Leaf(_))
    }

    pub fn entries(&self) -> &NodeEntries {
        &self.entries
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            NodeEntries::Leaf(entries) => entries.len(),
            NodeEntries::Directory(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf entries, or an empty slice for a directory node.
    pub fn leaf_entries(&self) -> &[LeafEntry] {
        match &self.entries {
            NodeEntries::Leaf(entries) => entries,
            NodeEntries::Directory(_) => &[],
        }
    }

    /// Directory entries, or an empty slice for a leaf node.
    pub fn directory_entries(&self) -> &[DirectoryEntry] {
        match &self.entries {
            NodeEntries::Directory(entries) => entries,
            NodeEntries::Leaf(_) => &[],
        }
    }

    /// Returns a copy of the entry at `index`.
    pub fn entry(&self, index: usize) -> Option<Entry> {
        match &self.entries {
            NodeEntries::Leaf(entries) => entries.get(index).cloned().map(Entry::Leaf),
            NodeEntries::Directory(entries) => entries.get(index).cloned().map(Entry::Directory),
        }
    }

    pub fn add_leaf_entry(&mut self, entry: LeafEntry) -> SpatialResult<()> {
        match &mut self.entries {
            NodeEntries::Leaf(entries) => {
                entries.push(entry);
                Ok(())
            }
            NodeEntries::Directory(_) => Err(self.mismatch(NodeKind::Leaf)),
        }
    }

    pub fn add_directory_entry(&mut self, entry: DirectoryEntry) -> SpatialResult<()> {
        match &mut self.entries {
            NodeEntries::Directory(entries) => {
                entries.push(entry);
                Ok(())
            }
            NodeEntries::Leaf(_) => Err(self.mismatch(NodeKind::Directory)),
        }
    }

    /// Adds an entry of either kind, rejecting one that does not match the node.
    pub fn add_entry(&mut self, entry: Entry) -> SpatialResult<()> {
        match entry {
            Entry::Leaf(e) => self.add_leaf_entry(e),
            Entry::Directory(e) => self.add_directory_entry(e),
        }
    }

    /// The minimum bounding rectangle of all entries, `None` for an empty node.
    pub fn compute_mbr(&self) -> Option<HyperBoundingBox> {
        match &self.entries {
            NodeEntries::Leaf(entries) => {
                HyperBoundingBox::union_all(entries.iter().map(|e| &e.mbr))
            }
            NodeEntries::Directory(entries) => {
                HyperBoundingBox::union_all(entries.iter().map(|e| &e.mbr))
            }
        }
    }

    /// Directory entry pointing at this node, or `None` for an empty node.
    pub fn to_directory_entry(&self) -> Option<DirectoryEntry> {
        self.compute_mbr()
            .map(|mbr| DirectoryEntry::new(mbr, self.page_id))
    }

    fn mismatch(&self, found: NodeKind) -> SpatialError {
        SpatialError::KindMismatch {
            page_id: self.page_id,
            expected: self.kind(),
            found,
        }
    }
}

// ============================================================================
// Page with Checksum
// ============================================================================

/// A page wrapped with CRC32 checksum for corruption detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWithChecksum {
    /// CRC32 checksum of the node data
    pub checksum: u32,
    /// The actual node data
    pub node: Node,
}

impl PageWithChecksum {
    pub fn new(node: Node) -> SpatialResult<Self> {
        let checksum = Self::calculate_checksum(&node)?;
        Ok(Self { checksum, node })
    }

    /// Calculate CRC32 checksum of node data
    pub fn calculate_checksum(node: &Node) -> SpatialResult<u32> {
        let serialized = bincode::serde::encode_to_vec(node, bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        Ok(crc32(&serialized))
    }

    /// Verify checksum and consume self to return node
    pub fn into_node(self) -> SpatialResult<Node> {
        let expected = Self::calculate_checksum(&self.node)?;
        if self.checksum != expected {
            return Err(SpatialError::Corrupted(format!(
                "page {} checksum mismatch (expected: {:x}, got: {:x})",
                self.node.page_id, expected, self.checksum
            )));
        }
        Ok(self.node)
    }
}

/// CRC32-MPEG2
fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFFFFFF;
    const POLY: u32 = 0x04C11DB7;

    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x80000000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc ^ 0xFFFFFFFF
}

// ============================================================================
// File Header
// ============================================================================

/// File header stored in page 0 of a file-backed tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub next_page_id: PageId,
    /// Root page, `None` until a tree has been built in this file
    pub root_page: Option<PageId>,
    pub capacity: Option<CapacityPolicy>,
}

impl FileHeader {
    pub fn new(page_size: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            page_size,
            next_page_id: 1,
            root_page: None,
            capacity: None,
        }
    }

    pub fn validate(&self) -> SpatialResult<()> {
        if self.magic != MAGIC {
            return Err(SpatialError::Corrupted(
                "invalid file format (bad magic)".into(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(SpatialError::InvalidOperation(format!(
                "unsupported file format version {}",
                self.version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(min: &[f64], max: &[f64]) -> HyperBoundingBox {
        HyperBoundingBox::new(min.to_vec(), max.to_vec())
    }

    #[test]
    fn test_leaf_node_rejects_directory_entry() {
        let mut node = Node::new_leaf(7);
        node.add_leaf_entry(LeafEntry::new(bbox(&[0.0], &[1.0]), 1))
            .unwrap();
        let err = node
            .add_directory_entry(DirectoryEntry::new(bbox(&[0.0], &[1.0]), 3))
            .unwrap_err();
        match err {
            SpatialError::KindMismatch {
                page_id,
                expected,
                found,
            } => {
                assert_eq!(page_id, 7);
                assert_eq!(expected, NodeKind::Leaf);
                assert_eq!(found, NodeKind::Directory);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(node.len(), 1);
    }

    #[test]
    fn test_directory_node_rejects_leaf_entry() {
        let mut node = Node::new_directory(2);
        let result = node.add_entry(Entry::Leaf(LeafEntry::new(bbox(&[0.0], &[1.0]), 1)));
        assert!(matches!(result, Err(SpatialError::KindMismatch { .. })));
        assert!(node.is_empty());
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_compute_mbr() {
        let mut node = Node::new_directory(1);
        assert!(node.compute_mbr().is_none());
        node.add_directory_entry(DirectoryEntry::new(bbox(&[0.0, 0.0], &[1.0, 1.0]), 2))
            .unwrap();
        node.add_directory_entry(DirectoryEntry::new(bbox(&[-3.0, 0.5], &[0.0, 4.0]), 3))
            .unwrap();
        assert_eq!(node.compute_mbr().unwrap(), bbox(&[-3.0, 0.0], &[1.0, 4.0]));

        let entry = node.to_directory_entry().unwrap();
        assert_eq!(entry.child, 1);
        assert_eq!(entry.mbr, bbox(&[-3.0, 0.0], &[1.0, 4.0]));
    }

    #[test]
    fn test_entry_access() {
        let mut node = Node::new_leaf(4);
        node.add_leaf_entry(LeafEntry::new(bbox(&[1.0], &[2.0]), 10))
            .unwrap();
        assert_eq!(node.kind(), NodeKind::Leaf);
        assert_eq!(node.entry(0).unwrap().kind(), NodeKind::Leaf);
        assert!(node.entry(1).is_none());
        assert_eq!(node.leaf_entries().len(), 1);
        assert!(node.directory_entries().is_empty());
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut node = Node::new_leaf(3);
        node.add_leaf_entry(LeafEntry::new(bbox(&[0.0, 0.0], &[1.0, 1.0]), 5))
            .unwrap();
        let page = PageWithChecksum::new(node.clone()).unwrap();
        assert_eq!(page.clone().into_node().unwrap(), node);

        let mut tampered = page;
        tampered.checksum ^= 1;
        assert!(matches!(
            tampered.into_node(),
            Err(SpatialError::Corrupted(_))
        ));
    }

    #[test]
    fn test_file_header_validate() {
        let header = FileHeader::new(4096);
        assert!(header.validate().is_ok());

        let mut bad_magic = header.clone();
        bad_magic.magic = 0;
        assert!(bad_magic.validate().is_err());

        let mut bad_version = header;
        bad_version.version = FORMAT_VERSION + 1;
        assert!(matches!(
            bad_version.validate(),
            Err(SpatialError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_kind_mismatch_message() {
        let err = SpatialError::KindMismatch {
            page_id: 9,
            expected: NodeKind::Directory,
            found: NodeKind::Leaf,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected leaf item while filling directory node 9"
        );
    }
}
