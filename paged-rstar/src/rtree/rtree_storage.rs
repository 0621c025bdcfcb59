//! File-backed page store.
//!
//! One node per fixed-size page. Page 0 holds the [`FileHeader`]; page `n`
//! lives at byte offset `n * page_size`. Every write goes straight to the
//! file (write-through) and also lands in an LRU read cache.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error};
use parking_lot::{Mutex, RwLock};

use super::page_store::{PageStore, StoreStats, TreeMetadata};
use super::rtree_cache::PageCache;
use super::rtree_types::{
    FileHeader, Node, PageId, PageWithChecksum, SpatialError, SpatialResult,
};
use crate::config::RTreeConfig;

/// Pages smaller than this cannot hold a header plus a useful node
pub const MIN_PAGE_SIZE: usize = 256;

/// Upper bound on the encoded header size, read before the page size is known
const HEADER_PROBE_SIZE: usize = 512;

/// Reads and writes individual node pages of a single file.
pub struct FilePageStore {
    file: RwLock<File>,
    path: PathBuf,
    page_size: usize,
    header: RwLock<FileHeader>,
    cache: Mutex<PageCache>,
    stats: StorageStatistics,
}

/// Internal statistics tracking
struct StorageStatistics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl StorageStatistics {
    fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            disk_reads: AtomicU64::new(0),
            disk_writes: AtomicU64::new(0),
        }
    }
}

impl FilePageStore {
    /// Create a new, empty store file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>, config: &RTreeConfig) -> SpatialResult<Self> {
        let page_size = config.page_size();
        if page_size < MIN_PAGE_SIZE {
            return Err(SpatialError::InvalidConfiguration(format!(
                "page size {} is below the minimum of {}",
                page_size, MIN_PAGE_SIZE
            )));
        }

        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let store = Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size,
            header: RwLock::new(FileHeader::new(page_size as u32)),
            cache: Mutex::new(PageCache::new(config.cache_pages())),
            stats: StorageStatistics::new(),
        };
        store.write_header()?;
        store.file.write().sync_all()?;
        debug!("Created page file {:?} with page size {}", path, page_size);
        Ok(store)
    }

    /// Open an existing store file. Only the header is read.
    pub fn open(path: impl AsRef<Path>, config: &RTreeConfig) -> SpatialResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let file_len = file.metadata()?.len() as usize;
        let mut buffer = vec![0u8; file_len.min(HEADER_PROBE_SIZE)];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buffer)?;
        let header: FileHeader =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(header, _)| header)
                .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        header.validate()?;

        let page_size = header.page_size as usize;
        if page_size < MIN_PAGE_SIZE {
            return Err(SpatialError::Corrupted(format!(
                "header declares page size {}",
                page_size
            )));
        }
        debug!(
            "Opened page file {:?}: page size {}, {} pages allocated",
            path,
            page_size,
            header.next_page_id - 1
        );

        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size,
            header: RwLock::new(header),
            cache: Mutex::new(PageCache::new(config.cache_pages())),
            stats: StorageStatistics::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently held by the read cache
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }

    fn write_header(&self) -> SpatialResult<()> {
        let bytes = bincode::serde::encode_to_vec(&*self.header.read(), bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        self.write_page_bytes(0, bytes)
    }

    fn write_page_bytes(&self, page_id: PageId, mut bytes: Vec<u8>) -> SpatialResult<()> {
        if bytes.len() > self.page_size {
            return Err(SpatialError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Page {} too large: {} bytes (max {})",
                    page_id,
                    bytes.len(),
                    self.page_size
                ),
            )));
        }
        bytes.resize(self.page_size, 0);

        let offset = page_id * self.page_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn read_page_from_disk(&self, page_id: PageId) -> SpatialResult<Node> {
        let offset = page_id * self.page_size as u64;
        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.write();
            file.seek(SeekFrom::Start(offset))?;
            if let Err(e) = file.read_exact(&mut buffer) {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    return Err(SpatialError::PageNotFound(page_id));
                }
                return Err(e.into());
            }
        }

        let page: PageWithChecksum =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(page, _)| page)
                .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        let node = page.into_node().inspect_err(|e| {
            error!("Failed to load page {}: {}", page_id, e);
        })?;
        if node.page_id() != page_id {
            return Err(SpatialError::Corrupted(format!(
                "page {} holds node {}",
                page_id,
                node.page_id()
            )));
        }
        Ok(node)
    }
}

impl PageStore for FilePageStore {
    fn allocate_page_id(&self) -> SpatialResult<PageId> {
        let mut header = self.header.write();
        let page_id = header.next_page_id;
        header.next_page_id += 1;
        Ok(page_id)
    }

    fn write_node(&self, node: &Node) -> SpatialResult<()> {
        let page_id = node.page_id();
        if page_id == 0 || page_id >= self.header.read().next_page_id {
            return Err(SpatialError::PageNotFound(page_id));
        }

        let page = PageWithChecksum::new(node.clone())?;
        let bytes = bincode::serde::encode_to_vec(&page, bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        self.write_page_bytes(page_id, bytes)?;
        self.stats.disk_writes.fetch_add(1, Ordering::Relaxed);

        self.cache.lock().insert(page_id, page.node);
        Ok(())
    }

    fn read_node(&self, page_id: PageId) -> SpatialResult<Node> {
        if page_id == 0 || page_id >= self.header.read().next_page_id {
            return Err(SpatialError::PageNotFound(page_id));
        }

        if let Some(node) = self.cache.lock().get(page_id) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(node.clone());
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.stats.disk_reads.fetch_add(1, Ordering::Relaxed);
        let node = self.read_page_from_disk(page_id)?;
        self.cache.lock().insert(page_id, node.clone());
        Ok(node)
    }

    fn metadata(&self) -> SpatialResult<Option<TreeMetadata>> {
        let header = self.header.read();
        Ok(match (header.root_page, header.capacity) {
            (Some(root_page), Some(capacity)) => Some(TreeMetadata {
                root_page,
                capacity,
            }),
            _ => None,
        })
    }

    fn set_metadata(&self, metadata: TreeMetadata) -> SpatialResult<()> {
        {
            let mut header = self.header.write();
            header.root_page = Some(metadata.root_page);
            header.capacity = Some(metadata.capacity);
        }
        self.write_header()
    }

    fn flush(&self) -> SpatialResult<()> {
        self.write_header()?;
        self.file.write().sync_all()?;
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            page_count: self.header.read().next_page_id - 1,
            reads: self.stats.disk_reads.load(Ordering::Relaxed),
            writes: self.stats.disk_writes.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FilePageStore {
    fn drop(&mut self) {
        // Best effort, keeps next_page_id in sync with the pages on disk
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_box::HyperBoundingBox;
    use crate::rtree::capacity::CapacityPolicy;
    use crate::rtree::rtree_types::{DirectoryEntry, LeafEntry};
    use tempfile::tempdir;

    fn config() -> RTreeConfig {
        RTreeConfig::new().with_page_size(1024).with_cache_pages(4)
    }

    #[test]
    fn test_storage_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let store = FilePageStore::create(&path, &config()).unwrap();
        assert!(path.exists());
        assert_eq!(store.page_size(), 1024);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024);
    }

    #[test]
    fn test_storage_rejects_tiny_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let result = FilePageStore::create(&path, &RTreeConfig::new().with_page_size(64));
        assert!(matches!(result, Err(SpatialError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_storage_page_write_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let store = FilePageStore::create(&path, &config()).unwrap();

        let id = store.allocate_page_id().unwrap();
        assert_eq!(id, 1);
        let mut node = Node::new_leaf(id);
        node.add_leaf_entry(LeafEntry::new(
            HyperBoundingBox::new(vec![0.0, 0.0], vec![1.0, 1.0]),
            42,
        ))
        .unwrap();
        store.write_node(&node).unwrap();
        assert_eq!(store.read_node(id).unwrap(), node);
        assert_eq!(store.stats().cache_hits, 1);
    }

    #[test]
    fn test_storage_page_zero_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let store = FilePageStore::create(&path, &config()).unwrap();

        assert!(store.write_node(&Node::new_leaf(0)).is_err());
        assert!(store.read_node(0).is_err());
        assert!(matches!(
            store.read_node(5),
            Err(SpatialError::PageNotFound(5))
        ));
    }

    #[test]
    fn test_storage_oversized_node() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let store = FilePageStore::create(&path, &config()).unwrap();

        let id = store.allocate_page_id().unwrap();
        let mut node = Node::new_directory(id);
        for i in 0..100 {
            node.add_directory_entry(DirectoryEntry::new(
                HyperBoundingBox::point(vec![i as f64, i as f64]),
                i,
            ))
            .unwrap();
        }
        assert!(matches!(store.write_node(&node), Err(SpatialError::Io(_))));
    }

    #[test]
    fn test_storage_reopen_reads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let capacity = CapacityPolicy::new(8, 3, 8, 3).unwrap();

        {
            let store = FilePageStore::create(&path, &config()).unwrap();
            let first = store.allocate_page_id().unwrap();
            let second = store.allocate_page_id().unwrap();
            store.write_node(&Node::new_leaf(first)).unwrap();
            store.write_node(&Node::new_directory(second)).unwrap();
            store
                .set_metadata(TreeMetadata {
                    root_page: second,
                    capacity,
                })
                .unwrap();
            store.flush().unwrap();
        }

        let store = FilePageStore::open(&path, &config()).unwrap();
        assert_eq!(store.cached_pages(), 0);
        let metadata = store.metadata().unwrap().unwrap();
        assert_eq!(metadata.root_page, 2);
        assert_eq!(metadata.capacity, capacity);

        assert!(store.read_node(1).unwrap().is_leaf());
        assert!(!store.read_node(2).unwrap().is_leaf());
        let stats = store.stats();
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(store.allocate_page_id().unwrap(), 3);
    }

    #[test]
    fn test_storage_cache_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        let store = FilePageStore::create(&path, &config()).unwrap();
        for _ in 0..10 {
            let id = store.allocate_page_id().unwrap();
            store.write_node(&Node::new_leaf(id)).unwrap();
        }
        assert_eq!(store.cached_pages(), 4);
        assert_eq!(store.stats().writes, 10);
    }

    #[test]
    fn test_storage_detects_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rtree");
        {
            let store = FilePageStore::create(&path, &config()).unwrap();
            let id = store.allocate_page_id().unwrap();
            let mut node = Node::new_leaf(id);
            node.add_leaf_entry(LeafEntry::new(HyperBoundingBox::point(vec![1.0]), 7))
                .unwrap();
            store.write_node(&node).unwrap();
            store.flush().unwrap();
        }

        // Flip a byte of the coordinate data in page 1
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(1024 + 34)).unwrap();
            let mut byte = [0u8; 1];
            file.read_exact(&mut byte).unwrap();
            file.seek(SeekFrom::Start(1024 + 34)).unwrap();
            file.write_all(&[byte[0] ^ 0xFF]).unwrap();
        }

        let store = FilePageStore::open(&path, &config()).unwrap();
        assert!(store.read_node(1).is_err());
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, vec![0xABu8; 2048]).unwrap();
        assert!(FilePageStore::open(&path, &config()).is_err());
    }
}
