//! Trees built on the file store, closed, and reopened.

use paged_rstar::{
    FilePageStore, HyperBoundingBox, LeafEntry, LeastEnlargementInsertionStrategy, PageStore,
    RStarTree, RTreeConfig, SortTileRecursiveBulkSplit, SpatialError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

type FileTree =
    RStarTree<FilePageStore, SortTileRecursiveBulkSplit, LeastEnlargementInsertionStrategy>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> RTreeConfig {
    RTreeConfig::new().with_page_size(1024).with_cache_pages(16)
}

fn random_points(n: usize, seed: u64) -> Vec<LeafEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = rng.gen_range(-180.0..180.0);
            let y = rng.gen_range(-90.0..90.0);
            LeafEntry::new(HyperBoundingBox::point(vec![x, y]), i as u64)
        })
        .collect()
}

fn open_tree(store: FilePageStore) -> FileTree {
    RStarTree::open(
        store,
        SortTileRecursiveBulkSplit,
        LeastEnlargementInsertionStrategy,
        config(),
    )
    .unwrap()
}

#[test]
fn test_bulk_load_survives_reopen() {
    init_logger();
    let dir = tempdir().unwrap();
    let path = dir.path().join("points.rtree");
    let objects = random_points(1500, 17);

    let (root_page, height, capacity, root_mbr) = {
        let store = FilePageStore::create(&path, &config()).unwrap();
        let mut tree: FileTree = RStarTree::new(
            store,
            SortTileRecursiveBulkSplit,
            LeastEnlargementInsertionStrategy,
            config(),
        )
        .unwrap();
        tree.bulk_load(objects.clone()).unwrap();
        tree.flush().unwrap();
        assert!(tree.height() >= 3);
        (
            tree.root_page_id(),
            tree.height(),
            tree.capacity(),
            tree.root_mbr().cloned(),
        )
    };

    let store = FilePageStore::open(&path, &config()).unwrap();
    assert_eq!(store.page_size(), 1024);
    assert_eq!(store.cached_pages(), 0);

    let tree = open_tree(store);
    assert_eq!(tree.root_page_id(), root_page);
    assert_eq!(tree.height(), height);
    assert_eq!(tree.capacity(), capacity);
    assert_eq!(tree.root_mbr().cloned(), root_mbr);

    let report = tree.check_integrity().unwrap();
    assert!(report.is_valid, "{:?}", report.errors);
    assert_eq!(report.object_count, 1500);
    assert!(report.corrupted_pages.is_empty());
}

#[test]
fn test_empty_root_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.rtree");

    {
        let store = FilePageStore::create(&path, &config()).unwrap();
        let mut tree: FileTree = RStarTree::new(
            store,
            SortTileRecursiveBulkSplit,
            LeastEnlargementInsertionStrategy,
            config(),
        )
        .unwrap();
        tree.create_empty_root(2).unwrap();
    }

    let tree = open_tree(FilePageStore::open(&path, &config()).unwrap());
    assert_eq!(tree.height(), 1);
    let root = tree.root().unwrap();
    assert!(root.is_leaf());
    assert!(root.is_empty());
    assert!(tree.root_mbr().is_none());
}

#[test]
fn test_open_store_without_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blank.rtree");
    drop(FilePageStore::create(&path, &config()).unwrap());

    let result: Result<FileTree, SpatialError> = RStarTree::open(
        FilePageStore::open(&path, &config()).unwrap(),
        SortTileRecursiveBulkSplit,
        LeastEnlargementInsertionStrategy,
        config(),
    );
    assert!(matches!(result, Err(SpatialError::NotInitialized)));
}

#[test]
fn test_reads_after_reopen_go_through_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.rtree");

    {
        let store = FilePageStore::create(&path, &config()).unwrap();
        let mut tree: FileTree = RStarTree::new(
            store,
            SortTileRecursiveBulkSplit,
            LeastEnlargementInsertionStrategy,
            config(),
        )
        .unwrap();
        tree.bulk_load(random_points(300, 2)).unwrap();
    }

    let tree = open_tree(FilePageStore::open(&path, &config()).unwrap());
    let before = tree.store().stats();
    let _ = tree.root().unwrap();
    let after = tree.store().stats();
    // Opening already read the root, so this read is a cache hit
    assert_eq!(after.cache_hits, before.cache_hits + 1);
    assert_eq!(after.reads, before.reads);
    assert!(tree.store().cached_pages() <= 16);
}
