//! RStarTree implementation.

use log::{debug, error, trace};

use crate::bounding_box::{HyperBoundingBox, SpatialComparable};
use crate::config::RTreeConfig;
use crate::strategy::{BulkSplit, InsertionStrategy};

use super::capacity::CapacityPolicy;
use super::integrity::{self, IntegrityReport};
use super::page_store::{PageStore, TreeMetadata};
use super::rtree_types::{
    DirectoryEntry, Entry, LeafEntry, Node, NodeKind, PageId, SpatialError, SpatialResult,
};

/// Paged R*-tree maintenance engine.
///
/// The engine owns the root page id, the height and the capacity policy.
/// Nodes live in the page store and are only ever addressed by page id.
///
/// A height of zero means the tree has not been initialized yet, either by
/// [`RStarTree::create_empty_root`] or by [`RStarTree::bulk_load`].
pub struct RStarTree<S, B, I> {
    store: S,
    bulk_split: B,
    insertion_strategy: I,
    config: RTreeConfig,
    root_page_id: PageId,
    height: usize,
    capacity: Option<CapacityPolicy>,
    root_mbr: Option<HyperBoundingBox>,
}

impl<S, B, I> RStarTree<S, B, I>
where
    S: PageStore,
    B: BulkSplit,
    I: InsertionStrategy,
{
    /// Creates an uninitialized tree on `store`. The root page id is
    /// allocated right away; nothing is written yet.
    pub fn new(
        store: S,
        bulk_split: B,
        insertion_strategy: I,
        config: RTreeConfig,
    ) -> SpatialResult<Self> {
        let root_page_id = store.allocate_page_id()?;
        debug!("Allocated root page {} for a new tree", root_page_id);

        Ok(Self {
            store,
            bulk_split,
            insertion_strategy,
            config,
            root_page_id,
            height: 0,
            capacity: None,
            root_mbr: None,
        })
    }

    /// Attaches to a tree previously built on `store`.
    ///
    /// Only the store metadata and the pages along the leftmost path are
    /// read; the height is recomputed from them.
    pub fn open(
        store: S,
        bulk_split: B,
        insertion_strategy: I,
        config: RTreeConfig,
    ) -> SpatialResult<Self> {
        let metadata = store.metadata()?.ok_or(SpatialError::NotInitialized)?;

        let mut tree = Self {
            store,
            bulk_split,
            insertion_strategy,
            config,
            root_page_id: metadata.root_page,
            height: 0,
            capacity: Some(metadata.capacity),
            root_mbr: None,
        };
        let root = tree.store.read_node(tree.root_page_id)?;
        tree.root_mbr = root.compute_mbr();
        tree.height = tree.compute_height()?;

        debug!(
            "Opened tree with root page {} and height {}",
            tree.root_page_id, tree.height
        );
        Ok(tree)
    }

    /// Tree height, zero while uninitialized.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Capacity policy, set once the tree is initialized.
    pub fn capacity(&self) -> Option<CapacityPolicy> {
        self.capacity
    }

    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.height > 0
    }

    /// MBR of the whole tree, `None` when it holds no objects.
    pub fn root_mbr(&self) -> Option<&HyperBoundingBox> {
        self.root_mbr.as_ref()
    }

    /// A directory entry pointing at the root, as a parent of the root
    /// would hold it.
    pub fn root_entry(&self) -> Option<DirectoryEntry> {
        self.root_mbr
            .as_ref()
            .map(|mbr| DirectoryEntry::new(mbr.clone(), self.root_page_id))
    }

    /// True iff `node` holds exactly as many entries as its kind allows.
    pub fn has_overflow(&self, node: &Node) -> SpatialResult<bool> {
        Ok(self.require_capacity()?.has_overflow(node))
    }

    /// True iff `node` holds fewer entries than its kind's minimum.
    /// Not meaningful for the root, which has no minimum.
    pub fn has_underflow(&self, node: &Node) -> SpatialResult<bool> {
        Ok(self.require_capacity()?.has_underflow(node))
    }

    /// Counts the levels on the path from the root along the first entry of
    /// every directory node. The descent stops at a leaf or at an empty
    /// directory node.
    pub fn compute_height(&self) -> SpatialResult<usize> {
        let mut node = self.store.read_node(self.root_page_id)?;
        let mut height = 1;
        loop {
            let next = match node.directory_entries().first() {
                Some(entry) => self.get_node(entry)?,
                None => break,
            };
            node = next;
            height += 1;
        }
        Ok(height)
    }

    /// Initializes the tree with an empty leaf as root.
    pub fn create_empty_root(&mut self, dimensionality: usize) -> SpatialResult<()> {
        self.ensure_uninitialized()?;
        let capacity = self.resolve_capacity(dimensionality)?;

        let root = Node::new_leaf(self.root_page_id);
        self.write_node(&root)?;
        self.store.set_metadata(TreeMetadata {
            root_page: self.root_page_id,
            capacity,
        })?;

        self.capacity = Some(capacity);
        self.root_mbr = None;
        self.height = 1;
        debug!("Created empty root at page {}", self.root_page_id);
        Ok(())
    }

    /// Builds the tree bottom-up from a batch of objects.
    ///
    /// The batch must be non-empty, of uniform dimensionality, with finite
    /// coordinates and `min <= max` in every dimension, and the tree must not
    /// be initialized yet. These conditions are checked before anything is
    /// written.
    ///
    /// A failure after the first write leaves already written pages behind;
    /// such a tree stays uninitialized and should be discarded.
    pub fn bulk_load<T>(&mut self, objects: T) -> SpatialResult<()>
    where
        T: IntoIterator<Item = LeafEntry>,
    {
        self.ensure_uninitialized()?;
        let objects: Vec<LeafEntry> = objects.into_iter().collect();
        let dimensionality = match objects.first() {
            Some(first) => first.dimensionality(),
            None => {
                return Err(SpatialError::InvalidOperation(
                    "cannot bulk load an empty batch".into(),
                ))
            }
        };
        for object in &objects {
            validate_object(object, dimensionality)?;
        }
        let capacity = self.resolve_capacity(dimensionality)?;
        let total = objects.len();

        if total <= capacity.leaf_capacity() {
            let mut root = Node::new_leaf(self.root_page_id);
            for object in objects {
                root.add_leaf_entry(object)?;
            }
            self.write_node(&root)?;
            let root_mbr = root.compute_mbr();
            self.commit(capacity, 1, root_mbr)?;
            debug!(
                "Bulk loaded {} objects into a single leaf root, height 1",
                total
            );
            return Ok(());
        }

        // Reserve the root page until the real root is known
        self.write_node(&Node::new_directory(self.root_page_id))?;

        let mut level = self.create_leaf_nodes(objects, &capacity)?;
        let mut height = 1;
        let mut num_nodes = level.len();
        debug!("Number of leaf nodes: {}", level.len());

        while level.len() > capacity.dir_capacity() - 1 {
            level = self.create_directory_nodes(level, &capacity)?;
            height += 1;
            num_nodes += level.len();
            debug!("Number of directory nodes on level {}: {}", height, level.len());
        }

        let items: Vec<Entry> = level.into_iter().map(Entry::Directory).collect();
        let root_mbr = self.create_root(Node::new_directory(self.root_page_id), items)?;
        self.commit(capacity, height + 1, Some(root_mbr))?;
        num_nodes += 1;

        debug!(
            "Bulk loaded {} objects: {} nodes, height {}",
            total, num_nodes, self.height
        );
        Ok(())
    }

    /// Loads the child node referenced by `entry`.
    pub fn get_node(&self, entry: &DirectoryEntry) -> SpatialResult<Node> {
        self.store.read_node(entry.child)
    }

    pub fn root(&self) -> SpatialResult<Node> {
        if !self.is_initialized() {
            return Err(SpatialError::NotInitialized);
        }
        self.store.read_node(self.root_page_id)
    }

    /// The child of directory node `node` that should receive an object
    /// with bounds `mbr`.
    pub fn choose_subtree(
        &self,
        node: &Node,
        mbr: &HyperBoundingBox,
    ) -> SpatialResult<DirectoryEntry> {
        if node.is_leaf() {
            return Err(SpatialError::InvalidOperation(format!(
                "cannot choose a subtree below leaf node {}",
                node.page_id()
            )));
        }
        let candidates = node.directory_entries();
        let index = self
            .insertion_strategy
            .choose(candidates, mbr)
            .ok_or_else(|| {
                SpatialError::InvalidOperation(format!(
                    "directory node {} has no children",
                    node.page_id()
                ))
            })?;
        candidates.get(index).cloned().ok_or_else(|| {
            SpatialError::InvalidOperation(format!(
                "insertion strategy chose child {} of {}",
                index,
                candidates.len()
            ))
        })
    }

    /// Page ids from the root down to the leaf that should receive an
    /// object with bounds `mbr`.
    pub fn choose_path(&self, mbr: &HyperBoundingBox) -> SpatialResult<Vec<PageId>> {
        if let Some(root_mbr) = &self.root_mbr {
            if root_mbr.dimensionality() != mbr.dimensionality() {
                return Err(SpatialError::InvalidOperation(format!(
                    "object has {} dimensions, tree has {}",
                    mbr.dimensionality(),
                    root_mbr.dimensionality()
                )));
            }
        }

        let mut node = self.root()?;
        let mut path = vec![node.page_id()];
        while !node.is_leaf() {
            let entry = self.choose_subtree(&node, mbr)?;
            node = self.get_node(&entry)?;
            path.push(node.page_id());
        }
        Ok(path)
    }

    /// Walks the whole tree and verifies its structural invariants.
    pub fn check_integrity(&self) -> SpatialResult<IntegrityReport> {
        let capacity = self.require_capacity()?;
        if !self.is_initialized() {
            return Err(SpatialError::NotInitialized);
        }
        integrity::check_tree(&self.store, self.root_page_id, &capacity, self.height)
    }

    pub fn flush(&self) -> SpatialResult<()> {
        self.store.flush()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn create_leaf_nodes(
        &self,
        objects: Vec<LeafEntry>,
        capacity: &CapacityPolicy,
    ) -> SpatialResult<Vec<DirectoryEntry>> {
        self.create_nodes(
            objects,
            NodeKind::Leaf,
            capacity.leaf_minimum(),
            capacity.leaf_capacity(),
        )
    }

    /// One directory level above `children`. Bulk loading keeps one slot of
    /// every directory node free.
    fn create_directory_nodes(
        &self,
        children: Vec<DirectoryEntry>,
        capacity: &CapacityPolicy,
    ) -> SpatialResult<Vec<DirectoryEntry>> {
        self.create_nodes(
            children,
            NodeKind::Directory,
            capacity.dir_minimum(),
            capacity.dir_capacity() - 1,
        )
    }

    /// Partitions `items` into nodes of the given kind, writes them, and
    /// returns one directory entry per new node.
    fn create_nodes<T>(
        &self,
        items: Vec<T>,
        kind: NodeKind,
        min_entries: usize,
        max_entries: usize,
    ) -> SpatialResult<Vec<DirectoryEntry>>
    where
        T: SpatialComparable + Into<Entry>,
    {
        let total = items.len();
        let groups = self.bulk_split.partition(items, min_entries, max_entries);
        debug_check_groups(total, &groups, min_entries, max_entries);

        let mut entries = Vec::with_capacity(groups.len());
        for group in groups {
            let page_id = self.store.allocate_page_id()?;
            let mut node = match kind {
                NodeKind::Leaf => Node::new_leaf(page_id),
                NodeKind::Directory => Node::new_directory(page_id),
            };
            for item in group {
                node.add_entry(item.into())?;
            }
            let entry = node.to_directory_entry().ok_or_else(|| {
                SpatialError::InvalidOperation(format!(
                    "bulk split produced an empty {} group",
                    kind
                ))
            })?;
            self.write_node(&node)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Fills `root` with `items`, writes it and returns its MBR.
    ///
    /// Every item must match the root's kind. The check covers all items
    /// before the root is touched, so on a mismatch the stored root page
    /// and the engine state stay exactly as they were.
    pub(crate) fn create_root(
        &self,
        mut root: Node,
        items: Vec<Entry>,
    ) -> SpatialResult<HyperBoundingBox> {
        let expected = root.kind();
        if let Some(item) = items.iter().find(|item| item.kind() != expected) {
            error!(
                "Unexpected {} item while finalizing {} root {}",
                item.kind(),
                expected,
                root.page_id()
            );
            return Err(SpatialError::KindMismatch {
                page_id: root.page_id(),
                expected,
                found: item.kind(),
            });
        }

        for item in items {
            root.add_entry(item)?;
        }
        let root_mbr = root.compute_mbr().ok_or_else(|| {
            SpatialError::InvalidOperation(format!("root {} has no entries", root.page_id()))
        })?;
        self.write_node(&root)?;
        Ok(root_mbr)
    }

    fn commit(
        &mut self,
        capacity: CapacityPolicy,
        height: usize,
        root_mbr: Option<HyperBoundingBox>,
    ) -> SpatialResult<()> {
        self.store.set_metadata(TreeMetadata {
            root_page: self.root_page_id,
            capacity,
        })?;
        self.capacity = Some(capacity);
        self.root_mbr = root_mbr;
        self.height = height;
        Ok(())
    }

    fn write_node(&self, node: &Node) -> SpatialResult<()> {
        trace!(
            "Writing {} page {} with {} entries",
            node.kind(),
            node.page_id(),
            node.len()
        );
        self.store.write_node(node)
    }

    fn resolve_capacity(&self, dimensionality: usize) -> SpatialResult<CapacityPolicy> {
        match self.capacity {
            Some(capacity) => Ok(capacity),
            None => self.config.resolve_capacity(dimensionality),
        }
    }

    fn require_capacity(&self) -> SpatialResult<CapacityPolicy> {
        self.capacity.ok_or(SpatialError::NotInitialized)
    }

    fn ensure_uninitialized(&self) -> SpatialResult<()> {
        if self.is_initialized() {
            return Err(SpatialError::InvalidOperation(format!(
                "tree with root page {} is already initialized",
                self.root_page_id
            )));
        }
        Ok(())
    }
}

/// Rejects objects whose rectangle cannot be ordered or bounded.
fn validate_object(object: &LeafEntry, dimensionality: usize) -> SpatialResult<()> {
    let min = object.mbr.min_coords();
    let max = object.mbr.max_coords();
    if min.len() != dimensionality || max.len() != dimensionality {
        return Err(SpatialError::InvalidOperation(format!(
            "object {} has bounds of {} and {} dimensions, expected {}",
            object.object_id,
            min.len(),
            max.len(),
            dimensionality
        )));
    }
    for (dim, (lo, hi)) in min.iter().zip(max).enumerate() {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(SpatialError::InvalidOperation(format!(
                "object {} has a non-finite bound in dimension {}",
                object.object_id, dim
            )));
        }
        if lo > hi {
            return Err(SpatialError::InvalidOperation(format!(
                "object {} has min {} above max {} in dimension {}",
                object.object_id, lo, hi, dim
            )));
        }
    }
    Ok(())
}

/// Checks the bulk split contract in debug builds.
fn debug_check_groups<T>(
    total: usize,
    groups: &[Vec<T>],
    min_entries: usize,
    max_entries: usize,
) {
    if !cfg!(debug_assertions) {
        return;
    }
    let produced: usize = groups.iter().map(Vec::len).sum();
    debug_assert_eq!(produced, total, "bulk split must keep every item");
    for (i, group) in groups.iter().enumerate() {
        debug_assert!(
            !group.is_empty() && group.len() <= max_entries,
            "group {} has {} items, maximum is {}",
            i,
            group.len(),
            max_entries
        );
        debug_assert!(
            group.len() >= min_entries || i + 1 == groups.len(),
            "group {} has {} items, minimum is {}",
            i,
            group.len(),
            min_entries
        );
    }
}

impl<S, B, I> std::fmt::Debug for RStarTree<S, B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RStarTree")
            .field("root_page_id", &self.root_page_id)
            .field("height", &self.height)
            .field("capacity", &self.capacity)
            .field("root_mbr", &self.root_mbr)
            .finish()
    }
}
