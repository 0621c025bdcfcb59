//! LRU read cache for file-backed pages.
//!
//! The file store writes through, so cached pages are always identical to
//! their on-disk copy and can be dropped at any time.

use std::collections::{HashMap, VecDeque};

use super::rtree_types::{Node, PageId};

/// LRU cache for tree pages.
///
/// Pages enter the cache only when they are read or written; nothing is
/// preloaded.
pub struct PageCache {
    pages: HashMap<PageId, Node>,
    /// LRU order (front = oldest, back = newest)
    lru_order: VecDeque<PageId>,
    max_pages: usize,
}

impl PageCache {
    pub fn new(max_pages: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_order: VecDeque::new(),
            max_pages,
        }
    }

    /// Get a page, marking it most recently used.
    pub fn get(&mut self, page_id: PageId) -> Option<&Node> {
        if self.pages.contains_key(&page_id) {
            self.touch(page_id);
        }
        self.pages.get(&page_id)
    }

    /// Insert or replace a page, evicting the least recently used pages
    /// beyond the capacity. A zero-sized cache keeps nothing.
    pub fn insert(&mut self, page_id: PageId, node: Node) {
        if self.max_pages == 0 {
            return;
        }
        if self.pages.insert(page_id, node).is_some() {
            self.touch(page_id);
        } else {
            self.lru_order.push_back(page_id);
        }
        while self.pages.len() > self.max_pages {
            if self.evict_oldest().is_none() {
                break;
            }
        }
    }

    /// Remove and return the least recently used page.
    pub fn evict_oldest(&mut self) -> Option<(PageId, Node)> {
        while let Some(page_id) = self.lru_order.pop_front() {
            if let Some(node) = self.pages.remove(&page_id) {
                return Some((page_id, node));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    fn touch(&mut self, page_id: PageId) {
        self.lru_order.retain(|&id| id != page_id);
        self.lru_order.push_back(page_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cache_new() {
        let cache = PageCache::new(10);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_page_cache_insert_and_get() {
        let mut cache = PageCache::new(10);
        cache.insert(1, Node::new_leaf(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).unwrap().page_id(), 1);
        assert!(cache.get(999).is_none());
    }

    #[test]
    fn test_page_cache_evicts_least_recently_used() {
        let mut cache = PageCache::new(3);
        cache.insert(1, Node::new_leaf(1));
        cache.insert(2, Node::new_leaf(2));
        cache.insert(3, Node::new_leaf(3));

        // Access page 1 to make it most recent
        let _ = cache.get(1);
        cache.insert(4, Node::new_leaf(4));

        assert_eq!(cache.len(), 3);
        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
        assert!(cache.get(4).is_some());
    }

    #[test]
    fn test_page_cache_replace_keeps_size() {
        let mut cache = PageCache::new(2);
        cache.insert(1, Node::new_leaf(1));
        cache.insert(1, Node::new_directory(1));
        assert_eq!(cache.len(), 1);
        assert!(!cache.get(1).unwrap().is_leaf());
    }

    #[test]
    fn test_page_cache_lru_order() {
        let mut cache = PageCache::new(10);
        cache.insert(1, Node::new_leaf(1));
        cache.insert(2, Node::new_leaf(2));
        cache.insert(3, Node::new_leaf(3));
        let _ = cache.get(1);

        assert_eq!(cache.evict_oldest().unwrap().0, 2);
        assert_eq!(cache.evict_oldest().unwrap().0, 3);
        assert_eq!(cache.evict_oldest().unwrap().0, 1);
        assert!(cache.evict_oldest().is_none());
    }

    #[test]
    fn test_zero_sized_cache() {
        let mut cache = PageCache::new(0);
        cache.insert(1, Node::new_leaf(1));
        assert_eq!(cache.len(), 0);
        assert!(cache.get(1).is_none());
    }
}
