//! Tree configuration module.
//!
//! This module provides the tunables shared by the tree engine and the
//! file-backed page store.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::rtree::capacity::CapacityPolicy;
use crate::rtree::rtree_constants::{
    DEFAULT_CACHE_PAGES, DEFAULT_PAGE_SIZE, DEFAULT_RELATIVE_MIN_FILL,
};
use crate::rtree::rtree_types::SpatialResult;

/// Tree configuration wrapper.
///
/// A cloneable, thread-safe configuration holder.
///
/// # Example
///
/// ```rust
/// use paged_rstar::RTreeConfig;
///
/// let config = RTreeConfig::new()
///     .with_page_size(8192)
///     .with_relative_min_fill(0.3)
///     .with_cache_pages(64);
/// assert_eq!(config.page_size(), 8192);
/// ```
#[derive(Clone)]
pub struct RTreeConfig {
    inner: Arc<RTreeConfigInner>,
}

/// Internal configuration storage.
struct RTreeConfigInner {
    /// Size of one node page in bytes.
    page_size: AtomicUsize,

    /// Minimum node fill relative to capacity, stored as `f64` bits.
    relative_min_fill: AtomicU64,

    /// Read cache size of the file store, in pages.
    cache_pages: AtomicUsize,

    /// Explicit capacities; derived from the page size when absent.
    capacity: RwLock<Option<CapacityPolicy>>,
}

impl RTreeConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - Page size: 4096 bytes
    /// - Relative minimum fill: 0.4
    /// - Cache pages: 256
    /// - Capacity: derived from page size and dimensionality
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RTreeConfigInner::new()),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.inner.page_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_page_size(&self, page_size: usize) {
        self.inner.page_size.store(page_size, Ordering::Relaxed);
    }

    /// Sets the page size in bytes.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.set_page_size(page_size);
        self
    }

    #[inline]
    pub fn relative_min_fill(&self) -> f64 {
        f64::from_bits(self.inner.relative_min_fill.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_relative_min_fill(&self, fill: f64) {
        self.inner
            .relative_min_fill
            .store(fill.to_bits(), Ordering::Relaxed);
    }

    /// Sets the minimum fill used when deriving node minimums.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_relative_min_fill(self, fill: f64) -> Self {
        self.set_relative_min_fill(fill);
        self
    }

    #[inline]
    pub fn cache_pages(&self) -> usize {
        self.inner.cache_pages.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_cache_pages(&self, pages: usize) {
        self.inner.cache_pages.store(pages, Ordering::Relaxed);
    }

    /// Sets the file store read cache size in pages.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_cache_pages(self, pages: usize) -> Self {
        self.set_cache_pages(pages);
        self
    }

    /// Explicit capacity policy, if one was configured.
    pub fn capacity(&self) -> Option<CapacityPolicy> {
        *self.inner.capacity.read()
    }

    pub fn set_capacity(&self, capacity: CapacityPolicy) {
        *self.inner.capacity.write() = Some(capacity);
    }

    /// Fixes node capacities instead of deriving them from the page size.
    /// Builder-style method for chaining.
    pub fn with_capacity(self, capacity: CapacityPolicy) -> Self {
        self.set_capacity(capacity);
        self
    }

    /// The capacity policy for objects of the given dimensionality: the
    /// explicit one if set, otherwise derived from page size and fill.
    pub fn resolve_capacity(&self, dimensionality: usize) -> SpatialResult<CapacityPolicy> {
        match self.capacity() {
            Some(capacity) => Ok(capacity),
            None => CapacityPolicy::from_page_size(
                self.page_size(),
                dimensionality,
                self.relative_min_fill(),
            ),
        }
    }
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RTreeConfigInner {
    fn new() -> Self {
        Self {
            page_size: AtomicUsize::new(DEFAULT_PAGE_SIZE),
            relative_min_fill: AtomicU64::new(DEFAULT_RELATIVE_MIN_FILL.to_bits()),
            cache_pages: AtomicUsize::new(DEFAULT_CACHE_PAGES),
            capacity: RwLock::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RTreeConfig::new();
        assert_eq!(config.page_size(), 4096);
        assert_eq!(config.relative_min_fill(), 0.4);
        assert_eq!(config.cache_pages(), 256);
        assert!(config.capacity().is_none());
    }

    #[test]
    fn test_config_builder_chain() {
        let capacity = CapacityPolicy::new(10, 4, 6, 2).unwrap();
        let config = RTreeConfig::default()
            .with_page_size(1024)
            .with_relative_min_fill(0.25)
            .with_cache_pages(8)
            .with_capacity(capacity);
        assert_eq!(config.page_size(), 1024);
        assert_eq!(config.relative_min_fill(), 0.25);
        assert_eq!(config.cache_pages(), 8);
        assert_eq!(config.capacity(), Some(capacity));
    }

    #[test]
    fn test_config_clone_shares_state() {
        let config = RTreeConfig::new();
        let other = config.clone();
        other.set_page_size(2048);
        assert_eq!(config.page_size(), 2048);
    }

    #[test]
    fn test_resolve_capacity() {
        let config = RTreeConfig::new();
        let derived = config.resolve_capacity(2).unwrap();
        assert_eq!(
            derived,
            CapacityPolicy::from_page_size(4096, 2, 0.4).unwrap()
        );

        let explicit = CapacityPolicy::new(5, 2, 4, 2).unwrap();
        config.set_capacity(explicit);
        assert_eq!(config.resolve_capacity(7).unwrap(), explicit);
    }
}
