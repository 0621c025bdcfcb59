use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Anything that occupies an axis-aligned region of d-dimensional space.
///
/// Bulk splits and insertion strategies only see items through this trait,
/// so leaf entries, directory entries and raw rectangles can all be ordered
/// and grouped by the same code.
pub trait SpatialComparable {
    /// Number of dimensions of the region.
    fn dimensionality(&self) -> usize;

    /// Lower bound along dimension `dim` (zero based).
    fn min(&self, dim: usize) -> f64;

    /// Upper bound along dimension `dim` (zero based).
    fn max(&self, dim: usize) -> f64;

    /// Center of the region along dimension `dim`.
    fn center(&self, dim: usize) -> f64 {
        (self.min(dim) + self.max(dim)) / 2.0
    }
}

/// A d-dimensional axis-aligned bounding box.
///
/// `HyperBoundingBox` stores one `(min, max)` pair per dimension. It is the
/// rectangle carried by every tree entry and the unit in which minimum
/// bounding rectangles (MBRs) are computed.
///
/// # Examples
///
/// ```rust
/// use paged_rstar::HyperBoundingBox;
///
/// let a = HyperBoundingBox::new(vec![0.0, 0.0], vec![1.0, 1.0]);
/// let b = HyperBoundingBox::new(vec![2.0, -1.0], vec![3.0, 0.5]);
///
/// let mbr = a.union(&b);
/// assert_eq!(mbr.min_coords(), &[0.0, -1.0]);
/// assert_eq!(mbr.max_coords(), &[3.0, 1.0]);
/// ```
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct HyperBoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl Eq for HyperBoundingBox {}

impl Hash for HyperBoundingBox {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in self.min.iter().chain(self.max.iter()) {
            v.to_bits().hash(state);
        }
    }
}

impl std::fmt::Display for HyperBoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HyperBoundingBox(")?;
        for d in 0..self.min.len() {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{}, {}]", self.min[d], self.max[d])?;
        }
        write!(f, ")")
    }
}

impl HyperBoundingBox {
    /// Creates a new box from per-dimension lower and upper bounds.
    ///
    /// Both vectors must have the same length. Bulk loading rejects boxes
    /// that do not.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> HyperBoundingBox {
        HyperBoundingBox { min, max }
    }

    /// Creates a degenerate box covering a single point.
    pub fn point(coords: Vec<f64>) -> HyperBoundingBox {
        HyperBoundingBox {
            min: coords.clone(),
            max: coords,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.iter().zip(self.max.iter()).any(|(lo, hi)| lo > hi)
    }

    pub fn min_coords(&self) -> &[f64] {
        &self.min
    }

    pub fn max_coords(&self) -> &[f64] {
        &self.max
    }

    /// Length of the box along dimension `dim`.
    pub fn extension(&self, dim: usize) -> f64 {
        self.max[dim] - self.min[dim]
    }

    /// Product of the extensions over all dimensions.
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (0..self.min.len()).map(|d| self.extension(d)).product()
    }

    /// Volume growth needed for this box to also cover `other`.
    pub fn enlargement(&self, other: &HyperBoundingBox) -> f64 {
        self.union(other).volume() - self.volume()
    }

    /// Volume of the intersection with `other`, zero if disjoint.
    pub fn overlap(&self, other: &HyperBoundingBox) -> f64 {
        let mut result = 1.0;
        for d in 0..self.min.len() {
            let lo = self.min[d].max(other.min[d]);
            let hi = self.max[d].min(other.max[d]);
            if hi < lo {
                return 0.0;
            }
            result *= hi - lo;
        }
        result
    }

    pub fn intersects(&self, other: &HyperBoundingBox) -> bool {
        (0..self.min.len()).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    pub fn contains(&self, other: &HyperBoundingBox) -> bool {
        (0..self.min.len()).all(|d| self.min[d] <= other.min[d] && self.max[d] >= other.max[d])
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &HyperBoundingBox) -> HyperBoundingBox {
        let mut merged = self.clone();
        merged.expand(other);
        merged
    }

    /// Grows this box in place so that it also covers `other`.
    pub fn expand(&mut self, other: &HyperBoundingBox) {
        for d in 0..self.min.len() {
            self.min[d] = self.min[d].min(other.min[d]);
            self.max[d] = self.max[d].max(other.max[d]);
        }
    }

    /// MBR of a sequence of boxes; `None` when the sequence is empty.
    pub fn union_all<'a, I>(boxes: I) -> Option<HyperBoundingBox>
    where
        I: IntoIterator<Item = &'a HyperBoundingBox>,
    {
        let mut iter = boxes.into_iter();
        let mut result = iter.next()?.clone();
        for b in iter {
            result.expand(b);
        }
        Some(result)
    }
}

impl SpatialComparable for HyperBoundingBox {
    fn dimensionality(&self) -> usize {
        self.min.len()
    }

    fn min(&self, dim: usize) -> f64 {
        self.min[dim]
    }

    fn max(&self, dim: usize) -> f64 {
        self.max[dim]
    }
}
