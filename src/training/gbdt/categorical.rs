//! Categorical feature utilities.
//!
//! Categorical splits route a set of categories to the right child. The set
//! is stored as a fixed-width bitset sized from the feature's category count.

use fixedbitset::FixedBitSet;

/// Largest category id representable without loss in an `f32` cut value.
pub const MAX_CATEGORY: u32 = 1 << 24;

/// Interpret a cut value as a category id.
///
/// Returns `None` for NaN, negative values and values that do not fit the
/// exactly representable integer range of `f32`.
#[inline]
pub fn as_category(value: f32) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value < MAX_CATEGORY as f32 {
        Some(value as u32)
    } else {
        None
    }
}

/// Category id does not fit the bitset it is inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("category {category} outside bitset capacity {capacity}")]
pub struct CategoryOutOfRange {
    pub category: u32,
    pub capacity: usize,
}

/// Fixed-width set of category ids.
///
/// Categories in the set go to the right child of a categorical split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatBitset {
    bits: FixedBitSet,
}

impl CatBitset {
    /// Create an empty bitset able to hold categories `0..n_cats`.
    pub fn with_capacity(n_cats: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(n_cats),
        }
    }

    /// Create a bitset holding exactly one category.
    pub fn singleton(cat: u32) -> Self {
        let mut bits = FixedBitSet::with_capacity(cat as usize + 1);
        bits.insert(cat as usize);
        Self { bits }
    }

    /// Number of categories this set can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// Insert a category.
    pub fn try_insert(&mut self, cat: u32) -> Result<(), CategoryOutOfRange> {
        if (cat as usize) >= self.bits.len() {
            return Err(CategoryOutOfRange {
                category: cat,
                capacity: self.bits.len(),
            });
        }
        self.bits.insert(cat as usize);
        Ok(())
    }

    /// Check if a category is in the set. Out-of-range ids are never contained.
    #[inline]
    pub fn contains(&self, cat: u32) -> bool {
        self.bits.contains(cat as usize)
    }

    /// Iterate over member categories in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.ones().map(|c| c as u32)
    }

    /// Number of categories in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
