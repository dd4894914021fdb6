//! Read-only histogram access for split search.
//!
//! Histogram construction happens outside this crate. The split search only
//! needs one row of [`GradStats`] per node, concatenated across features in
//! the layout of [`BinCuts`](super::BinCuts): feature `f` occupies
//! `row[cut_ptrs[f]..cut_ptrs[f + 1]]`.

use crate::training::GradStats;

use super::tree::NodeId;

/// Provides the histogram row of a node.
///
/// Rows are read concurrently by the split search and must not change during
/// a search round.
pub trait HistogramSource: Sync {
    /// Histogram row of `node`, or `None` if it has not been built.
    fn row(&self, node: NodeId) -> Option<&[GradStats]>;
}

/// Node-indexed histogram storage.
///
/// Every row has the same length (total bins over all features).
#[derive(Debug, Clone, Default)]
pub struct NodeHistograms {
    total_bins: usize,
    rows: Vec<Option<Box<[GradStats]>>>,
}

impl NodeHistograms {
    /// Create empty storage for rows of `total_bins` bins.
    pub fn new(total_bins: usize) -> Self {
        Self { total_bins, rows: Vec::new() }
    }

    #[inline]
    pub fn total_bins(&self) -> usize {
        self.total_bins
    }

    /// Mutable row of `node`, allocated zeroed on first access.
    pub fn row_mut(&mut self, node: NodeId) -> &mut [GradStats] {
        let idx = node as usize;
        if idx >= self.rows.len() {
            self.rows.resize(idx + 1, None);
        }
        let total_bins = self.total_bins;
        self.rows[idx].get_or_insert_with(|| vec![GradStats::ZERO; total_bins].into_boxed_slice())
    }

    /// Store a fully built row for `node`.
    ///
    /// # Panics
    ///
    /// Panics if the row length differs from `total_bins`.
    pub fn insert(&mut self, node: NodeId, row: Vec<GradStats>) {
        assert_eq!(row.len(), self.total_bins, "histogram row length mismatch");
        self.row_mut(node).copy_from_slice(&row);
    }

    /// Drop the row of `node`.
    pub fn release(&mut self, node: NodeId) {
        if let Some(slot) = self.rows.get_mut(node as usize) {
            *slot = None;
        }
    }
}

impl HistogramSource for NodeHistograms {
    #[inline]
    fn row(&self, node: NodeId) -> Option<&[GradStats]> {
        self.rows.get(node as usize).and_then(|r| r.as_deref())
    }
}
