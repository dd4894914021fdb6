//! Row partitioning for tree training.
//!
//! Tracks the row indices owned by each tree node. Uses a single contiguous
//! buffer with one range per node to avoid allocations during training.
//!
//! When a node is split, its range is stably partitioned in place: the first
//! part becomes the left child's range, the rest the right child's.
//!
//! ```text
//! Initial (all rows in node 0):
//!   indices: [0, 1, 2, 3, 4, 5, 6, 7]
//!   ranges:  0 -> 0..8
//!
//! After splitting node 0 (even rows left to node 1, odd rows right to node 2):
//!   indices: [0, 2, 4, 6, 1, 3, 5, 7]
//!   ranges:  0 -> 0..8, 1 -> 0..4, 2 -> 4..8
//! ```

use std::ops::Range;

use super::tree::NodeId;

/// Provides the rows routed to each node of the current tree.
pub trait RowSetSource: Sync {
    /// Number of node ids known to the partition.
    fn n_nodes(&self) -> usize;

    /// Rows owned by `node`. Only meaningful for leaves of the finished tree.
    fn rows(&self, node: NodeId) -> &[u32];
}

/// Contiguous per-node row index lists.
#[derive(Debug, Clone, Default)]
pub struct RowPartitioner {
    /// Row indices buffer. Partitioned in place.
    indices: Vec<u32>,
    /// Range of each node in `indices`.
    ranges: Vec<Range<usize>>,
    /// Scratch for the right-going rows of a stable partition.
    scratch: Vec<u32>,
}

impl RowPartitioner {
    /// Create a partitioner with all `n_rows` rows in the root.
    pub fn new(n_rows: usize) -> Self {
        let mut partitioner = Self::default();
        partitioner.reset(n_rows, None);
        partitioner
    }

    /// Reset for a new tree.
    ///
    /// Initializes with all rows (or the sampled rows) in node 0.
    pub fn reset(&mut self, n_rows: usize, sampled: Option<&[u32]>) {
        self.indices.clear();
        match sampled {
            None => self.indices.extend(0..n_rows as u32),
            Some(rows) => self.indices.extend_from_slice(rows),
        }
        self.ranges.clear();
        self.ranges.push(0..self.indices.len());
    }

    /// Number of rows tracked by the partition.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.indices.len()
    }

    /// Split `parent`'s rows into `left` and `right`.
    ///
    /// Relative row order is preserved on both sides. Returns the row counts
    /// `(left, right)`.
    pub fn apply_split(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        goes_left: impl Fn(u32) -> bool,
    ) -> (usize, usize) {
        let range = self.ranges[parent as usize].clone();
        self.scratch.clear();

        let mut left_end = range.start;
        for i in range.clone() {
            let row = self.indices[i];
            if goes_left(row) {
                self.indices[left_end] = row;
                left_end += 1;
            } else {
                self.scratch.push(row);
            }
        }
        self.indices[left_end..range.end].copy_from_slice(&self.scratch);

        let needed = left.max(right) as usize + 1;
        if self.ranges.len() < needed {
            self.ranges.resize(needed, 0..0);
        }
        self.ranges[left as usize] = range.start..left_end;
        self.ranges[right as usize] = left_end..range.end;

        (left_end - range.start, range.end - left_end)
    }
}

impl RowSetSource for RowPartitioner {
    #[inline]
    fn n_nodes(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    fn rows(&self, node: NodeId) -> &[u32] {
        match self.ranges.get(node as usize) {
            Some(range) => &self.indices[range.clone()],
            None => &[],
        }
    }
}
