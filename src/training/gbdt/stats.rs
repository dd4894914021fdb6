//! Per-node statistics table.

use std::ops::Index;

use crate::training::GradStats;

use super::tree::NodeId;

/// Statistics of one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeStat {
    /// Gradient/hessian totals of the rows in the node (unscaled).
    pub stats: GradStats,
    /// Gain of the node if left as a leaf.
    pub root_gain: f64,
}

/// Append-only node statistics, indexed by node id.
///
/// The table grows with the tree and is never compacted: entries of nodes
/// that have been split stay in place. Every node id present in the tree has
/// an entry before the split search reads it.
#[derive(Debug, Clone, Default)]
pub struct NodeStatsTable {
    entries: Vec<NodeStat>,
}

impl NodeStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to a single root entry.
    pub fn init_root(&mut self, root: NodeStat) {
        self.entries.clear();
        self.entries.push(root);
    }

    /// Grow (never shrink) to cover `n_nodes` ids.
    pub fn resize(&mut self, n_nodes: usize) {
        if n_nodes > self.entries.len() {
            self.entries.resize(n_nodes, NodeStat::default());
        }
    }

    /// Set the entry of `node`, growing the table if needed.
    pub fn set(&mut self, node: NodeId, entry: NodeStat) {
        self.resize(node as usize + 1);
        self.entries[node as usize] = entry;
    }

    #[inline]
    pub fn get(&self, node: NodeId) -> Option<&NodeStat> {
        self.entries.get(node as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[NodeStat] {
        &self.entries
    }
}

impl Index<NodeId> for NodeStatsTable {
    type Output = NodeStat;

    #[inline]
    fn index(&self, node: NodeId) -> &NodeStat {
        &self.entries[node as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_and_keeps_entries() {
        let mut table = NodeStatsTable::new();
        assert!(table.is_empty());

        let root = NodeStat { stats: GradStats::new(1.0, 4.0), root_gain: 0.2 };
        table.init_root(root);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0], root);

        table.set(2, NodeStat { stats: GradStats::new(0.5, 1.0), root_gain: 0.0 });
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], root);
        assert_eq!(table[1], NodeStat::default());

        table.resize(2);
        assert_eq!(table.len(), 3);
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_init_root_resets() {
        let mut table = NodeStatsTable::new();
        table.resize(5);
        table.init_root(NodeStat::default());
        assert_eq!(table.len(), 1);
        assert_eq!(table.as_slice().len(), 1);
    }
}
