//! Regression tree container used during growth.
//!
//! - [`TreeSink`]: mutation interface consumed by the split evaluator
//! - [`RegTree`]: default array-backed implementation
//! - [`NodeId`]: type alias for tree node indices

use super::categorical::{as_category, CatBitset};

/// Type alias for tree node indices.
pub type NodeId = u32;

/// Sentinel value for "no child" (leaf nodes) and "no parent" (root).
pub const NO_CHILD: NodeId = u32::MAX;

/// Payload of a committed split, shared by numeric and categorical splits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SplitRecord {
    pub feature: u32,
    /// Direction for missing values.
    pub default_left: bool,
    /// Unscaled weight of the node being split.
    pub base_weight: f32,
    /// Learning-rate scaled leaf value of the left child.
    pub left_leaf: f32,
    /// Learning-rate scaled leaf value of the right child.
    pub right_leaf: f32,
    pub loss_chg: f32,
    pub sum_hess: f32,
    pub left_hess: f32,
    pub right_hess: f32,
}

/// Mutation and inspection interface of a tree under construction.
pub trait TreeSink {
    /// Total number of node ids allocated, including deleted ones.
    fn n_nodes(&self) -> usize;

    /// Number of live leaves.
    fn n_leaves(&self) -> usize;

    /// Depth of `node` (root is 0).
    fn depth(&self, node: NodeId) -> u32;

    fn is_leaf(&self, node: NodeId) -> bool;

    fn is_deleted(&self, node: NodeId) -> bool;

    /// `(left, right)` children of an internal node.
    fn children(&self, node: NodeId) -> Option<(NodeId, NodeId)>;

    /// Turn leaf `node` into a numeric split. Returns the new child ids.
    fn expand_numeric(&mut self, node: NodeId, threshold: f32, record: &SplitRecord) -> (NodeId, NodeId);

    /// Turn leaf `node` into a categorical split. Categories in the set go right.
    fn expand_categorical(
        &mut self,
        node: NodeId,
        categories: CatBitset,
        record: &SplitRecord,
    ) -> (NodeId, NodeId);
}

/// A single tree node.
///
/// Uses struct layout (not enum) for fixed-size nodes. A node is a leaf when
/// it has no children.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub parent: NodeId,
    pub left: NodeId,
    pub right: NodeId,
    pub feature: u32,
    /// Numerical: `value < threshold` goes left. Unused for categorical splits.
    pub threshold: f32,
    pub default_left: bool,
    /// Leaf prediction value (learning-rate scaled).
    pub leaf_value: f32,
    /// Unscaled weight of the node's statistics.
    pub base_weight: f32,
    /// Gain of the split at this node.
    pub loss_chg: f32,
    /// Hessian cover.
    pub sum_hess: f32,
    pub deleted: bool,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self {
            parent: NO_CHILD,
            left: NO_CHILD,
            right: NO_CHILD,
            feature: 0,
            threshold: 0.0,
            default_left: false,
            leaf_value: 0.0,
            base_weight: 0.0,
            loss_chg: 0.0,
            sum_hess: 0.0,
            deleted: false,
        }
    }
}

impl TreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left == NO_CHILD
    }
}

/// Categorical split information (stored separately from TreeNode).
#[derive(Clone, Debug, PartialEq)]
pub struct CategoricalSplit {
    pub node: NodeId,
    /// Categories that go right.
    pub categories: CatBitset,
}

/// Array-backed regression tree.
///
/// Root is always at index 0. Node ids are allocated in pairs on expansion
/// and never reused; collapsed subtrees are tombstoned.
#[derive(Clone, Debug)]
pub struct RegTree {
    nodes: Vec<TreeNode>,
    categorical_splits: Vec<CategoricalSplit>,
}

impl Default for RegTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegTree {
    /// Create a tree holding a single root leaf.
    pub fn new() -> Self {
        Self { nodes: vec![TreeNode::default()], categorical_splits: Vec::new() }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        0
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Categorical split of a node, if any.
    pub fn categorical_split(&self, node: NodeId) -> Option<&CategoricalSplit> {
        self.categorical_splits.iter().find(|s| s.node == node)
    }

    /// Set the value of a leaf.
    pub fn set_leaf(&mut self, node: NodeId, value: f32) {
        debug_assert!(self.node(node).is_leaf(), "set_leaf on internal node {node}");
        self.nodes[node as usize].leaf_value = value;
    }

    /// Turn an internal node back into a leaf, tombstoning its subtree.
    pub fn collapse_to_leaf(&mut self, node: NodeId, value: f32) {
        let mut stack = Vec::new();
        if let Some((l, r)) = self.children(node) {
            stack.extend([l, r]);
        }
        while let Some(id) = stack.pop() {
            if let Some((l, r)) = self.children(id) {
                stack.extend([l, r]);
            }
            self.categorical_splits.retain(|s| s.node != id);
            let n = &mut self.nodes[id as usize];
            n.deleted = true;
            n.left = NO_CHILD;
            n.right = NO_CHILD;
        }
        self.categorical_splits.retain(|s| s.node != node);
        let n = &mut self.nodes[node as usize];
        n.left = NO_CHILD;
        n.right = NO_CHILD;
        n.loss_chg = 0.0;
        n.leaf_value = value;
    }

    /// Live leaves in id order.
    pub fn iter_leaves(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf() && !n.deleted)
            .map(|(i, n)| (i as NodeId, n))
    }

    /// Whether a raw feature row goes to the left child of internal `node`.
    /// `NaN` is missing.
    pub fn goes_left(&self, node: NodeId, row: &[f32]) -> bool {
        let n = &self.nodes[node as usize];
        let value = row.get(n.feature as usize).copied().unwrap_or(f32::NAN);
        if value.is_nan() {
            n.default_left
        } else if let Some(split) = self.categorical_split(node) {
            !as_category(value).is_some_and(|c| split.categories.contains(c))
        } else {
            value < n.threshold
        }
    }

    /// Leaf reached by a raw feature row.
    pub fn leaf_for(&self, row: &[f32]) -> NodeId {
        let mut node_id = self.root();
        loop {
            let node = &self.nodes[node_id as usize];
            if node.is_leaf() {
                return node_id;
            }
            node_id = if self.goes_left(node_id, row) { node.left } else { node.right };
        }
    }

    /// Predict for a raw feature row.
    pub fn predict_row(&self, row: &[f32]) -> f32 {
        self.node(self.leaf_for(row)).leaf_value
    }

    fn expand(&mut self, node: NodeId, record: &SplitRecord) -> (NodeId, NodeId) {
        let left = self.nodes.len() as NodeId;
        let right = left + 1;

        self.nodes.push(TreeNode {
            parent: node,
            leaf_value: record.left_leaf,
            sum_hess: record.left_hess,
            ..Default::default()
        });
        self.nodes.push(TreeNode {
            parent: node,
            leaf_value: record.right_leaf,
            sum_hess: record.right_hess,
            ..Default::default()
        });

        let n = &mut self.nodes[node as usize];
        n.left = left;
        n.right = right;
        n.feature = record.feature;
        n.default_left = record.default_left;
        n.base_weight = record.base_weight;
        n.loss_chg = record.loss_chg;
        n.sum_hess = record.sum_hess;
        n.leaf_value = 0.0;

        (left, right)
    }
}

impl TreeSink for RegTree {
    #[inline]
    fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn n_leaves(&self) -> usize {
        self.iter_leaves().count()
    }

    fn depth(&self, node: NodeId) -> u32 {
        let mut depth = 0;
        let mut id = node;
        while self.nodes[id as usize].parent != NO_CHILD {
            id = self.nodes[id as usize].parent;
            depth += 1;
        }
        depth
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.node(node).is_leaf()
    }

    #[inline]
    fn is_deleted(&self, node: NodeId) -> bool {
        self.node(node).deleted
    }

    fn children(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        let n = self.node(node);
        (!n.is_leaf()).then_some((n.left, n.right))
    }

    fn expand_numeric(&mut self, node: NodeId, threshold: f32, record: &SplitRecord) -> (NodeId, NodeId) {
        let children = self.expand(node, record);
        self.nodes[node as usize].threshold = threshold;
        children
    }

    fn expand_categorical(
        &mut self,
        node: NodeId,
        categories: CatBitset,
        record: &SplitRecord,
    ) -> (NodeId, NodeId) {
        let children = self.expand(node, record);
        self.nodes[node as usize].threshold = f32::NAN;
        self.categorical_splits.push(CategoricalSplit { node, categories });
        children
    }
}
