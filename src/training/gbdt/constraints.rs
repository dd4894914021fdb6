//! Training constraints.
//!
//! 1. **Monotonic Constraints**: force predictions to increase/decrease with a
//!    feature. Enforced by [`RegularizedEvaluator`](super::RegularizedEvaluator)
//!    through per-node weight bounds.
//! 2. **Interaction Constraints**: limit which features can appear together on
//!    one root-to-leaf path. Queried by the split search through
//!    [`InteractionOracle`].
//!
//! # Interaction Constraints
//!
//! ```text
//! Groups: [[0, 1, 2], [3, 4, 5]]
//! ```
//!
//! Any feature may be used at the root. Below a split, a feature is allowed
//! only if some group contains it together with every feature already used on
//! the path.

use std::collections::{BTreeSet, HashSet};

use super::tree::NodeId;

// ============================================================================
// MonotonicConstraint
// ============================================================================

/// Monotonic constraint type for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonotonicConstraint {
    /// No constraint (default)
    #[default]
    None,
    /// Predictions must increase with feature value
    Increasing,
    /// Predictions must decrease with feature value
    Decreasing,
}

impl MonotonicConstraint {
    /// Create from integer representation (`0`, `1`, `-1`).
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => Self::Increasing,
            -1 => Self::Decreasing,
            _ => Self::None,
        }
    }

    #[inline]
    pub fn is_constrained(self) -> bool {
        !matches!(self, Self::None)
    }
}

// ============================================================================
// InteractionOracle
// ============================================================================

/// Decides which features a node may split on.
pub trait InteractionOracle: Send + Sync {
    /// Whether `feature` may be used to split `node`.
    fn allowed(&self, node: NodeId, feature: u32) -> bool;

    /// Record that `node` was split on `feature` into `left` and `right`.
    fn register_split(&mut self, node: NodeId, feature: u32, left: NodeId, right: NodeId);

    /// Forget all per-node state before growing a new tree.
    fn begin_tree(&mut self) {}
}

// ============================================================================
// InteractionConstraints
// ============================================================================

/// Group-based interaction constraints.
#[derive(Debug, Clone, Default)]
pub struct InteractionConstraints {
    /// Groups of features that can interact.
    groups: Vec<HashSet<u32>>,
    /// Features used on the path to each node.
    path_features: Vec<BTreeSet<u32>>,
    /// Allowed features per node. `None` means unrestricted.
    node_allowed: Vec<Option<HashSet<u32>>>,
}

impl InteractionConstraints {
    /// Create constraints from group definitions.
    ///
    /// An empty group list disables the constraints.
    pub fn new(groups: &[Vec<u32>]) -> Self {
        Self {
            groups: groups.iter().map(|g| g.iter().copied().collect()).collect(),
            path_features: vec![BTreeSet::new()],
            node_allowed: vec![None],
        }
    }

    /// Create with no constraints.
    pub fn none() -> Self {
        Self::new(&[])
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Features used on the path from the root to `node`.
    pub fn path_features(&self, node: NodeId) -> impl Iterator<Item = u32> + '_ {
        self.path_features
            .get(node as usize)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    fn ensure_node(&mut self, node: NodeId) {
        let n = node as usize + 1;
        if self.path_features.len() < n {
            self.path_features.resize(n, BTreeSet::new());
            self.node_allowed.resize(n, None);
        }
    }
}

impl InteractionOracle for InteractionConstraints {
    fn begin_tree(&mut self) {
        self.path_features.clear();
        self.path_features.push(BTreeSet::new());
        self.node_allowed.clear();
        self.node_allowed.push(None);
    }

    fn allowed(&self, node: NodeId, feature: u32) -> bool {
        if !self.is_enabled() {
            return true;
        }
        match self.node_allowed.get(node as usize) {
            Some(Some(allowed)) => allowed.contains(&feature),
            _ => true,
        }
    }

    fn register_split(&mut self, node: NodeId, feature: u32, left: NodeId, right: NodeId) {
        if !self.is_enabled() {
            return;
        }
        self.ensure_node(node.max(left).max(right));

        let mut path = self.path_features[node as usize].clone();
        path.insert(feature);

        // Union of every group that contains the whole path
        let allowed: HashSet<u32> = self
            .groups
            .iter()
            .filter(|g| path.iter().all(|f| g.contains(f)))
            .flat_map(|g| g.iter().copied())
            .collect();

        for child in [left, right] {
            self.path_features[child as usize] = path.clone();
            self.node_allowed[child as usize] = Some(allowed.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
