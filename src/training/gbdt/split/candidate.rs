//! Best-split records.

use crate::training::GradStats;

use super::super::categorical::CatBitset;
use super::super::params::TrainParams;
use super::super::tree::NodeId;

/// Gains at or below this are treated as no improvement.
const RT_EPS: f64 = 1e-6;

/// Routing predicate of a split.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitCondition {
    /// `value < threshold` goes left.
    Numeric { threshold: f32 },
    /// The single category goes right, everything else left.
    OneHot { category: f32 },
    /// Categories in the set go right.
    Partition { categories: CatBitset },
}

impl Default for SplitCondition {
    fn default() -> Self {
        Self::Numeric { threshold: 0.0 }
    }
}

/// Best split found so far for one node.
///
/// Updates are monotonic: a candidate is replaced only by a strictly greater,
/// finite gain. Equal gains keep the candidate found first, which makes the
/// outcome of a scan independent of how work was scheduled as long as
/// results are merged in a fixed order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitCandidate {
    /// Loss change relative to keeping the node a leaf.
    pub gain: f64,
    pub feature: u32,
    pub condition: SplitCondition,
    /// Direction for missing values.
    pub default_left: bool,
    pub left_sum: GradStats,
    pub right_sum: GradStats,
}

impl SplitCandidate {
    /// Whether `gain` would replace this candidate.
    #[inline]
    pub fn needs_replace(&self, gain: f64) -> bool {
        gain.is_finite() && gain > self.gain
    }

    /// Replace with the given split if its gain is strictly greater.
    ///
    /// Returns `true` if the candidate changed.
    pub fn update(
        &mut self,
        gain: f64,
        feature: u32,
        condition: SplitCondition,
        default_left: bool,
        left_sum: GradStats,
        right_sum: GradStats,
    ) -> bool {
        if !self.needs_replace(gain) {
            return false;
        }
        *self = Self { gain, feature, condition, default_left, left_sum, right_sum };
        true
    }

    /// Merge another candidate, keeping `self` on ties.
    pub fn merge(&mut self, other: SplitCandidate) -> bool {
        if !self.needs_replace(other.gain) {
            return false;
        }
        *self = other;
        true
    }

    #[inline]
    pub fn is_categorical(&self) -> bool {
        !matches!(self.condition, SplitCondition::Numeric { .. })
    }

    /// Statistic of the node being split.
    #[inline]
    pub fn parent_sum(&self) -> GradStats {
        self.left_sum + self.right_sum
    }
}

/// Pending expansion of one frontier node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpandEntry {
    pub node_id: NodeId,
    pub depth: u32,
    pub split: SplitCandidate,
}

impl ExpandEntry {
    pub fn new(node_id: NodeId, depth: u32) -> Self {
        Self { node_id, depth, split: SplitCandidate::default() }
    }

    /// Whether the split should be committed given the tree's current leaf count.
    pub fn is_valid(&self, params: &TrainParams, n_leaves: usize) -> bool {
        let split = &self.split;
        if split.gain <= RT_EPS {
            return false;
        }
        if split.left_sum.hess == 0.0 || split.right_sum.hess == 0.0 {
            return false;
        }
        if split.gain < params.min_split_loss as f64 {
            return false;
        }
        if params.max_depth > 0 && self.depth == params.max_depth {
            return false;
        }
        if params.max_leaves > 0 && n_leaves == params.max_leaves as usize {
            return false;
        }
        true
    }
}
