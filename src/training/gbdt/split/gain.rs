//! Gain and leaf weight computation.
//!
//! [`SplitEvaluator`] is the capability the split search is parameterized
//! over. [`RegularizedEvaluator`] implements the XGBoost objective:
//!
//! ```text
//! weight = -T_α(G) / (H + λ)
//! gain   = T_α(G)² / (H + λ)
//! ```
//!
//! where `T_α` is L1 soft thresholding. When leaf weights are clamped (by
//! `max_delta_step` or monotone bounds) the gain is evaluated at the clamped
//! weight instead.

use crate::training::GradStats;

use super::super::constraints::MonotonicConstraint;
use super::super::params::TrainParams;
use super::super::tree::NodeId;

/// Gain and weight formulas used by the split search.
pub trait SplitEvaluator: Send + Sync {
    /// Gain of splitting `node` on `feature` into `left` and `right`,
    /// before subtracting the node's own gain.
    fn split_gain(&self, node: NodeId, feature: u32, left: GradStats, right: GradStats) -> f64;

    /// Gain of `stats` if kept as a leaf under `node`.
    fn node_gain(&self, node: NodeId, stats: GradStats) -> f64;

    /// Optimal (unscaled) leaf weight of `stats` under `node`.
    fn leaf_weight(&self, node: NodeId, stats: GradStats) -> f64;

    /// Sort key ranking the categories of a partition split.
    fn category_rank_key(&self, stats: GradStats) -> f64;

    /// Propagate per-node state after `parent` was split on `feature`.
    fn add_split(
        &mut self,
        _parent: NodeId,
        _left: NodeId,
        _right: NodeId,
        _feature: u32,
        _left_weight: f64,
        _right_weight: f64,
    ) {
    }

    /// Forget all per-node state before growing a new tree.
    fn begin_tree(&mut self) {}
}

/// L1 soft thresholding.
#[inline]
fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Weight bounds of a node, `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    lower: f64,
    upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self { lower: f64::NEG_INFINITY, upper: f64::INFINITY }
    }
}

/// XGBoost-style regularized objective with optional monotone constraints.
#[derive(Debug, Clone)]
pub struct RegularizedEvaluator {
    reg_lambda: f64,
    reg_alpha: f64,
    min_child_weight: f64,
    max_delta_step: f64,
    /// Per-feature monotone constraint. Missing entries are unconstrained.
    monotone: Vec<MonotonicConstraint>,
    has_constraint: bool,
    /// Per-node weight bounds, only grown when constraints exist.
    bounds: Vec<Bounds>,
}

impl Default for RegularizedEvaluator {
    fn default() -> Self {
        Self::from_params(&TrainParams::default(), 0)
    }
}

impl RegularizedEvaluator {
    /// Create an evaluator from training parameters for `n_features` features.
    pub fn from_params(params: &TrainParams, n_features: u32) -> Self {
        let mut monotone = params.monotone();
        monotone.resize(n_features as usize, MonotonicConstraint::None);
        let has_constraint = monotone.iter().any(|c| c.is_constrained());
        Self {
            reg_lambda: params.reg_lambda as f64,
            reg_alpha: params.reg_alpha as f64,
            min_child_weight: params.min_child_weight as f64,
            max_delta_step: params.max_delta_step as f64,
            monotone,
            has_constraint,
            bounds: vec![Bounds::default()],
        }
    }

    #[inline]
    pub fn has_constraint(&self) -> bool {
        self.has_constraint
    }

    /// Weight bounds `(lower, upper)` of `node`.
    pub fn bounds(&self, node: NodeId) -> (f64, f64) {
        let b = self.bounds.get(node as usize).copied().unwrap_or_default();
        (b.lower, b.upper)
    }

    /// Unconstrained weight.
    fn calc_weight(&self, stats: GradStats) -> f64 {
        let h = stats.hess;
        if h < self.min_child_weight || h <= 0.0 {
            return 0.0;
        }
        let w = -threshold_l1(stats.grad, self.reg_alpha) / (h + self.reg_lambda);
        if self.max_delta_step != 0.0 {
            w.clamp(-self.max_delta_step, self.max_delta_step)
        } else {
            w
        }
    }

    /// Gain of `stats` evaluated at weight `w`.
    fn gain_given_weight(&self, stats: GradStats, w: f64) -> f64 {
        if stats.hess <= 0.0 {
            return 0.0;
        }
        -(2.0 * stats.grad * w + (stats.hess + self.reg_lambda) * w * w)
            - 2.0 * self.reg_alpha * w.abs()
    }

    /// Unconstrained gain.
    fn calc_gain(&self, stats: GradStats) -> f64 {
        let h = stats.hess;
        if h < self.min_child_weight || h <= 0.0 {
            return 0.0;
        }
        if self.max_delta_step == 0.0 {
            let g = threshold_l1(stats.grad, self.reg_alpha);
            g * g / (h + self.reg_lambda)
        } else {
            self.gain_given_weight(stats, self.calc_weight(stats))
        }
    }
}

impl SplitEvaluator for RegularizedEvaluator {
    fn split_gain(&self, node: NodeId, feature: u32, left: GradStats, right: GradStats) -> f64 {
        if !self.has_constraint {
            return self.calc_gain(left) + self.calc_gain(right);
        }
        let wl = self.leaf_weight(node, left);
        let wr = self.leaf_weight(node, right);
        let gain = self.gain_given_weight(left, wl) + self.gain_given_weight(right, wr);
        match self.monotone.get(feature as usize).copied().unwrap_or_default() {
            MonotonicConstraint::None => gain,
            MonotonicConstraint::Increasing if wl <= wr => gain,
            MonotonicConstraint::Decreasing if wl >= wr => gain,
            _ => f64::NEG_INFINITY,
        }
    }

    fn node_gain(&self, node: NodeId, stats: GradStats) -> f64 {
        if !self.has_constraint {
            return self.calc_gain(stats);
        }
        self.gain_given_weight(stats, self.leaf_weight(node, stats))
    }

    fn leaf_weight(&self, node: NodeId, stats: GradStats) -> f64 {
        let w = self.calc_weight(stats);
        if !self.has_constraint {
            return w;
        }
        let b = self.bounds.get(node as usize).copied().unwrap_or_default();
        w.max(b.lower).min(b.upper)
    }

    fn category_rank_key(&self, stats: GradStats) -> f64 {
        stats.grad / (stats.hess + self.reg_lambda)
    }

    fn begin_tree(&mut self) {
        self.bounds.clear();
        self.bounds.push(Bounds::default());
    }

    fn add_split(
        &mut self,
        parent: NodeId,
        left: NodeId,
        right: NodeId,
        feature: u32,
        left_weight: f64,
        right_weight: f64,
    ) {
        if !self.has_constraint {
            return;
        }
        let needed = parent.max(left).max(right) as usize + 1;
        if self.bounds.len() < needed {
            self.bounds.resize(needed, Bounds::default());
        }
        let parent_bounds = self.bounds[parent as usize];
        let mut lb = parent_bounds;
        let mut rb = parent_bounds;

        let mid = (left_weight + right_weight) / 2.0;
        match self.monotone.get(feature as usize).copied().unwrap_or_default() {
            MonotonicConstraint::Increasing => {
                lb.upper = mid;
                rb.lower = mid;
            }
            MonotonicConstraint::Decreasing => {
                lb.lower = mid;
                rb.upper = mid;
            }
            MonotonicConstraint::None => {}
        }
        self.bounds[left as usize] = lb;
        self.bounds[right as usize] = rb;
    }
}
