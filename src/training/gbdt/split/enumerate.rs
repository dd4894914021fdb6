//! Per-feature bin scans.
//!
//! One driver walks a feature's histogram bins in either direction and
//! accumulates a running aggregate. The complementary side of each candidate
//! split is `parent - aggregate`, so a scan costs one pass over the bins.
//!
//! # Strategies
//!
//! - [`ScanKind::Numeric`]: the aggregate is the side below (forward) or
//!   above (backward) the threshold. The backward pass only matters when the
//!   node has missing values for the feature; it sends them left instead of
//!   right.
//! - [`ScanKind::OneHot`]: each category alone goes right. Forward sends
//!   missing values left, backward sends them right along with the category.
//! - [`ScanKind::Partition`]: categories are sorted by
//!   [`SplitEvaluator::category_rank_key`] and contiguous groups of that
//!   order go right. Missing values always go left.
//!
//! The partition scan only tries prefixes and suffixes of one greedy order.
//! It is an approximation of the optimal category subset, kept because it is
//! linear in the number of categories.

use crate::training::GradStats;

use super::super::categorical::{as_category, CatBitset};
use super::super::cuts::BinCuts;
use super::super::error::SplitError;
use super::super::stats::NodeStat;
use super::super::task::{use_one_hot, ObjInfo};
use super::super::tree::NodeId;
use super::candidate::{SplitCandidate, SplitCondition};
use super::gain::SplitEvaluator;

/// Scan strategy of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Numeric,
    OneHot,
    Partition,
}

impl ScanKind {
    /// Choose the strategy for a feature with `n_bins` bins.
    pub fn select(is_categorical: bool, n_bins: usize, max_cat_to_onehot: u32, task: ObjInfo) -> Self {
        if !is_categorical {
            Self::Numeric
        } else if use_one_hot(n_bins, max_cat_to_onehot, task) {
            Self::OneHot
        } else {
            Self::Partition
        }
    }
}

/// Order in which bins are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Scan context of one node.
pub struct FeatureScan<'a, E: ?Sized> {
    evaluator: &'a E,
    cuts: &'a BinCuts,
    min_child_weight: f64,
    node: NodeId,
    parent: NodeStat,
}

impl<'a, E: SplitEvaluator + ?Sized> FeatureScan<'a, E> {
    pub fn new(
        evaluator: &'a E,
        cuts: &'a BinCuts,
        min_child_weight: f64,
        node: NodeId,
        parent: NodeStat,
    ) -> Self {
        Self { evaluator, cuts, min_child_weight, node, parent }
    }

    /// Run every pass `kind` needs for `feature` and fold into `best`.
    ///
    /// `hist` is the node's full histogram row. Returns the statistic of the
    /// rows with a non-missing value for the feature.
    pub fn scan_feature(
        &self,
        kind: ScanKind,
        feature: u32,
        hist: &[GradStats],
        best: &mut SplitCandidate,
    ) -> Result<GradStats, SplitError> {
        match kind {
            ScanKind::Numeric => {
                let present = self.enumerate(kind, Direction::Forward, feature, hist, &[], best)?;
                if self.has_missing(present) {
                    self.enumerate(kind, Direction::Backward, feature, hist, &[], best)?;
                }
                Ok(present)
            }
            ScanKind::OneHot => {
                self.enumerate(kind, Direction::Forward, feature, hist, &[], best)?;
                self.enumerate(kind, Direction::Backward, feature, hist, &[], best)
            }
            ScanKind::Partition => {
                let order = self.category_order(&hist[self.cuts.feature_bins(feature)]);
                self.enumerate(kind, Direction::Forward, feature, hist, &order, best)?;
                self.enumerate(kind, Direction::Backward, feature, hist, &order, best)
            }
        }
    }

    /// Whether the node holds rows with a missing value, given the statistic
    /// of the rows with a present value.
    #[inline]
    pub fn has_missing(&self, present: GradStats) -> bool {
        present != self.parent.stats
    }

    /// Local bin indices stably sorted by ascending rank key.
    pub fn category_order(&self, feature_hist: &[GradStats]) -> Vec<usize> {
        let keys: Vec<f64> =
            feature_hist.iter().map(|&s| self.evaluator.category_rank_key(s)).collect();
        let mut order: Vec<usize> = (0..feature_hist.len()).collect();
        order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
        order
    }

    /// Scan one direction of one strategy.
    ///
    /// `order` is only read by partition scans. Returns the statistic of the
    /// rows with a non-missing value for the feature.
    pub fn enumerate(
        &self,
        kind: ScanKind,
        dir: Direction,
        feature: u32,
        hist: &[GradStats],
        order: &[usize],
        best: &mut SplitCandidate,
    ) -> Result<GradStats, SplitError> {
        let bins = self.cuts.feature_bins(feature);
        let f_hist = &hist[bins.clone()];
        let cut_values = &self.cuts.values()[bins];
        let n = f_hist.len();
        let parent = self.parent.stats;

        let present: GradStats = match kind {
            ScanKind::OneHot => f_hist.iter().sum(),
            _ => GradStats::ZERO,
        };
        let missing = parent - present;

        let mut acc = GradStats::ZERO;
        let mut local = SplitCandidate::default();
        let mut best_step = None;

        for step in 0..n {
            let i = match dir {
                Direction::Forward => step,
                Direction::Backward => n - 1 - step,
            };

            let (left, right, default_left, condition) = match (kind, dir) {
                (ScanKind::Numeric, Direction::Forward) => {
                    acc += f_hist[i];
                    (acc, parent - acc, false, SplitCondition::Numeric { threshold: cut_values[i] })
                }
                (ScanKind::Numeric, Direction::Backward) => {
                    acc += f_hist[i];
                    // Split at the lower bound of bin i
                    let threshold = if i == 0 {
                        self.cuts.min_value(feature)
                    } else {
                        cut_values[i - 1]
                    };
                    (parent - acc, acc, true, SplitCondition::Numeric { threshold })
                }
                (ScanKind::OneHot, Direction::Forward) => {
                    let right = f_hist[i];
                    (parent - right, right, true, SplitCondition::OneHot { category: cut_values[i] })
                }
                (ScanKind::OneHot, Direction::Backward) => {
                    let right = f_hist[i] + missing;
                    (parent - right, right, false, SplitCondition::OneHot { category: cut_values[i] })
                }
                (ScanKind::Partition, _) => {
                    acc += f_hist[order[i]];
                    let condition = SplitCondition::Partition { categories: CatBitset::default() };
                    (parent - acc, acc, true, condition)
                }
            };

            if left.hess >= self.min_child_weight && right.hess >= self.min_child_weight {
                let gain = self.evaluator.split_gain(self.node, feature, left, right)
                    - self.parent.root_gain;
                if local.update(gain, feature, condition, default_left, left, right) {
                    best_step = Some(step);
                }
            }
        }

        if let (ScanKind::Partition, Some(step)) = (kind, best_step) {
            let members = match dir {
                Direction::Forward => &order[..=step],
                Direction::Backward => &order[n - 1 - step..],
            };
            local.condition = SplitCondition::Partition {
                categories: self.partition_bitset(feature, cut_values, members)?,
            };
        }
        best.merge(local);

        Ok(match kind {
            ScanKind::OneHot => present,
            _ => acc,
        })
    }

    /// Bitset of the categories at local bin indices `members`.
    fn partition_bitset(
        &self,
        feature: u32,
        cut_values: &[f32],
        members: &[usize],
    ) -> Result<CatBitset, SplitError> {
        let invalid = |value| SplitError::InvalidCategory { node: self.node, feature, value };

        let mut capacity = 0usize;
        for &value in cut_values {
            let cat = as_category(value).ok_or_else(|| invalid(value))?;
            capacity = capacity.max(cat as usize + 1);
        }

        let mut categories = CatBitset::with_capacity(capacity);
        for &j in members {
            let value = cut_values[j];
            let cat = as_category(value).ok_or_else(|| invalid(value))?;
            categories.try_insert(cat).map_err(|_| invalid(value))?;
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gbdt::params::TrainParams;
    use crate::training::gbdt::split::gain::RegularizedEvaluator;
    use crate::training::gbdt::task::TaskKind;
    use approx::assert_abs_diff_eq;

    fn evaluator(min_child_weight: f32, reg_lambda: f32) -> RegularizedEvaluator {
        let params = TrainParams { min_child_weight, reg_lambda, ..Default::default() };
        RegularizedEvaluator::from_params(&params, 1)
    }

    fn root(eval: &RegularizedEvaluator, stats: GradStats) -> NodeStat {
        NodeStat { stats, root_gain: eval.node_gain(0, stats) }
    }

    fn hist(pairs: &[(f64, f64)]) -> Vec<GradStats> {
        pairs.iter().map(|&p| GradStats::from(p)).collect()
    }

    #[test]
    fn test_select() {
        let task = ObjInfo::new(TaskKind::Regression);
        assert_eq!(ScanKind::select(false, 100, 4, task), ScanKind::Numeric);
        assert_eq!(ScanKind::select(true, 3, 4, task), ScanKind::OneHot);
        assert_eq!(ScanKind::select(true, 10, 4, task), ScanKind::Partition);
        let ranking = ObjInfo::new(TaskKind::Ranking);
        assert_eq!(ScanKind::select(true, 10, 4, ranking), ScanKind::OneHot);
    }

    #[test]
    fn test_numeric_forward() {
        let eval = evaluator(0.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![1.0, 2.0, 3.0, 4.0], 0.0)]).unwrap();
        let h = hist(&[(-2.0, 1.0), (-2.0, 1.0), (2.0, 1.0), (2.0, 1.0)]);
        let parent = root(&eval, GradStats::new(0.0, 4.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        let mut best = SplitCandidate::default();
        let present = scan.scan_feature(ScanKind::Numeric, 0, &h, &mut best).unwrap();

        assert_eq!(present, parent.stats);
        assert_eq!(best.condition, SplitCondition::Numeric { threshold: 2.0 });
        assert!(!best.default_left);
        assert_eq!(best.left_sum, GradStats::new(-4.0, 2.0));
        // 16/3 per side
        assert_abs_diff_eq!(best.gain, 32.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_numeric_backward_sends_missing_left() {
        let eval = evaluator(0.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![1.0, 2.0, 3.0], -5.0)]).unwrap();
        // Missing rows carry (-6, 2), close to the low bins
        let h = hist(&[(-3.0, 1.0), (3.0, 1.0), (3.0, 1.0)]);
        let parent = root(&eval, GradStats::new(-3.0, 5.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        let mut best = SplitCandidate::default();
        let present = scan.scan_feature(ScanKind::Numeric, 0, &h, &mut best).unwrap();

        assert!(scan.has_missing(present));
        assert!(best.default_left);
        assert_eq!(best.condition, SplitCondition::Numeric { threshold: 1.0 });
        assert_eq!(best.left_sum, GradStats::new(-9.0, 3.0));
        assert_eq!(best.right_sum, GradStats::new(6.0, 2.0));
    }

    #[test]
    fn test_backward_first_bin_uses_min_value() {
        let eval = evaluator(0.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![1.0, 2.0], -7.5)]).unwrap();
        // Everything present goes right, missing alone goes left
        let h = hist(&[(4.0, 1.0), (4.0, 1.0)]);
        let parent = root(&eval, GradStats::new(-4.0, 3.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        let mut best = SplitCandidate::default();
        scan.enumerate(ScanKind::Numeric, Direction::Backward, 0, &h, &[], &mut best).unwrap();
        assert_eq!(best.condition, SplitCondition::Numeric { threshold: -7.5 });
        assert_eq!(best.right_sum, GradStats::new(8.0, 2.0));
    }

    #[test]
    fn test_min_child_weight_blocks_everything() {
        let eval = evaluator(10.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![1.0, 2.0], 0.0)]).unwrap();
        let h = hist(&[(-1.0, 1.0), (1.0, 1.0)]);
        let parent = root(&eval, GradStats::new(0.0, 2.0));
        let scan = FeatureScan::new(&eval, &cuts, 10.0, 0, parent);

        let mut best = SplitCandidate::default();
        scan.scan_feature(ScanKind::Numeric, 0, &h, &mut best).unwrap();
        assert_eq!(best, SplitCandidate::default());
    }

    #[test]
    fn test_one_hot_routes_category_right() {
        let eval = evaluator(0.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![0.0, 1.0, 2.0], 0.0)]).unwrap();
        let h = hist(&[(1.0, 1.0), (-6.0, 2.0), (1.0, 1.0)]);
        let parent = root(&eval, GradStats::new(-4.0, 4.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        let mut best = SplitCandidate::default();
        let present = scan.scan_feature(ScanKind::OneHot, 0, &h, &mut best).unwrap();

        assert_eq!(present, parent.stats);
        assert_eq!(best.condition, SplitCondition::OneHot { category: 1.0 });
        assert_eq!(best.right_sum, GradStats::new(-6.0, 2.0));
        assert_eq!(best.left_sum, GradStats::new(2.0, 2.0));
        // No missing values: forward and backward tie, forward wins
        assert!(best.default_left);
    }

    #[test]
    fn test_one_hot_backward_carries_missing_right() {
        let eval = evaluator(0.0, 1.0);
        let cuts = BinCuts::from_features(&[(vec![0.0, 1.0, 2.0], 0.0)]).unwrap();
        let h = hist(&[(3.0, 1.0), (-3.0, 1.0), (3.0, 1.0)]);
        // Missing rows carry (-3, 1)
        let parent = root(&eval, GradStats::new(0.0, 4.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        let mut best = SplitCandidate::default();
        scan.scan_feature(ScanKind::OneHot, 0, &h, &mut best).unwrap();
        assert_eq!(best.condition, SplitCondition::OneHot { category: 1.0 });
        assert!(!best.default_left);
        assert_eq!(best.right_sum, GradStats::new(-6.0, 2.0));
        assert_eq!(best.left_sum, GradStats::new(6.0, 2.0));
        assert_abs_diff_eq!(best.gain, 24.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partition_groups_categories() {
        let eval = evaluator(0.0, 0.0);
        // Categories 0, 1, 2 stored in bins 0..3
        let cuts = BinCuts::from_features(&[(vec![0.0, 1.0, 2.0], 0.0)]).unwrap();
        let h = hist(&[(2.0, 1.0), (5.0, 2.0), (1.0, 1.0)]);
        let parent = root(&eval, GradStats::new(8.0, 4.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 0, parent);

        assert_eq!(scan.category_order(&h), vec![2, 0, 1]);

        let mut best = SplitCandidate::default();
        scan.scan_feature(ScanKind::Partition, 0, &h, &mut best).unwrap();
        assert_abs_diff_eq!(best.gain, 4.0 / 3.0, epsilon = 1e-12);
        let SplitCondition::Partition { categories } = &best.condition else {
            panic!("expected partition split, got {:?}", best.condition);
        };
        assert_eq!(categories.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(best.right_sum, GradStats::new(1.0, 1.0));
        assert!(best.default_left);
    }

    #[test]
    fn test_partition_rejects_invalid_category() {
        let eval = evaluator(0.0, 0.0);
        let cuts = BinCuts::from_features(&[(vec![-1.0, 1.0, 2.0], -1.0)]).unwrap();
        let h = hist(&[(2.0, 1.0), (5.0, 2.0), (1.0, 1.0)]);
        let parent = root(&eval, GradStats::new(8.0, 4.0));
        let scan = FeatureScan::new(&eval, &cuts, 0.0, 3, parent);

        let mut best = SplitCandidate::default();
        let err = scan.scan_feature(ScanKind::Partition, 0, &h, &mut best).unwrap_err();
        assert!(matches!(err, SplitError::InvalidCategory { node: 3, feature: 0, .. }));
    }
}
