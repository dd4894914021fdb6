//! Parallel split search and tree mutation.
//!
//! [`HistEvaluator`] owns everything that lives for a whole tree: the node
//! statistics table, the gain evaluator, the column sampler, interaction
//! constraints and the worker pool.
//!
//! # Determinism
//!
//! The (node, sampled feature) space is cut into blocks in node-major order.
//! Each block is scanned independently into its own [`SplitCandidate`]; the
//! block results are then folded sequentially in block order. Because a
//! candidate is only replaced by a strictly greater gain, the fold yields the
//! first best split in sampled-feature order no matter how many workers ran
//! or how they were scheduled.

use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::training::{GradStats, Parallelism};

use super::super::categorical::{as_category, CatBitset};
use super::super::constraints::{InteractionConstraints, InteractionOracle};
use super::super::cuts::{is_categorical, BinCuts, FeatureType};
use super::super::error::SplitError;
use super::super::histograms::HistogramSource;
use super::super::params::TrainParams;
use super::super::partition::RowSetSource;
use super::super::predict::update_prediction_cache;
use super::super::sampling::{ColumnSampler, FeatureSampler};
use super::super::stats::{NodeStat, NodeStatsTable};
use super::super::task::ObjInfo;
use super::super::tree::{NodeId, SplitRecord, TreeSink};
use super::candidate::{ExpandEntry, SplitCandidate, SplitCondition};
use super::enumerate::{FeatureScan, ScanKind};
use super::gain::{RegularizedEvaluator, SplitEvaluator};

/// Inputs of one frontier node during a search round.
struct NodeJob<'h> {
    node: NodeId,
    parent: NodeStat,
    hist: &'h [GradStats],
    features: Arc<[u32]>,
}

/// Histogram-based split evaluator.
///
/// Drives the per-feature scans over a frontier and commits winning splits.
pub struct HistEvaluator<S = ColumnSampler, E = RegularizedEvaluator, C = InteractionConstraints> {
    params: TrainParams,
    task: ObjInfo,
    sampler: S,
    evaluator: E,
    constraints: C,
    stats: NodeStatsTable,
    parallelism: Parallelism,
    pool: Option<ThreadPool>,
}

impl HistEvaluator {
    /// Create an evaluator with the default components.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the worker pool
    /// cannot be built.
    pub fn new(params: &TrainParams, n_features: u32, task: ObjInfo) -> Result<Self, SplitError> {
        params.validate()?;
        let sampler = ColumnSampler::from_params(params, n_features)?;
        let evaluator = RegularizedEvaluator::from_params(params, n_features);
        let constraints = InteractionConstraints::new(&params.interaction_constraints);
        Self::with_components(params, task, sampler, evaluator, constraints)
    }
}

impl<S, E, C> HistEvaluator<S, E, C>
where
    S: FeatureSampler,
    E: SplitEvaluator,
    C: InteractionOracle,
{
    /// Create an evaluator from explicit components.
    pub fn with_components(
        params: &TrainParams,
        task: ObjInfo,
        sampler: S,
        evaluator: E,
        constraints: C,
    ) -> Result<Self, SplitError> {
        params.validate()?;
        let parallelism = Parallelism::from_threads(params.n_threads);
        let pool = parallelism.build_pool()?;
        Ok(Self {
            params: params.clone(),
            task,
            sampler,
            evaluator,
            constraints,
            stats: NodeStatsTable::new(),
            parallelism,
            pool,
        })
    }

    #[inline]
    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    #[inline]
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Per-node statistics of the current tree.
    #[inline]
    pub fn stats(&self) -> &NodeStatsTable {
        &self.stats
    }

    #[inline]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    #[inline]
    pub fn constraints(&self) -> &C {
        &self.constraints
    }

    #[inline]
    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    /// Start a new tree whose root holds `root_sum`.
    ///
    /// Resets per-tree state and returns the unscaled root weight.
    pub fn init_root(&mut self, root_sum: GradStats) -> f64 {
        self.sampler.begin_tree();
        self.evaluator.begin_tree();
        self.constraints.begin_tree();
        let root_gain = self.evaluator.node_gain(0, root_sum);
        self.stats.init_root(NodeStat { stats: root_sum, root_gain });
        self.evaluator.leaf_weight(0, root_sum)
    }

    /// Find the best split of every entry's node.
    ///
    /// Each entry's `split` is updated in place and never made worse. Nodes
    /// without an eligible split keep their candidate untouched.
    ///
    /// # Errors
    ///
    /// Fails if a node is not in `tree` or has no histogram or statistics.
    /// Also fails if the sampler returns no features or a feature the cuts do
    /// not describe, or if a partition split holds an invalid category.
    pub fn evaluate_splits<H, T>(
        &mut self,
        hists: &H,
        cuts: &BinCuts,
        feature_types: &[FeatureType],
        tree: &T,
        entries: &mut [ExpandEntry],
    ) -> Result<(), SplitError>
    where
        H: HistogramSource + ?Sized,
        T: TreeSink + ?Sized,
    {
        if entries.is_empty() {
            return Ok(());
        }

        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let node = entry.node_id;
            if node as usize >= tree.n_nodes() {
                return Err(SplitError::UnknownNode { node, n_nodes: tree.n_nodes() });
            }
            let depth = tree.depth(node);
            let features = self.sampler.sample(depth).map_err(|err| match err {
                SplitError::EmptyFeatureSet { depth, .. } => SplitError::EmptyFeatureSet { node, depth },
                other => other,
            })?;
            if let Some(&feature) = features.iter().find(|&&f| f as usize >= cuts.n_features()) {
                return Err(SplitError::FeatureOutOfRange {
                    node,
                    feature,
                    n_features: cuts.n_features(),
                });
            }
            let hist = hists.row(node).ok_or(SplitError::MissingHistogram { node })?;
            if hist.len() < cuts.total_bins() {
                return Err(SplitError::MalformedCuts(format!(
                    "histogram of node {node} has {} bins, cuts expect {}",
                    hist.len(),
                    cuts.total_bins()
                )));
            }
            let parent = *self.stats.get(node).ok_or(SplitError::MissingNodeStat { node })?;
            jobs.push(NodeJob { node, parent, hist, features });
        }

        let grain = self.parallelism.grain_size(jobs[0].features.len());
        let blocks: Vec<(usize, Range<usize>)> = jobs
            .iter()
            .enumerate()
            .flat_map(|(idx, job)| {
                let n = job.features.len();
                (0..n).step_by(grain).map(move |start| (idx, start..(start + grain).min(n)))
            })
            .collect();

        debug!(
            "Evaluating splits: {} nodes, {} blocks, grain {}, {} threads",
            jobs.len(),
            blocks.len(),
            grain,
            self.parallelism.n_threads()
        );

        let evaluator = &self.evaluator;
        let constraints = &self.constraints;
        let min_child_weight = self.params.min_child_weight as f64;
        let max_cat_to_onehot = self.params.max_cat_to_onehot;
        let task = self.task;
        let jobs = &jobs;

        let scan_block = |(idx, range): &(usize, Range<usize>)| -> Result<SplitCandidate, SplitError> {
            let job = &jobs[*idx];
            let scan = FeatureScan::new(evaluator, cuts, min_child_weight, job.node, job.parent);
            let mut best = SplitCandidate::default();
            for &feature in &job.features[range.clone()] {
                if !constraints.allowed(job.node, feature) {
                    continue;
                }
                let kind = ScanKind::select(
                    is_categorical(feature_types, feature),
                    cuts.n_bins(feature),
                    max_cat_to_onehot,
                    task,
                );
                scan.scan_feature(kind, feature, job.hist, &mut best)?;
            }
            Ok(best)
        };

        let results: Vec<SplitCandidate> = match &self.pool {
            None => blocks.iter().map(scan_block).collect::<Result<_, _>>()?,
            Some(pool) => {
                pool.install(|| blocks.par_iter().map(scan_block).collect::<Result<_, _>>())?
            }
        };

        // Fixed merge order: block order, which is node-major then feature order
        for ((idx, _), candidate) in blocks.iter().zip(results) {
            entries[*idx].split.merge(candidate);
        }
        Ok(())
    }

    /// Commit the split of `entry` into `tree`.
    ///
    /// Child statistics are recorded unscaled; the leaf values stored in the
    /// tree are scaled by the learning rate. Returns the new child ids.
    ///
    /// # Errors
    ///
    /// Fails if a one-hot split's category is not a valid category id.
    pub fn apply_tree_split<T>(&mut self, entry: &ExpandEntry, tree: &mut T) -> Result<(NodeId, NodeId), SplitError>
    where
        T: TreeSink + ?Sized,
    {
        let node = entry.node_id;
        let split = &entry.split;
        let parent_sum = split.left_sum + split.right_sum;

        let base_weight = self.evaluator.leaf_weight(node, parent_sum);
        let left_weight = self.evaluator.leaf_weight(node, split.left_sum);
        let right_weight = self.evaluator.leaf_weight(node, split.right_sum);
        let eta = self.params.learning_rate as f64;

        let record = SplitRecord {
            feature: split.feature,
            default_left: split.default_left,
            base_weight: base_weight as f32,
            left_leaf: (left_weight * eta) as f32,
            right_leaf: (right_weight * eta) as f32,
            loss_chg: split.gain as f32,
            sum_hess: parent_sum.hess as f32,
            left_hess: split.left_sum.hess as f32,
            right_hess: split.right_sum.hess as f32,
        };

        let (left, right) = match &split.condition {
            SplitCondition::Numeric { threshold } => tree.expand_numeric(node, *threshold, &record),
            SplitCondition::OneHot { category } => {
                let cat = as_category(*category).ok_or(SplitError::InvalidCategory {
                    node,
                    feature: split.feature,
                    value: *category,
                })?;
                tree.expand_categorical(node, CatBitset::singleton(cat), &record)
            }
            SplitCondition::Partition { categories } => {
                tree.expand_categorical(node, categories.clone(), &record)
            }
        };

        self.stats.resize(tree.n_nodes());
        // Child gains are evaluated under the parent's constraints
        let left_gain = self.evaluator.node_gain(node, split.left_sum);
        let right_gain = self.evaluator.node_gain(node, split.right_sum);
        self.stats.set(left, NodeStat { stats: split.left_sum, root_gain: left_gain });
        self.stats.set(right, NodeStat { stats: split.right_sum, root_gain: right_gain });

        self.evaluator.add_split(node, left, right, split.feature, left_weight, right_weight);
        self.constraints.register_split(node, split.feature, left, right);

        trace!(
            "Split node {} on feature {} (gain {:.6}) into {} / {}",
            node,
            split.feature,
            split.gain,
            left,
            right
        );
        Ok((left, right))
    }

    /// Add the finished tree's leaf values to `out`.
    ///
    /// See [`update_prediction_cache`].
    pub fn update_prediction_cache<T, P>(&self, tree: &T, partitioners: &[P], out: &mut [f32]) -> Result<(), SplitError>
    where
        T: TreeSink + ?Sized,
        P: RowSetSource,
    {
        update_prediction_cache(
            tree,
            partitioners,
            &self.stats,
            &self.evaluator,
            self.params.learning_rate,
            out,
            self.pool.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gbdt::histograms::NodeHistograms;
    use crate::training::gbdt::task::TaskKind;
    use crate::training::gbdt::tree::RegTree;
    use approx::assert_abs_diff_eq;

    fn params() -> TrainParams {
        TrainParams { n_threads: 1, ..Default::default() }
    }

    /// Two numeric features: feature 1 separates the gradients, feature 0 does not.
    fn fixture() -> (BinCuts, NodeHistograms, GradStats) {
        let cuts = BinCuts::from_features(&[(vec![1.0, 2.0], 0.0), (vec![1.0, 2.0], 0.0)]).unwrap();
        let mut hists = NodeHistograms::new(cuts.total_bins());
        hists.insert(
            0,
            vec![
                GradStats::new(0.0, 2.0),
                GradStats::new(0.0, 2.0),
                GradStats::new(-4.0, 2.0),
                GradStats::new(4.0, 2.0),
            ],
        );
        (cuts, hists, GradStats::new(0.0, 4.0))
    }

    #[test]
    fn test_root_round() {
        let (cuts, hists, root_sum) = fixture();
        let mut eval = HistEvaluator::new(&params(), 2, ObjInfo::default()).unwrap();
        let weight = eval.init_root(root_sum);
        assert_eq!(weight, 0.0);
        assert_eq!(eval.stats().len(), 1);

        let mut tree = RegTree::new();
        let mut entries = vec![ExpandEntry::new(0, 0)];
        eval.evaluate_splits(&hists, &cuts, &[], &tree, &mut entries).unwrap();

        let split = &entries[0].split;
        assert_eq!(split.feature, 1);
        assert_eq!(split.condition, SplitCondition::Numeric { threshold: 1.0 });
        assert_abs_diff_eq!(split.gain, 32.0 / 3.0, epsilon = 1e-12);
        assert!(entries[0].is_valid(eval.params(), tree.n_leaves()));

        let (left, right) = eval.apply_tree_split(&entries[0], &mut tree).unwrap();
        assert_eq!((left, right), (1, 2));
        assert!(!tree.is_leaf(0));
        assert_eq!(eval.stats().len(), 3);
        assert_eq!(eval.stats()[left].stats + eval.stats()[right].stats, root_sum);

        // Child leaf values are scaled, base weight is not
        assert_abs_diff_eq!(tree.node(left).leaf_value as f64, 4.0 / 3.0 * 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(eval.stats()[left].root_gain, 16.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_histogram() {
        let (cuts, _, root_sum) = fixture();
        let mut eval = HistEvaluator::new(&params(), 2, ObjInfo::default()).unwrap();
        eval.init_root(root_sum);
        let mut entries = vec![ExpandEntry::new(0, 0)];
        let err = eval
            .evaluate_splits(&NodeHistograms::new(4), &cuts, &[], &RegTree::new(), &mut entries)
            .unwrap_err();
        assert!(matches!(err, SplitError::MissingHistogram { node: 0 }));
    }

    #[test]
    fn test_missing_node_stat() {
        let (cuts, hists, _) = fixture();
        let mut eval = HistEvaluator::new(&params(), 2, ObjInfo::default()).unwrap();
        let mut entries = vec![ExpandEntry::new(0, 0)];
        let err = eval.evaluate_splits(&hists, &cuts, &[], &RegTree::new(), &mut entries).unwrap_err();
        assert!(matches!(err, SplitError::MissingNodeStat { node: 0 }));
    }

    #[test]
    fn test_unknown_node() {
        let (cuts, hists, root_sum) = fixture();
        let mut eval = HistEvaluator::new(&params(), 2, ObjInfo::default()).unwrap();
        eval.init_root(root_sum);
        let mut entries = vec![ExpandEntry::new(5, 1)];
        let err = eval.evaluate_splits(&hists, &cuts, &[], &RegTree::new(), &mut entries).unwrap_err();
        assert!(matches!(err, SplitError::UnknownNode { node: 5, n_nodes: 1 }));
    }

    #[test]
    fn test_sampled_feature_outside_cuts() {
        let (cuts, hists, root_sum) = fixture();
        // Sampler sized for three features, cuts only describe two
        let mut eval = HistEvaluator::new(&params(), 3, ObjInfo::default()).unwrap();
        eval.init_root(root_sum);
        let mut entries = vec![ExpandEntry::new(0, 0)];
        let err = eval.evaluate_splits(&hists, &cuts, &[], &RegTree::new(), &mut entries).unwrap_err();
        assert!(matches!(err, SplitError::FeatureOutOfRange { node: 0, feature: 2, n_features: 2 }));
        assert_eq!(entries[0].split, SplitCandidate::default());
    }

    #[test]
    fn test_empty_feature_set_reports_node() {
        let (cuts, hists, root_sum) = fixture();
        let sampler = ColumnSampler::new(0, 1.0, 1.0, 1.0, 0).unwrap();
        let mut eval = HistEvaluator::with_components(
            &params(),
            ObjInfo::default(),
            sampler,
            RegularizedEvaluator::default(),
            InteractionConstraints::none(),
        )
        .unwrap();
        eval.init_root(root_sum);
        let mut entries = vec![ExpandEntry::new(0, 0)];
        let err = eval.evaluate_splits(&hists, &cuts, &[], &RegTree::new(), &mut entries).unwrap_err();
        assert!(matches!(err, SplitError::EmptyFeatureSet { node: 0, depth: 0 }));
    }

    #[test]
    fn test_interaction_constraint_skips_feature() {
        let (cuts, hists, root_sum) = fixture();
        let mut constraints = InteractionConstraints::new(&[vec![0]]);
        // Pretend the root was already split on feature 0
        constraints.register_split(0, 0, 1, 2);
        let mut eval = HistEvaluator::with_components(
            &params(),
            ObjInfo::default(),
            ColumnSampler::new(2, 1.0, 1.0, 1.0, 0).unwrap(),
            RegularizedEvaluator::default(),
            constraints,
        )
        .unwrap();
        eval.stats.init_root(NodeStat { stats: root_sum, root_gain: 0.0 });
        eval.stats.set(1, NodeStat { stats: root_sum, root_gain: 0.0 });

        let mut hists = hists;
        let row = hists.row(0).unwrap().to_vec();
        hists.insert(1, row);

        let mut tree = RegTree::new();
        tree.expand_numeric(0, 0.0, &SplitRecord::default());
        let mut entries = vec![ExpandEntry::new(1, 1)];
        eval.evaluate_splits(&hists, &cuts, &[], &tree, &mut entries).unwrap();
        // Feature 1 is the only useful one but is not allowed below node 0
        assert_eq!(entries[0].split, SplitCandidate::default());
    }

    #[test]
    fn test_one_hot_split_commits_singleton() {
        let cuts = BinCuts::from_features(&[(vec![0.0, 1.0, 2.0], 0.0)]).unwrap();
        let mut hists = NodeHistograms::new(3);
        hists.insert(
            0,
            vec![GradStats::new(1.0, 1.0), GradStats::new(-6.0, 2.0), GradStats::new(1.0, 1.0)],
        );
        let task = ObjInfo::new(TaskKind::Regression);
        let mut eval = HistEvaluator::new(&params(), 1, task).unwrap();
        eval.init_root(GradStats::new(-4.0, 4.0));

        let mut tree = RegTree::new();
        let mut entries = vec![ExpandEntry::new(0, 0)];
        eval.evaluate_splits(&hists, &cuts, &[FeatureType::Categorical], &tree, &mut entries).unwrap();
        assert_eq!(entries[0].split.condition, SplitCondition::OneHot { category: 1.0 });

        let (left, right) = eval.apply_tree_split(&entries[0], &mut tree).unwrap();
        let cat_split = tree.categorical_split(0).unwrap();
        assert_eq!(cat_split.categories.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(tree.leaf_for(&[1.0]), right);
        assert_eq!(tree.leaf_for(&[2.0]), left);
    }

    #[test]
    fn test_invalid_one_hot_category() {
        let mut eval = HistEvaluator::new(&params(), 1, ObjInfo::default()).unwrap();
        eval.init_root(GradStats::new(0.0, 2.0));
        let mut entry = ExpandEntry::new(0, 0);
        entry.split.update(
            1.0,
            0,
            SplitCondition::OneHot { category: -3.0 },
            true,
            GradStats::new(-1.0, 1.0),
            GradStats::new(1.0, 1.0),
        );
        let err = eval.apply_tree_split(&entry, &mut RegTree::new()).unwrap_err();
        assert!(matches!(err, SplitError::InvalidCategory { node: 0, feature: 0, .. }));
    }

    #[test]
    fn test_invalid_params() {
        let params = TrainParams { learning_rate: 0.0, ..Default::default() };
        assert!(matches!(
            HistEvaluator::new(&params, 2, ObjInfo::default()),
            Err(SplitError::InvalidParams(_))
        ));
    }
}
