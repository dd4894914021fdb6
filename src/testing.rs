//! Testing utilities for histsplit.
//!
//! Assertion helpers plus a small dense dataset fixture that bins raw rows,
//! builds node histograms and drives depth-wise growth through the public
//! API. Used by unit tests and by the integration tests under `tests/`.
//!
//! ```ignore
//! use histsplit::testing::{grow_tree, DenseFixture};
//! ```

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::training::gbdt::{
    BinCuts, ExpandEntry, FeatureSampler, FeatureType, HistEvaluator, InteractionOracle,
    NodeHistograms, RegTree, RowPartitioner, RowSetSource, SplitError, SplitEvaluator, TreeSink,
};
use crate::training::GradStats;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Default tolerance for accumulated gradient statistics.
pub const DEFAULT_TOLERANCE_F64: f64 = 1e-9;

/// Assert that two f64 values are approximately equal.
///
/// # Examples
///
/// ```
/// # use histsplit::assert_approx_eq_f64;
/// assert_approx_eq_f64!(1.0f64, 1.0001f64, 0.001);
/// ```
#[macro_export]
macro_rules! assert_approx_eq_f64 {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if diff > tol {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                left_val, right_val, diff, tol
            );
        }
    }};
    ($left:expr, $right:expr, $tolerance:expr, $($arg:tt)+) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if diff > tol {
            panic!(
                "assertion failed: `(left ≈ right)` - {}\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                format_args!($($arg)+), left_val, right_val, diff, tol
            );
        }
    }};
}

/// Assert that two statistics agree in both components.
///
/// # Panics
///
/// Panics if the gradient or hessian sums differ by more than `tolerance`.
pub fn assert_stats_approx_eq(actual: GradStats, expected: GradStats, tolerance: f64, context: &str) {
    assert_approx_eq_f64!(actual.grad, expected.grad, tolerance, "{context}: grad");
    assert_approx_eq_f64!(actual.hess, expected.hess, tolerance, "{context}: hess");
}

/// Assert that two slices of f32 values are approximately equal element-wise.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slice_approx_eq(actual: &[f32], expected: &[f32], tolerance: f32, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (a - e).abs();
        assert!(
            diff <= tolerance,
            "{context}[{i}]: {a} ≠ {e} (diff={diff}, tolerance={tolerance})"
        );
    }
}

// =============================================================================
// Dense Fixture
// =============================================================================

/// Raw rows with gradients, plus the bin cuts used to histogram them.
///
/// Numeric features take values in `[0, 1)` with equal-width bins whose last
/// cut is `1.0`. Categorical features take ids `0..n_cats` with one bin per
/// category. `NaN` marks a missing value.
#[derive(Debug, Clone)]
pub struct DenseFixture {
    pub rows: Vec<Vec<f32>>,
    pub gpairs: Vec<GradStats>,
    pub cuts: BinCuts,
    pub feature_types: Vec<FeatureType>,
}

impl DenseFixture {
    /// Generate a random fixture.
    ///
    /// Gradients depend on numeric feature 0 and categorical feature
    /// `n_numeric` (when present), so good splits exist on both kinds.
    pub fn random(
        n_rows: usize,
        n_numeric: usize,
        n_bins: usize,
        n_categorical: usize,
        n_cats: usize,
        missing_ratio: f64,
        seed: u64,
    ) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let mut features: Vec<(Vec<f32>, f32)> = Vec::with_capacity(n_numeric + n_categorical);
        let mut feature_types = Vec::with_capacity(n_numeric + n_categorical);
        for _ in 0..n_numeric {
            let cuts = (1..=n_bins).map(|k| k as f32 / n_bins as f32).collect();
            features.push((cuts, 0.0));
            feature_types.push(FeatureType::Numerical);
        }
        for _ in 0..n_categorical {
            features.push(((0..n_cats).map(|c| c as f32).collect(), 0.0));
            feature_types.push(FeatureType::Categorical);
        }

        let mut rows = Vec::with_capacity(n_rows);
        let mut gpairs = Vec::with_capacity(n_rows);
        for _ in 0..n_rows {
            let mut row = Vec::with_capacity(features.len());
            for f in 0..n_numeric + n_categorical {
                let value = if rng.gen_bool(missing_ratio) {
                    f32::NAN
                } else if f < n_numeric {
                    rng.gen_range(0.0f32..1.0)
                } else {
                    rng.gen_range(0..n_cats) as f32
                };
                row.push(value);
            }

            let mut grad = rng.gen_range(-0.3..0.3);
            if n_numeric > 0 {
                grad += match row[0] {
                    v if v.is_nan() => -0.5,
                    v if v < 0.5 => -1.0,
                    _ => 1.0,
                };
            }
            if n_categorical > 0 && row[n_numeric] == 2.0 {
                grad += 2.0;
            }
            let hess = rng.gen_range(0.5..1.5);
            gpairs.push(GradStats::new(grad, hess));
            rows.push(row);
        }

        let cuts = match BinCuts::from_features(&features) {
            Ok(cuts) => cuts,
            Err(err) => panic!("fixture cuts are well formed: {err}"),
        };
        Self { rows, gpairs, cuts, feature_types }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_features(&self) -> u32 {
        self.cuts.n_features() as u32
    }

    /// Global bin of a value, or `None` if it is missing.
    pub fn bin_of(&self, feature: u32, value: f32) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let bins = self.cuts.feature_bins(feature);
        let values = &self.cuts.values()[bins.clone()];
        let local = match self.feature_types.get(feature as usize) {
            Some(FeatureType::Categorical) => values.iter().position(|&c| c == value)?,
            _ => values.iter().position(|&c| value < c).unwrap_or(values.len() - 1),
        };
        Some(bins.start + local)
    }

    /// Histogram row over `rows`.
    pub fn histogram(&self, rows: &[u32]) -> Vec<GradStats> {
        let mut hist = vec![GradStats::ZERO; self.cuts.total_bins()];
        for &r in rows {
            let row = &self.rows[r as usize];
            for f in 0..self.n_features() {
                if let Some(bin) = self.bin_of(f, row[f as usize]) {
                    hist[bin] += self.gpairs[r as usize];
                }
            }
        }
        hist
    }

    /// Total statistic of `rows`.
    pub fn sum(&self, rows: &[u32]) -> GradStats {
        rows.iter().map(|&r| self.gpairs[r as usize]).sum()
    }
}

/// Grow one tree depth-wise over `data`.
///
/// Each round evaluates the whole frontier, commits every valid split and
/// routes rows with [`RegTree::goes_left`]. Returns the tree and the final row
/// partition.
pub fn grow_tree<S, E, C>(
    eval: &mut HistEvaluator<S, E, C>,
    data: &DenseFixture,
) -> Result<(RegTree, RowPartitioner), SplitError>
where
    S: FeatureSampler,
    E: SplitEvaluator,
    C: InteractionOracle,
{
    let mut tree = RegTree::new();
    let mut partitioner = RowPartitioner::new(data.n_rows());
    let mut hists = NodeHistograms::new(data.cuts.total_bins());

    hists.insert(0, data.histogram(partitioner.rows(0)));
    let root_weight = eval.init_root(data.sum(partitioner.rows(0)));
    tree.set_leaf(0, (root_weight * eval.params().learning_rate as f64) as f32);

    let mut frontier = vec![ExpandEntry::new(0, 0)];
    while !frontier.is_empty() {
        eval.evaluate_splits(&hists, &data.cuts, &data.feature_types, &tree, &mut frontier)?;

        let mut next = Vec::new();
        for entry in &frontier {
            if !entry.is_valid(eval.params(), tree.n_leaves()) {
                continue;
            }
            let (left, right) = eval.apply_tree_split(entry, &mut tree)?;
            partitioner.apply_split(entry.node_id, left, right, |row| {
                tree.goes_left(entry.node_id, &data.rows[row as usize])
            });
            hists.insert(left, data.histogram(partitioner.rows(left)));
            hists.insert(right, data.histogram(partitioner.rows(right)));
            hists.release(entry.node_id);

            next.push(ExpandEntry::new(left, entry.depth + 1));
            next.push(ExpandEntry::new(right, entry.depth + 1));
        }
        frontier = next;
    }
    Ok((tree, partitioner))
}
