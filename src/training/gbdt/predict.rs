//! Prediction cache update after a tree is finished.
//!
//! Instead of walking the tree for every training row, each leaf's weight is
//! added to the rows the row partition assigned to it.

use fixedbitset::FixedBitSet;
use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use super::error::SplitError;
use super::partition::RowSetSource;
use super::split::SplitEvaluator;
use super::stats::NodeStatsTable;
use super::tree::{NodeId, TreeSink};

/// Rows per parallel work block.
const ROW_BLOCK: usize = 2048;

/// Raw view of the prediction cache shared by the workers.
#[derive(Clone, Copy)]
struct CachePtr(*mut f32);

// SAFETY: workers only write rows that were checked to be disjoint and in range.
unsafe impl Send for CachePtr {}
unsafe impl Sync for CachePtr {}

impl CachePtr {
    /// # Safety
    ///
    /// `row` must be in bounds and no other thread may access it concurrently.
    #[inline]
    unsafe fn add(self, row: usize, value: f32) {
        *self.0.add(row) += value;
    }
}

/// Add the scaled weight of every live leaf of `tree` to the rows it owns.
///
/// `partitioners` together must assign every row to at most one leaf. The
/// leaf weight is `leaf_weight(node, stats) * learning_rate`.
///
/// # Errors
///
/// - [`SplitError::EmptyPredictionCache`] if `out` is empty.
/// - [`SplitError::NodeCountMismatch`] if a partitioner disagrees with the tree.
/// - [`SplitError::MissingNodeStat`] if a leaf has no statistics.
/// - [`SplitError::RowOutOfRange`] / [`SplitError::DuplicateRow`] if the row
///   sets do not partition the cache.
pub fn update_prediction_cache<T, P, E>(
    tree: &T,
    partitioners: &[P],
    stats: &NodeStatsTable,
    evaluator: &E,
    learning_rate: f32,
    out: &mut [f32],
    pool: Option<&ThreadPool>,
) -> Result<(), SplitError>
where
    T: TreeSink + ?Sized,
    P: RowSetSource,
    E: SplitEvaluator + ?Sized,
{
    if out.is_empty() {
        return Err(SplitError::EmptyPredictionCache);
    }
    let eta = learning_rate as f64;

    let mut leaves: Vec<(NodeId, f32)> = Vec::new();
    for node in 0..tree.n_nodes() as NodeId {
        if tree.is_deleted(node) || !tree.is_leaf(node) {
            continue;
        }
        let stat = stats.get(node).ok_or(SplitError::MissingNodeStat { node })?;
        leaves.push((node, (evaluator.leaf_weight(node, stat.stats) * eta) as f32));
    }

    let mut seen = FixedBitSet::with_capacity(out.len());
    let mut blocks: Vec<(f32, &[u32])> = Vec::new();
    for partitioner in partitioners {
        if partitioner.n_nodes() != tree.n_nodes() {
            return Err(SplitError::NodeCountMismatch {
                tree: tree.n_nodes(),
                partition: partitioner.n_nodes(),
            });
        }
        for &(node, value) in &leaves {
            let rows = partitioner.rows(node);
            for &row in rows {
                let r = row as usize;
                if r >= out.len() {
                    return Err(SplitError::RowOutOfRange { row, len: out.len() });
                }
                if seen.put(r) {
                    return Err(SplitError::DuplicateRow { row });
                }
            }
            blocks.extend(rows.chunks(ROW_BLOCK).map(|chunk| (value, chunk)));
        }
    }

    debug!(
        "Updating prediction cache: {} leaves, {} rows, {} blocks",
        leaves.len(),
        seen.count_ones(..),
        blocks.len()
    );

    match pool {
        None => {
            for &(value, rows) in &blocks {
                for &row in rows {
                    out[row as usize] += value;
                }
            }
        }
        Some(pool) => {
            let cache = CachePtr(out.as_mut_ptr());
            pool.install(|| {
                blocks.par_iter().for_each(|&(value, rows)| {
                    for &row in rows {
                        // SAFETY: every row was checked above to be below
                        // `out.len()` and owned by exactly one block.
                        unsafe { cache.add(row as usize, value) };
                    }
                });
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gbdt::partition::RowPartitioner;
    use crate::training::gbdt::split::RegularizedEvaluator;
    use crate::training::gbdt::stats::NodeStat;
    use crate::training::gbdt::tree::{RegTree, SplitRecord};
    use crate::training::{GradStats, Parallelism};
    use approx::assert_abs_diff_eq;

    /// Root split into rows `0..4` (left) and `4..10` (right).
    fn two_leaves() -> (RegTree, RowPartitioner, NodeStatsTable) {
        let mut tree = RegTree::new();
        tree.expand_numeric(0, 0.5, &SplitRecord::default());
        let mut partitioner = RowPartitioner::new(10);
        partitioner.apply_split(0, 1, 2, |row| row < 4);

        let mut stats = NodeStatsTable::new();
        stats.init_root(NodeStat { stats: GradStats::new(0.0, 10.0), root_gain: 0.0 });
        stats.set(1, NodeStat { stats: GradStats::new(-7.0, 4.0), root_gain: 0.0 });
        stats.set(2, NodeStat { stats: GradStats::new(7.0, 6.0), root_gain: 0.0 });
        (tree, partitioner, stats)
    }

    #[test]
    fn test_two_leaves_sequential() {
        let (tree, partitioner, stats) = two_leaves();
        let eval = RegularizedEvaluator::default();
        let mut out = vec![1.0f32; 10];
        update_prediction_cache(&tree, &[partitioner], &stats, &eval, 0.5, &mut out, None).unwrap();

        // -(-7) / 5 * 0.5 and -(7) / 7 * 0.5
        assert!(out[..4].iter().all(|&v| v == 1.0 + 0.7));
        assert!(out[4..].iter().all(|&v| v == 1.0 - 0.5));
    }

    #[test]
    fn test_two_leaves_parallel_matches_sequential() {
        let (tree, partitioner, stats) = two_leaves();
        let eval = RegularizedEvaluator::default();
        let pool = Parallelism::Parallel(4).build_pool().unwrap();

        let mut seq = vec![0.0f32; 10];
        let mut par = vec![0.0f32; 10];
        let parts = [partitioner];
        update_prediction_cache(&tree, &parts, &stats, &eval, 0.3, &mut seq, None).unwrap();
        update_prediction_cache(&tree, &parts, &stats, &eval, 0.3, &mut par, pool.as_ref()).unwrap();
        assert_eq!(seq, par);
        let total: f32 = par.iter().sum();
        assert_abs_diff_eq!(total, 4.0 * 0.42 + 6.0 * -0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_empty_cache() {
        let (tree, partitioner, stats) = two_leaves();
        let eval = RegularizedEvaluator::default();
        let err = update_prediction_cache(&tree, &[partitioner], &stats, &eval, 0.3, &mut [], None)
            .unwrap_err();
        assert!(matches!(err, SplitError::EmptyPredictionCache));
    }

    #[test]
    fn test_node_count_mismatch() {
        let (tree, _, stats) = two_leaves();
        let eval = RegularizedEvaluator::default();
        let mut out = vec![0.0f32; 10];
        let err = update_prediction_cache(&tree, &[RowPartitioner::new(10)], &stats, &eval, 0.3, &mut out, None)
            .unwrap_err();
        assert!(matches!(err, SplitError::NodeCountMismatch { tree: 3, partition: 1 }));
    }

    #[test]
    fn test_rows_must_fit_and_be_disjoint() {
        let (tree, partitioner, stats) = two_leaves();
        let eval = RegularizedEvaluator::default();

        let mut short = vec![0.0f32; 6];
        let err = update_prediction_cache(&tree, &[partitioner.clone()], &stats, &eval, 0.3, &mut short, None)
            .unwrap_err();
        assert!(matches!(err, SplitError::RowOutOfRange { len: 6, .. }));

        let mut out = vec![0.0f32; 10];
        let err = update_prediction_cache(
            &tree,
            &[partitioner.clone(), partitioner],
            &stats,
            &eval,
            0.3,
            &mut out,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::DuplicateRow { row: 0 }));
        // Validation happens before any write
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_collapsed_subtree_is_skipped() {
        let (mut tree, mut partitioner, mut stats) = two_leaves();
        tree.expand_numeric(1, 0.1, &SplitRecord::default());
        partitioner.apply_split(1, 3, 4, |row| row < 2);
        stats.resize(5);
        tree.collapse_to_leaf(1, 0.0);

        let eval = RegularizedEvaluator::default();
        let mut out = vec![0.0f32; 10];
        update_prediction_cache(&tree, &[partitioner], &stats, &eval, 1.0, &mut out, None).unwrap();
        for &v in &out[..4] {
            assert_abs_diff_eq!(v, 1.4, epsilon = 1e-6);
        }
        assert!(out[4..].iter().all(|&v| v == -1.0));
    }
}
