//! Column (feature) sampling for split search.
//!
//! Column sampling cascades at three levels:
//! 1. `colsample_bytree`: Sample features once per tree
//! 2. `colsample_bylevel`: Sample from tree features once per depth level
//! 3. `colsample_bynode`: Sample from level features at each node
//!
//! Optional per-feature weights bias every level towards heavier features.
//!
//! The sampler is stateful: a single seeded generator advances across all
//! draws of a training run, so results are deterministic for a fixed seed and
//! call sequence.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::error::SplitError;
use super::params::{ParamValidationError, TrainParams};

/// Source of the feature subset considered at a node.
pub trait FeatureSampler {
    /// Start a new tree.
    fn begin_tree(&mut self);

    /// Features available to a node at `depth`, sorted ascending.
    fn sample(&mut self, depth: u32) -> Result<Arc<[u32]>, SplitError>;
}

impl<S: FeatureSampler + ?Sized> FeatureSampler for &mut S {
    fn begin_tree(&mut self) {
        (**self).begin_tree()
    }

    fn sample(&mut self, depth: u32) -> Result<Arc<[u32]>, SplitError> {
        (**self).sample(depth)
    }
}

/// Samples features at tree, level, and node granularity.
#[derive(Debug, Clone)]
pub struct ColumnSampler {
    n_features: u32,
    colsample_bytree: f32,
    colsample_bylevel: f32,
    colsample_bynode: f32,
    /// Sampling weight per feature id. Empty means uniform.
    weights: Arc<[f32]>,
    rng: Xoshiro256PlusPlus,
    /// Features selected for the current tree.
    tree_features: Arc<[u32]>,
    /// Per-depth features, drawn lazily from `tree_features`.
    level_features: Vec<Option<Arc<[u32]>>>,
}

impl ColumnSampler {
    /// Create a sampler and draw the features of the first tree.
    ///
    /// # Errors
    ///
    /// Returns an error if any ratio is not in (0, 1].
    pub fn new(
        n_features: u32,
        colsample_bytree: f32,
        colsample_bylevel: f32,
        colsample_bynode: f32,
        seed: u64,
    ) -> Result<Self, ParamValidationError> {
        Self::weighted(n_features, colsample_bytree, colsample_bylevel, colsample_bynode, Vec::new(), seed)
    }

    /// Create a sampler that draws features with probability proportional to
    /// `weights`, indexed by feature id.
    ///
    /// # Errors
    ///
    /// Returns an error if any ratio is not in (0, 1] or a weight is negative
    /// or not finite.
    pub fn weighted(
        n_features: u32,
        colsample_bytree: f32,
        colsample_bylevel: f32,
        colsample_bynode: f32,
        weights: Vec<f32>,
        seed: u64,
    ) -> Result<Self, ParamValidationError> {
        if let Some((feature, &value)) =
            weights.iter().enumerate().find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(ParamValidationError::InvalidFeatureWeight { feature, value });
        }
        for (name, value) in [
            ("colsample_bytree", colsample_bytree),
            ("colsample_bylevel", colsample_bylevel),
            ("colsample_bynode", colsample_bynode),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ParamValidationError::InvalidSamplingRatio { name, value });
            }
        }
        let mut sampler = Self {
            n_features,
            colsample_bytree,
            colsample_bylevel,
            colsample_bynode,
            weights: Arc::from(weights),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            tree_features: Arc::from(Vec::new()),
            level_features: Vec::new(),
        };
        sampler.begin_tree();
        Ok(sampler)
    }

    /// Create a sampler from training parameters.
    pub fn from_params(params: &TrainParams, n_features: u32) -> Result<Self, ParamValidationError> {
        Self::weighted(
            n_features,
            params.colsample_bytree,
            params.colsample_bylevel,
            params.colsample_bynode,
            params.feature_weights.clone(),
            params.seed,
        )
    }

    /// Returns true if any column sampling is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.colsample_bytree < 1.0 || self.colsample_bylevel < 1.0 || self.colsample_bynode < 1.0
    }

    /// Features selected for the current tree.
    pub fn tree_features(&self) -> &[u32] {
        &self.tree_features
    }

    fn level(&mut self, depth: u32) -> Arc<[u32]> {
        let d = depth as usize;
        if d >= self.level_features.len() {
            self.level_features.resize(d + 1, None);
        }
        if let Some(level) = &self.level_features[d] {
            return Arc::clone(level);
        }
        let level = sample_from(&mut self.rng, &self.tree_features, self.colsample_bylevel, &self.weights);
        self.level_features[d] = Some(Arc::clone(&level));
        level
    }
}

impl FeatureSampler for ColumnSampler {
    fn begin_tree(&mut self) {
        let all: Vec<u32> = (0..self.n_features).collect();
        self.tree_features = sample_from(&mut self.rng, &all, self.colsample_bytree, &self.weights);
        self.level_features.clear();
    }

    fn sample(&mut self, depth: u32) -> Result<Arc<[u32]>, SplitError> {
        let level = self.level(depth);
        let features = if self.colsample_bynode >= 1.0 {
            level
        } else {
            sample_from(&mut self.rng, &level, self.colsample_bynode, &self.weights)
        };
        if features.is_empty() {
            return Err(SplitError::EmptyFeatureSet { node: 0, depth });
        }
        Ok(features)
    }
}

/// Draw `max(1, floor(ratio * len))` items without replacement.
///
/// Returns sorted values. A ratio of 1 returns the input unchanged without
/// advancing the generator. With `weights`, items are ranked by the
/// exponential key `ln(u) / w` and the top ones are kept.
fn sample_from(rng: &mut Xoshiro256PlusPlus, items: &[u32], ratio: f32, weights: &[f32]) -> Arc<[u32]> {
    if ratio >= 1.0 || items.is_empty() {
        return Arc::from(items);
    }
    let k = ((ratio * items.len() as f32) as usize).max(1);
    let mut pool = items.to_vec();

    if weights.is_empty() {
        // Partial Fisher-Yates shuffle
        for i in 0..k {
            let j = rng.gen_range(i..pool.len());
            pool.swap(i, j);
        }
    } else {
        let keys: Vec<f64> = pool
            .iter()
            .map(|&f| {
                let w = weights.get(f as usize).copied().unwrap_or(1.0) as f64;
                let u = 1.0 - rng.gen::<f64>();
                if w > 0.0 {
                    u.ln() / w
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect();
        let mut order: Vec<usize> = (0..pool.len()).collect();
        order.sort_by(|&a, &b| keys[b].total_cmp(&keys[a]));
        pool = order.into_iter().map(|i| pool[i]).collect();
    }

    pool.truncate(k);
    pool.sort_unstable();
    Arc::from(pool)
}
