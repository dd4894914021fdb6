//! Training parameters consumed by split search and tree mutation.
//!
//! The evaluator only reads these values; it never owns the training
//! configuration. Defaults follow XGBoost.

use serde::{Deserialize, Serialize};

use super::constraints::MonotonicConstraint;

/// Parameters for split search, leaf weights and column sampling.
///
/// # Example
///
/// ```
/// use histsplit::training::gbdt::TrainParams;
///
/// let params = TrainParams {
///     learning_rate: 0.1,
///     min_child_weight: 5.0,
///     colsample_bynode: 0.8,
///     ..Default::default()
/// };
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    /// Shrinkage applied to leaf weights stored in the tree (`eta`).
    pub learning_rate: f32,
    /// Minimum hessian sum required on each side of a split.
    pub min_child_weight: f32,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f32,
    /// L1 regularization on leaf weights.
    pub reg_alpha: f32,
    /// Maximum absolute leaf weight. `0` disables clamping.
    pub max_delta_step: f32,
    /// Minimum loss reduction required to expand a node (`gamma`).
    pub min_split_loss: f32,
    /// Maximum tree depth. `0` means unlimited.
    pub max_depth: u32,
    /// Maximum number of leaves. `0` means unlimited.
    pub max_leaves: u32,
    /// Fraction of features sampled once per tree.
    pub colsample_bytree: f32,
    /// Fraction of the tree's features sampled per depth level.
    pub colsample_bylevel: f32,
    /// Fraction of the level's features sampled per node.
    pub colsample_bynode: f32,
    /// Per-feature column sampling weights. Empty samples uniformly; features
    /// past the end weigh 1 and a weight of 0 excludes a feature whenever a
    /// ratio is below 1.
    pub feature_weights: Vec<f32>,
    /// Categorical features with fewer categories than this use one-hot splits.
    pub max_cat_to_onehot: u32,
    /// Per-feature monotone constraints (`-1`, `0`, `1`).
    pub monotone_constraints: Vec<i32>,
    /// Groups of features allowed to interact along one tree path.
    pub interaction_constraints: Vec<Vec<u32>>,
    /// Seed for column sampling.
    pub seed: u64,
    /// Worker threads for parallel regions. `0` uses rayon's default.
    pub n_threads: usize,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            max_delta_step: 0.0,
            min_split_loss: 0.0,
            max_depth: 6,
            max_leaves: 0,
            colsample_bytree: 1.0,
            colsample_bylevel: 1.0,
            colsample_bynode: 1.0,
            feature_weights: Vec::new(),
            max_cat_to_onehot: 4,
            monotone_constraints: Vec::new(),
            interaction_constraints: Vec::new(),
            seed: 0,
            n_threads: 0,
        }
    }
}

impl TrainParams {
    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range parameter found.
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.learning_rate > 0.0) {
            return Err(ParamValidationError::InvalidLearningRate(self.learning_rate));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(ParamValidationError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.reg_lambda >= 0.0) {
            return Err(ParamValidationError::InvalidLambda(self.reg_lambda));
        }
        if !(self.reg_alpha >= 0.0) {
            return Err(ParamValidationError::InvalidAlpha(self.reg_alpha));
        }
        if !(self.max_delta_step >= 0.0) {
            return Err(ParamValidationError::InvalidMaxDeltaStep(self.max_delta_step));
        }
        if !(self.min_split_loss >= 0.0) {
            return Err(ParamValidationError::InvalidMinSplitLoss(self.min_split_loss));
        }
        for (name, ratio) in [
            ("colsample_bytree", self.colsample_bytree),
            ("colsample_bylevel", self.colsample_bylevel),
            ("colsample_bynode", self.colsample_bynode),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ParamValidationError::InvalidSamplingRatio { name, value: ratio });
            }
        }
        if let Some((feature, &value)) =
            self.feature_weights.iter().enumerate().find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(ParamValidationError::InvalidFeatureWeight { feature, value });
        }
        if let Some(&c) = self.monotone_constraints.iter().find(|c| !(-1..=1).contains(*c)) {
            return Err(ParamValidationError::InvalidMonotoneConstraint(c));
        }
        Ok(())
    }

    /// Monotone constraints as typed values.
    pub fn monotone(&self) -> Vec<MonotonicConstraint> {
        self.monotone_constraints
            .iter()
            .map(|&c| MonotonicConstraint::from_int(c))
            .collect()
    }
}

/// Parameter validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamValidationError {
    /// learning_rate must be > 0.
    #[error("learning_rate must be > 0, got {0}")]
    InvalidLearningRate(f32),

    /// min_child_weight must be >= 0.
    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f32),

    /// Lambda (L2 regularization) must be >= 0.
    #[error("reg_lambda must be >= 0, got {0}")]
    InvalidLambda(f32),

    /// Alpha (L1 regularization) must be >= 0.
    #[error("reg_alpha must be >= 0, got {0}")]
    InvalidAlpha(f32),

    /// max_delta_step must be >= 0.
    #[error("max_delta_step must be >= 0, got {0}")]
    InvalidMaxDeltaStep(f32),

    /// min_split_loss must be >= 0.
    #[error("min_split_loss must be >= 0, got {0}")]
    InvalidMinSplitLoss(f32),

    /// Column sampling ratios must be in (0, 1].
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { name: &'static str, value: f32 },

    /// Feature weights must be finite and >= 0.
    #[error("weight of feature {feature} must be finite and >= 0, got {value}")]
    InvalidFeatureWeight { feature: usize, value: f32 },

    /// Monotone constraints must be -1, 0 or 1.
    #[error("monotone constraint must be -1, 0 or 1, got {0}")]
    InvalidMonotoneConstraint(i32),
}
