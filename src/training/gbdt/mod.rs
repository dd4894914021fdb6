//! Histogram-based split search and node expansion for GBDT training.
//!
//! One growth round looks like this:
//!
//! 1. The caller builds histograms for every frontier node (external).
//! 2. [`HistEvaluator::evaluate_splits`] scans every (node, sampled feature)
//!    pair in parallel and reduces to one [`SplitCandidate`] per node.
//! 3. For each valid [`ExpandEntry`], [`HistEvaluator::apply_tree_split`]
//!    commits the split into a [`TreeSink`] and records child statistics.
//! 4. The children form the next frontier.
//!
//! Once a tree is finished, [`update_prediction_cache`] adds every leaf's
//! scaled weight to the rows it owns.
//!
//! Components:
//!
//! - [`categorical`] - Fixed-width category bitset
//! - [`constraints`] - Interaction and monotone constraints
//! - [`cuts`] - Bin boundaries per feature
//! - [`histograms`] - Read-only histogram access
//! - [`partition`] - Row-to-node assignment
//! - [`predict`] - Prediction cache update
//! - [`sampling`] - Column sampling
//! - [`split`] - Gain evaluation, candidates, bin scans and parallel search
//! - [`stats`] - Per-node statistics table
//! - [`tree`] - Tree mutation interface and default container

pub mod categorical;
pub mod constraints;
pub mod cuts;
pub mod error;
pub mod histograms;
pub mod params;
pub mod partition;
pub mod predict;
pub mod sampling;
pub mod split;
pub mod stats;
pub mod task;
pub mod tree;

pub use categorical::CatBitset;
pub use constraints::{InteractionConstraints, InteractionOracle, MonotonicConstraint};
pub use cuts::{BinCuts, FeatureType};
pub use error::SplitError;
pub use histograms::{HistogramSource, NodeHistograms};
pub use params::{ParamValidationError, TrainParams};
pub use partition::{RowPartitioner, RowSetSource};
pub use predict::update_prediction_cache;
pub use sampling::{ColumnSampler, FeatureSampler};
pub use split::{
    ExpandEntry, HistEvaluator, RegularizedEvaluator, SplitCandidate, SplitCondition,
    SplitEvaluator,
};
pub use stats::{NodeStat, NodeStatsTable};
pub use task::{ObjInfo, TaskKind};
pub use tree::{NodeId, RegTree, SplitRecord, TreeSink};
