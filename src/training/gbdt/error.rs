//! Fatal error conditions of split search and tree mutation.
//!
//! Every variant signals an upstream invariant violation rather than bad user
//! input. Callers are expected to abort the training run; nothing here is
//! retried.

use super::params::ParamValidationError;
use super::tree::NodeId;

/// Errors raised by split evaluation, tree mutation and prediction updates.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("bin boundary index {index} of feature {feature} exceeds i32::MAX")]
    BinIndexOverflow { feature: u32, index: usize },

    #[error("malformed bin cuts: {0}")]
    MalformedCuts(String),

    #[error("prediction cache is empty")]
    EmptyPredictionCache,

    #[error("tree has {tree} nodes but row partition reports {partition}")]
    NodeCountMismatch { tree: usize, partition: usize },

    #[error("column sampler returned no features for node {node} at depth {depth}")]
    EmptyFeatureSet { node: NodeId, depth: u32 },

    #[error("node {node} is not in the tree ({n_nodes} nodes)")]
    UnknownNode { node: NodeId, n_nodes: usize },

    #[error("sampled feature {feature} of node {node} is outside the {n_features} features of the cuts")]
    FeatureOutOfRange { node: NodeId, feature: u32, n_features: usize },

    #[error("no histogram for node {node}")]
    MissingHistogram { node: NodeId },

    #[error("no statistics recorded for node {node}")]
    MissingNodeStat { node: NodeId },

    #[error("invalid category {value} for feature {feature} at node {node}")]
    InvalidCategory { node: NodeId, feature: u32, value: f32 },

    #[error("row {row} is outside the prediction cache of length {len}")]
    RowOutOfRange { row: u32, len: usize },

    #[error("row {row} is owned by more than one leaf")]
    DuplicateRow { row: u32 },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid training parameters: {0}")]
    InvalidParams(#[from] ParamValidationError),
}
