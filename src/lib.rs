//! histsplit: split evaluation and node expansion for histogram-based
//! gradient boosted decision trees.
//!
//! The crate covers the hard core of depth-wise tree growth: for a frontier of
//! nodes it scans pre-built gradient histograms to find the best split per
//! node, commits the winners into a tree, and keeps the per-node statistics
//! needed by subsequent rounds. Histogram construction, feature binning and
//! the outer boosting loop are external concerns.
//!
//! See [`training::gbdt`] for the main entry point, [`HistEvaluator`].
//!
//! [`HistEvaluator`]: training::gbdt::HistEvaluator

pub mod testing;
pub mod training;
