//! Split finding.
//!
//! - [`gain`]: gain and leaf weight formulas behind [`SplitEvaluator`]
//! - [`candidate`]: best-split records and their update rule
//! - [`enumerate`]: per-feature bin scans
//! - [`evaluator`]: parallel search over a frontier and tree mutation

pub mod candidate;
pub mod enumerate;
pub mod evaluator;
pub mod gain;

pub use candidate::{ExpandEntry, SplitCandidate, SplitCondition};
pub use enumerate::{Direction, FeatureScan, ScanKind};
pub use evaluator::HistEvaluator;
pub use gain::{RegularizedEvaluator, SplitEvaluator};
