//! Training infrastructure for histogram-based tree growth.
//!
//! - [`GradStats`]: Additive gradient/hessian sufficient statistic
//! - [`Parallelism`]: Thread-count hint shared by parallel components
//! - [`gbdt`]: Split search, tree mutation and prediction cache updates

pub mod gbdt;

mod gradient;
mod parallelism;

pub use gradient::GradStats;
pub use parallelism::Parallelism;
