//! Learning task descriptor.

use serde::{Deserialize, Serialize};

/// Kind of learning task the gradients come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskKind {
    #[default]
    Regression,
    Binary,
    Classification,
    Ranking,
    Survival,
    Other,
}

/// Task information that affects which split types are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjInfo {
    pub task: TaskKind,
}

impl ObjInfo {
    pub fn new(task: TaskKind) -> Self {
        Self { task }
    }

    /// Partition-based categorical splits are only defined for these tasks.
    #[inline]
    pub fn supports_partition(&self) -> bool {
        matches!(self.task, TaskKind::Regression | TaskKind::Binary)
    }
}

/// Whether a categorical feature with `n_cats` categories uses one-hot splits.
///
/// Small cardinalities always use one-hot. Larger ones use partition-based
/// splits unless the task does not support them.
#[inline]
pub fn use_one_hot(n_cats: usize, max_cat_to_onehot: u32, task: ObjInfo) -> bool {
    n_cats < max_cat_to_onehot as usize || !task.supports_partition()
}
