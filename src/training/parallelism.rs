//! Shared parallelism configuration.
//!
//! A single [`Parallelism`] hint is handed to the split search and the
//! prediction cache updater. Both run blocking fork-join regions on a
//! fixed-size rayon pool built from this hint.

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Parallelism strategy for training operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Strictly sequential execution on the calling thread.
    #[default]
    Sequential,
    /// Parallel execution with exactly `n` worker threads.
    ///
    /// If `n <= 1`, this is equivalent to `Sequential`.
    Parallel(usize),
}

impl Parallelism {
    /// Create a parallelism hint from a thread count.
    ///
    /// - `0` → rayon's current thread count
    /// - `1` → sequential
    /// - `n > 1` → parallel with n threads
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        match n_threads {
            0 => Self::Parallel(rayon::current_num_threads()),
            1 => Self::Sequential,
            n => Self::Parallel(n),
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn allows_parallel(self) -> bool {
        matches!(self, Self::Parallel(n) if n > 1)
    }

    /// Worker count (1 for sequential).
    #[inline]
    pub fn n_threads(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel(n) => n.max(1),
        }
    }

    /// Block size that spreads `n_items` evenly over the workers.
    #[inline]
    pub fn grain_size(self, n_items: usize) -> usize {
        (n_items / self.n_threads()).max(1)
    }

    /// Build the fixed-size worker pool for this hint.
    ///
    /// Returns `None` for sequential execution.
    pub fn build_pool(self) -> Result<Option<ThreadPool>, ThreadPoolBuildError> {
        if !self.allows_parallel() {
            return Ok(None);
        }
        ThreadPoolBuilder::new()
            .num_threads(self.n_threads())
            .thread_name(|i| format!("histsplit-{i}"))
            .build()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_threads() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_threads(4), Parallelism::Parallel(4));
        assert!(matches!(Parallelism::from_threads(0), Parallelism::Parallel(_)));
    }

    #[test]
    fn test_allows_parallel() {
        assert!(!Parallelism::Sequential.allows_parallel());
        assert!(!Parallelism::Parallel(1).allows_parallel());
        assert!(Parallelism::Parallel(2).allows_parallel());
    }

    #[test]
    fn test_grain_size() {
        assert_eq!(Parallelism::Sequential.grain_size(10), 10);
        assert_eq!(Parallelism::Parallel(4).grain_size(10), 2);
        assert_eq!(Parallelism::Parallel(8).grain_size(3), 1);
        assert_eq!(Parallelism::Parallel(0).n_threads(), 1);
    }

    #[test]
    fn test_build_pool() {
        assert!(Parallelism::Sequential.build_pool().unwrap().is_none());
        let pool = Parallelism::Parallel(3).build_pool().unwrap().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
    }
}
