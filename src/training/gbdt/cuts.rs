//! Bin boundaries for all features.

use std::ops::Range;

use super::error::SplitError;

/// Feature type as seen by the split search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureType {
    #[default]
    Numerical,
    Categorical,
}

/// Whether feature `f` is categorical. Features without an entry are numerical.
#[inline]
pub fn is_categorical(types: &[FeatureType], feature: u32) -> bool {
    matches!(types.get(feature as usize), Some(FeatureType::Categorical))
}

/// Bin boundaries for all features in CSR layout.
///
/// ```text
/// cut_ptrs:    [0, 3, 5]
/// cut_values:  [0.5, 1.5, 9.0,   2.0, 4.0]
///               └ feature 0 ┘    └ f1 ┘
/// min_values:  [-1.0, 0.0]
/// ```
///
/// Bin `i` of a numerical feature holds values in `[cut_values[i-1], cut_values[i])`,
/// so `cut_values[i]` is the upper bound of bin `i`. The lower bound of the
/// first bin is the feature's minimum value, needed to reconstruct the
/// threshold when a scan runs from the last bin backwards.
///
/// For categorical features each bin is one category and `cut_values[i]`
/// holds the category id.
///
/// Missing values have no bin; their statistics are the difference between
/// a node's total and the sum of the feature's bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cut_ptrs: Vec<u32>,
    cut_values: Vec<f32>,
    min_values: Vec<f32>,
}

impl BinCuts {
    /// Create cuts from raw CSR arrays.
    ///
    /// # Errors
    ///
    /// - [`SplitError::BinIndexOverflow`] if a pointer exceeds `i32::MAX`
    /// - [`SplitError::MalformedCuts`] if the arrays are inconsistent
    pub fn new(
        cut_ptrs: Vec<u32>,
        cut_values: Vec<f32>,
        min_values: Vec<f32>,
    ) -> Result<Self, SplitError> {
        if cut_ptrs.first() != Some(&0) {
            return Err(SplitError::MalformedCuts("cut_ptrs must start at 0".into()));
        }
        for (f, &ptr) in cut_ptrs.iter().enumerate().skip(1) {
            if ptr > i32::MAX as u32 {
                return Err(SplitError::BinIndexOverflow {
                    feature: (f - 1) as u32,
                    index: ptr as usize,
                });
            }
            if ptr < cut_ptrs[f - 1] {
                return Err(SplitError::MalformedCuts(format!(
                    "cut_ptrs decrease at feature {}",
                    f - 1
                )));
            }
        }
        let n_bins = *cut_ptrs.last().unwrap_or(&0) as usize;
        if n_bins != cut_values.len() {
            return Err(SplitError::MalformedCuts(format!(
                "cut_ptrs end at {n_bins} but there are {} cut values",
                cut_values.len()
            )));
        }
        if min_values.len() + 1 != cut_ptrs.len() {
            return Err(SplitError::MalformedCuts(format!(
                "{} min values for {} features",
                min_values.len(),
                cut_ptrs.len() - 1
            )));
        }
        Ok(Self { cut_ptrs, cut_values, min_values })
    }

    /// Create cuts from per-feature boundary lists.
    pub fn from_features(features: &[(Vec<f32>, f32)]) -> Result<Self, SplitError> {
        let mut cut_ptrs = Vec::with_capacity(features.len() + 1);
        let mut cut_values = Vec::new();
        let mut min_values = Vec::with_capacity(features.len());
        cut_ptrs.push(0u32);
        for (values, min) in features {
            cut_values.extend_from_slice(values);
            let end = u32::try_from(cut_values.len()).map_err(|_| SplitError::BinIndexOverflow {
                feature: min_values.len() as u32,
                index: cut_values.len(),
            })?;
            cut_ptrs.push(end);
            min_values.push(*min);
        }
        Self::new(cut_ptrs, cut_values, min_values)
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.cut_ptrs.len() - 1
    }

    /// Total number of bins over all features.
    #[inline]
    pub fn total_bins(&self) -> usize {
        self.cut_values.len()
    }

    /// Global bin range of a feature.
    #[inline]
    pub fn feature_bins(&self, feature: u32) -> Range<usize> {
        let f = feature as usize;
        self.cut_ptrs[f] as usize..self.cut_ptrs[f + 1] as usize
    }

    #[inline]
    pub fn n_bins(&self, feature: u32) -> usize {
        self.feature_bins(feature).len()
    }

    #[inline]
    pub fn ptrs(&self) -> &[u32] {
        &self.cut_ptrs
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.cut_values
    }

    /// Minimum observed value of a feature.
    #[inline]
    pub fn min_value(&self, feature: u32) -> f32 {
        self.min_values[feature as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_features() -> BinCuts {
        BinCuts::from_features(&[(vec![0.5, 1.5, 9.0], -1.0), (vec![2.0, 4.0], 0.0)]).unwrap()
    }

    #[test]
    fn test_layout() {
        let cuts = two_features();
        assert_eq!(cuts.n_features(), 2);
        assert_eq!(cuts.total_bins(), 5);
        assert_eq!(cuts.ptrs(), &[0, 3, 5]);
        assert_eq!(cuts.feature_bins(1), 3..5);
        assert_eq!(cuts.n_bins(0), 3);
        assert_eq!(cuts.min_value(0), -1.0);
        assert_eq!(cuts.values()[3], 2.0);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            BinCuts::new(vec![0, 2, 1], vec![1.0, 2.0], vec![0.0, 0.0]),
            Err(SplitError::MalformedCuts(_))
        ));
        assert!(matches!(
            BinCuts::new(vec![0, 3], vec![1.0, 2.0], vec![0.0]),
            Err(SplitError::MalformedCuts(_))
        ));
        assert!(matches!(
            BinCuts::new(vec![0, 2], vec![1.0, 2.0], vec![]),
            Err(SplitError::MalformedCuts(_))
        ));
        assert!(matches!(
            BinCuts::new(vec![1, 2], vec![1.0, 2.0], vec![0.0]),
            Err(SplitError::MalformedCuts(_))
        ));
    }

    #[test]
    fn test_overflow() {
        let err = BinCuts::new(vec![0, i32::MAX as u32 + 1], vec![], vec![0.0]).unwrap_err();
        assert!(matches!(err, SplitError::BinIndexOverflow { feature: 0, .. }));
    }

    #[test]
    fn test_feature_types() {
        let types = [FeatureType::Numerical, FeatureType::Categorical];
        assert!(!is_categorical(&types, 0));
        assert!(is_categorical(&types, 1));
        assert!(!is_categorical(&types, 7));
        assert!(!is_categorical(&[], 0));
    }
}
