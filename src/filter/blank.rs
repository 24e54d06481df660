//! Blank-based removal of background features.

use crate::data::FeatureTable;
use crate::error::{MetaboError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default blank/sample ratio cutoff.
pub const DEFAULT_BLANK_CUTOFF: f64 = 0.3;

/// Result of blank removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlankFilterResult {
    /// Sample table restricted to real features.
    #[serde(skip)]
    pub table: FeatureTable,
    /// Features removed as background or noise.
    pub n_background_features: usize,
    /// Features retained as real.
    pub n_real_features: usize,
    /// Blank/sample ratio per input feature (`NaN` if undefined).
    pub ratios: Vec<f64>,
    /// Cutoff the ratios were compared against.
    pub cutoff: f64,
}

impl std::fmt::Display for BlankFilterResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Blank removal (cutoff {:.2})", self.cutoff)?;
        writeln!(f, "  Background or noise features: {}", self.n_background_features)?;
        writeln!(f, "  Real features:                {}", self.n_real_features)?;
        Ok(())
    }
}

/// Plain mean that propagates `NaN` from any cell.
fn mean_with_missing(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Ratio of blank to sample intensity for one feature.
///
/// `(blank_mean + 1) / (sample_mean + 1)`. A missing value anywhere makes the
/// ratio `NaN`.
pub fn blank_ratio(blank_row: &[f64], sample_row: &[f64]) -> f64 {
    let blank_mean = mean_with_missing(blank_row.iter().copied());
    let sample_mean = mean_with_missing(sample_row.iter().copied());
    (blank_mean + 1.0) / (sample_mean + 1.0)
}

/// Remove features whose blank intensity is high relative to the samples.
///
/// A feature is kept iff its [`blank_ratio`] is below `cutoff`. Features with
/// a `NaN` ratio are never kept. Both tables must list the same features in
/// the same order.
///
/// # Arguments
/// * `blanks` - Intensities of the blank samples
/// * `samples` - Intensities of the analysed samples
/// * `cutoff` - Ratio threshold in (0, 1]
pub fn remove_blank_features(
    blanks: &FeatureTable,
    samples: &FeatureTable,
    cutoff: f64,
) -> Result<BlankFilterResult> {
    if !(cutoff > 0.0 && cutoff <= 1.0) {
        return Err(MetaboError::InvalidParameter(format!(
            "Blank cutoff must be in (0, 1], got {}",
            cutoff
        )));
    }
    if blanks.n_features() != samples.n_features() {
        return Err(MetaboError::DimensionMismatch {
            expected: samples.n_features(),
            actual: blanks.n_features(),
        });
    }
    if blanks.feature_ids() != samples.feature_ids() {
        return Err(MetaboError::SampleMismatch(
            "Blank and sample tables have different feature ids".to_string(),
        ));
    }
    if blanks.n_samples() == 0 || samples.n_samples() == 0 {
        return Err(MetaboError::EmptyData(
            "Blank removal needs at least one blank and one sample".to_string(),
        ));
    }

    let ratios: Vec<f64> = (0..samples.n_features())
        .into_par_iter()
        .map(|i| blank_ratio(&blanks.row(i), &samples.row(i)))
        .collect();

    let keep: Vec<usize> = ratios
        .iter()
        .enumerate()
        .filter(|(_, &r)| r < cutoff)
        .map(|(i, _)| i)
        .collect();

    let n_real_features = keep.len();
    let n_background_features = samples.n_features() - n_real_features;
    log::info!(
        "Blank removal: {} real, {} background features (cutoff {})",
        n_real_features,
        n_background_features,
        cutoff
    );

    Ok(BlankFilterResult {
        table: samples.subset_features(&keep)?,
        n_background_features,
        n_real_features,
        ratios,
        cutoff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(rows: &[Vec<f64>], prefix: &str) -> FeatureTable {
        let n = rows.first().map(|r| r.len()).unwrap_or(0);
        FeatureTable::from_rows(
            rows,
            (0..rows.len()).map(|i| format!("m{}", i)).collect(),
            (0..n).map(|j| format!("{}{}", prefix, j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_feature_retained() {
        let blanks = table(&[vec![100.0, 120.0]], "b");
        let samples = table(&[vec![1000.0, 1100.0]], "s");

        let result = remove_blank_features(&blanks, &samples, 0.3).unwrap();
        assert_relative_eq!(result.ratios[0], 111.0 / 1051.0, epsilon = 1e-12);
        assert_relative_eq!(result.ratios[0], 0.1057, epsilon = 1e-4);
        assert_eq!(result.n_real_features, 1);
        assert_eq!(result.n_background_features, 0);
        assert_eq!(result.table.row(0), vec![1000.0, 1100.0]);
    }

    #[test]
    fn test_background_removed() {
        let blanks = table(&[vec![100.0, 120.0], vec![500.0, 500.0]], "b");
        let samples = table(&[vec![1000.0, 1100.0], vec![600.0, 400.0]], "s");

        let result = remove_blank_features(&blanks, &samples, 0.3).unwrap();
        assert_eq!(result.n_real_features, 1);
        assert_eq!(result.n_background_features, 1);
        assert_eq!(result.table.feature_ids(), &["m0"]);
    }

    #[test]
    fn test_missing_value_discards_feature() {
        let blanks = table(&[vec![f64::NAN, 1.0]], "b");
        let samples = table(&[vec![1000.0, 1100.0]], "s");

        let result = remove_blank_features(&blanks, &samples, 1.0).unwrap();
        assert!(result.ratios[0].is_nan());
        assert_eq!(result.n_real_features, 0);
        assert!(result.table.is_empty());
    }

    #[test]
    fn test_monotonic_in_cutoff() {
        let blanks = table(&[vec![10.0], vec![50.0], vec![200.0], vec![5.0]], "b");
        let samples = table(&[vec![100.0], vec![100.0], vec![300.0], vec![1000.0]], "s");

        let mut previous = 0;
        for cutoff in [0.1, 0.2, 0.4, 0.6, 0.8, 1.0] {
            let n = remove_blank_features(&blanks, &samples, cutoff)
                .unwrap()
                .n_real_features;
            assert!(n >= previous);
            previous = n;
        }
    }

    #[test]
    fn test_invalid_cutoff() {
        let blanks = table(&[vec![1.0]], "b");
        let samples = table(&[vec![1.0]], "s");
        assert!(remove_blank_features(&blanks, &samples, 0.0).is_err());
        assert!(remove_blank_features(&blanks, &samples, 1.5).is_err());
        assert!(remove_blank_features(&blanks, &samples, f64::NAN).is_err());
    }

    #[test]
    fn test_feature_mismatch() {
        let blanks = table(&[vec![1.0], vec![2.0]], "b");
        let samples = table(&[vec![1.0]], "s");
        assert!(matches!(
            remove_blank_features(&blanks, &samples, 0.3),
            Err(MetaboError::DimensionMismatch { .. })
        ));
    }
}
