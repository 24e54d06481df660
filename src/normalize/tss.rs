//! Column-wise (sample-centric) total sum normalization.
//!
//! Each intensity is divided by the total intensity of its sample, so every
//! sample sums to one.

use crate::data::FeatureTable;
use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Divide every value by its column (sample) sum.
///
/// Samples summing to zero produce `NaN`/`inf` values which are passed on
/// unchanged. Missing values make the whole sample sum `NaN`.
pub fn normalize_column_wise(table: &FeatureTable) -> Result<FeatureTable> {
    let n_features = table.n_features();
    let n_samples = table.n_samples();

    if table.is_empty() {
        return Err(MetaboError::EmptyData(
            "Cannot normalize an empty feature table".to_string(),
        ));
    }

    let normalized_cols: Vec<Vec<f64>> = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            let column = table.col(j);
            let total: f64 = column.iter().sum();
            column.into_iter().map(|v| v / total).collect()
        })
        .collect();

    let zero_sum = normalized_cols
        .iter()
        .filter(|c| c.iter().any(|v| !v.is_finite()))
        .count();
    if zero_sum > 0 {
        log::warn!("{} samples have undefined values after normalization", zero_sum);
    }

    let data = DMatrix::from_fn(n_features, n_samples, |i, j| normalized_cols[j][i]);
    FeatureTable::new(data, table.feature_ids().to_vec(), table.sample_ids().to_vec())
}
