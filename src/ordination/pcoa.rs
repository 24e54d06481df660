//! Principal coordinates analysis (classical multidimensional scaling).
//!
//! 1. Square the distances: `A = D^2`
//! 2. Gower double-centering: `B = -0.5 (A - row_means - col_means + grand_mean)`
//! 3. Symmetric eigendecomposition of `B`, eigenvalues sorted descending
//! 4. Coordinates: `X[i, j] = v[i, j] * sqrt(max(lambda_j, 0))`
//!
//! Negative eigenvalues (non-Euclidean metrics) contribute nothing to the
//! coordinates or to the proportion explained.

use super::{orient_columns, DistanceMatrix, OrdinationResult};
use crate::error::{MetaboError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

/// Run PCoA on a distance matrix, keeping up to `n_axes` axes.
///
/// At most `n - 1` axes are returned for `n` samples.
pub fn pcoa(distances: &DistanceMatrix, n_axes: usize) -> Result<OrdinationResult> {
    let n = distances.n();
    if n < 2 {
        return Err(MetaboError::EmptyData(
            "PCoA requires at least 2 samples".to_string(),
        ));
    }
    if n_axes == 0 {
        return Err(MetaboError::InvalidParameter(
            "PCoA needs at least one axis".to_string(),
        ));
    }
    let k = n_axes.min(n - 1);

    let squared = distances.matrix().map(|d| d * d);
    let row_means: Vec<f64> = (0..n).map(|i| squared.row(i).mean()).collect();
    let grand_mean = row_means.iter().sum::<f64>() / n as f64;
    let centered = DMatrix::from_fn(n, n, |i, j| {
        -0.5 * (squared[(i, j)] - row_means[i] - row_means[j] + grand_mean)
    });

    let eigen = SymmetricEigen::new(centered);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let positive_sum: f64 = eigen.eigenvalues.iter().filter(|&&v| v > 0.0).sum();
    let mut coords = DMatrix::zeros(n, k);
    let mut eigenvalues = Vec::with_capacity(k);
    let mut proportion_explained = Vec::with_capacity(k);
    for (axis, &col) in order.iter().take(k).enumerate() {
        let value = eigen.eigenvalues[col];
        let scale = value.max(0.0).sqrt();
        coords.set_column(axis, &(eigen.eigenvectors.column(col) * scale));
        eigenvalues.push(value);
        proportion_explained.push(if positive_sum > 0.0 {
            value.max(0.0) / positive_sum
        } else {
            0.0
        });
    }
    orient_columns(&mut coords);

    if eigen.eigenvalues.iter().any(|&v| v < -1e-8 * positive_sum.max(1.0)) {
        log::debug!("PCoA: negative eigenvalues present ({} distance is non-Euclidean)", distances.metric());
    }

    Ok(OrdinationResult {
        method: "PCoA".to_string(),
        axis_names: (1..=k).map(|i| format!("PC{}", i)).collect(),
        sample_ids: distances.ids().to_vec(),
        coordinates: (0..n).map(|i| coords.row(i).iter().copied().collect()).collect(),
        eigenvalues,
        proportion_explained,
    })
}
