//! Principal component analysis of the scaled table.

use super::{orient_columns, OrdinationResult};
use crate::data::ScaledTable;
use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;

/// Project samples onto the leading principal components.
///
/// Features are mean-centered and the centered matrix is decomposed by
/// SVD. Scores are `U * S`, explained variance is `S^2 / (n - 1)` and the
/// proportion is relative to the variance of all components.
///
/// # Arguments
/// * `scaled` - Standardized intensities (samples × features)
/// * `n_components` - Number of components, `2 <= n <= min(samples, features)`
///
/// # Errors
/// `InvalidParameter` for an out-of-range component count, `Numerical` when
/// the table has missing values or the decomposition fails.
pub fn pca(scaled: &ScaledTable, n_components: usize) -> Result<OrdinationResult> {
    let (n, p) = (scaled.n_samples(), scaled.n_features());
    let max_components = n.min(p);
    if n_components < 2 || n_components > max_components {
        return Err(MetaboError::InvalidParameter(format!(
            "Number of components must be between 2 and {} (samples: {}, features: {}), got {}",
            max_components, n, p, n_components
        )));
    }
    if scaled.matrix().iter().any(|v| !v.is_finite()) {
        return Err(MetaboError::Numerical(
            "PCA requires a complete matrix without missing values".to_string(),
        ));
    }

    let mut centered: DMatrix<f64> = scaled.matrix().clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }

    let svd = centered.svd(true, false);
    let u = svd
        .u
        .ok_or_else(|| MetaboError::Numerical("SVD did not produce left singular vectors".to_string()))?;
    let singular = svd.singular_values;

    let mut order: Vec<usize> = (0..singular.len()).collect();
    order.sort_by(|&a, &b| singular[b].total_cmp(&singular[a]));

    let total: f64 = singular.iter().map(|s| s * s).sum();
    let mut scores = DMatrix::zeros(n, n_components);
    let mut eigenvalues = Vec::with_capacity(n_components);
    let mut proportion_explained = Vec::with_capacity(n_components);
    for (axis, &k) in order.iter().take(n_components).enumerate() {
        let s = singular[k];
        scores.set_column(axis, &(u.column(k) * s));
        eigenvalues.push(s * s / (n as f64 - 1.0));
        proportion_explained.push(if total > 0.0 { s * s / total } else { 0.0 });
    }
    orient_columns(&mut scores);

    log::info!(
        "PCA: {} components explain {:.1}% of variance",
        n_components,
        proportion_explained.iter().sum::<f64>() * 100.0
    );

    Ok(OrdinationResult {
        method: "PCA".to_string(),
        axis_names: (1..=n_components).map(|i| format!("PC{}", i)).collect(),
        sample_ids: scaled.sample_ids().to_vec(),
        coordinates: (0..n)
            .map(|i| scores.row(i).iter().copied().collect())
            .collect(),
        eigenvalues,
        proportion_explained,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(rows: usize, cols: usize, values: &[f64]) -> ScaledTable {
        ScaledTable::new(
            DMatrix::from_row_slice(rows, cols, values),
            (1..=rows).map(|i| format!("s{}", i)).collect(),
            (1..=cols).map(|j| format!("m{}", j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_points_on_a_line() {
        let scaled = table(4, 2, &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 5.0, 5.0]);
        let result = pca(&scaled, 2).unwrap();

        assert_eq!(result.axis_names, vec!["PC1", "PC2"]);
        assert_relative_eq!(result.proportion_explained[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.proportion_explained[1], 0.0, epsilon = 1e-10);

        let sqrt2 = 2.0_f64.sqrt();
        let expected = [-2.0 * sqrt2, -sqrt2, 0.0, 3.0 * sqrt2];
        for (got, want) in result.axis(0).iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-10);
        }
        // centered SS = 2 * (4 + 1 + 0 + 9) = 28
        assert_relative_eq!(result.eigenvalues[0], 28.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_proportions_bounded() {
        let scaled = table(
            4,
            3,
            &[1.0, 0.5, -1.0, -0.3, 1.2, 0.4, 0.7, -1.1, 0.2, -1.4, -0.6, 0.4],
        );
        let result = pca(&scaled, 3).unwrap();
        let total: f64 = result.proportion_explained.iter().sum();
        assert!(total <= 1.0 + 1e-12);
        assert!(result.proportion_explained[0] >= result.proportion_explained[1]);
        assert_eq!(result.coordinates.len(), 4);
        assert!(result.sample("s3").is_some());
    }

    #[test]
    fn test_component_bounds() {
        let scaled = table(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 7.0]);
        assert!(pca(&scaled, 1).is_err());
        assert!(pca(&scaled, 3).is_err());
        assert!(pca(&scaled, 2).is_ok());
    }

    #[test]
    fn test_missing_values_rejected() {
        let scaled = table(3, 2, &[1.0, f64::NAN, 3.0, 4.0, 5.0, 7.0]);
        assert!(pca(&scaled, 2).is_err());
    }
}
