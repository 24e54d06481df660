//! Pairwise sample distances.
//!
//! Metric definitions follow SciPy's `pdist`. Boolean metrics (`jaccard`,
//! `matching`) treat any non-zero value as present.

use crate::data::ScaledTable;
use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Distance metric between two observation vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Canberra,
    Chebyshev,
    Correlation,
    Cosine,
    #[default]
    Euclidean,
    Hamming,
    Jaccard,
    Matching,
    /// Minkowski with `p = 2`.
    Minkowski,
    /// Euclidean scaled by each coordinate's sample variance.
    SEuclidean,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 10] = [
        DistanceMetric::Canberra,
        DistanceMetric::Chebyshev,
        DistanceMetric::Correlation,
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::Hamming,
        DistanceMetric::Jaccard,
        DistanceMetric::Matching,
        DistanceMetric::Minkowski,
        DistanceMetric::SEuclidean,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Canberra => "canberra",
            DistanceMetric::Chebyshev => "chebyshev",
            DistanceMetric::Correlation => "correlation",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Hamming => "hamming",
            DistanceMetric::Jaccard => "jaccard",
            DistanceMetric::Matching => "matching",
            DistanceMetric::Minkowski => "minkowski",
            DistanceMetric::SEuclidean => "seuclidean",
        }
    }

    /// Distance between `u` and `v`.
    ///
    /// `variances` is only read by [`DistanceMetric::SEuclidean`] and must
    /// then have one entry per coordinate.
    pub fn between(&self, u: &[f64], v: &[f64], variances: &[f64]) -> f64 {
        let pairs = u.iter().zip(v);
        match self {
            DistanceMetric::Canberra => pairs
                .map(|(a, b)| {
                    let denom = a.abs() + b.abs();
                    if denom > 0.0 {
                        (a - b).abs() / denom
                    } else {
                        0.0
                    }
                })
                .sum(),
            DistanceMetric::Chebyshev => pairs.map(|(a, b)| (a - b).abs()).fold(0.0, f64::max),
            DistanceMetric::Correlation => {
                let mu = u.iter().sum::<f64>() / u.len() as f64;
                let mv = v.iter().sum::<f64>() / v.len() as f64;
                cosine_distance(
                    &u.iter().map(|a| a - mu).collect::<Vec<_>>(),
                    &v.iter().map(|b| b - mv).collect::<Vec<_>>(),
                )
            }
            DistanceMetric::Cosine => cosine_distance(u, v),
            DistanceMetric::Euclidean | DistanceMetric::Minkowski => {
                pairs.map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt()
            }
            DistanceMetric::Hamming => {
                pairs.filter(|(a, b)| a != b).count() as f64 / u.len() as f64
            }
            DistanceMetric::Jaccard => {
                let (unequal, nonzero) = pairs.fold((0usize, 0usize), |(ue, nz), (a, b)| {
                    if *a != 0.0 || *b != 0.0 {
                        (ue + usize::from(a != b), nz + 1)
                    } else {
                        (ue, nz)
                    }
                });
                if nonzero == 0 {
                    0.0
                } else {
                    unequal as f64 / nonzero as f64
                }
            }
            DistanceMetric::Matching => {
                pairs.filter(|(a, b)| (**a != 0.0) != (**b != 0.0)).count() as f64
                    / u.len() as f64
            }
            DistanceMetric::SEuclidean => pairs
                .zip(variances)
                .map(|((a, b), var)| (a - b).powi(2) / var)
                .sum::<f64>()
                .sqrt(),
        }
    }
}

fn cosine_distance(u: &[f64], v: &[f64]) -> f64 {
    let dot: f64 = u.iter().zip(v).map(|(a, b)| a * b).sum();
    let nu = u.iter().map(|a| a * a).sum::<f64>().sqrt();
    let nv = v.iter().map(|b| b * b).sum::<f64>().sqrt();
    // Rounding can push the distance slightly outside [0, 2]
    (1.0 - dot / (nu * nv)).clamp(0.0, 2.0)
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = MetaboError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        DistanceMetric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == lower)
            .ok_or_else(|| {
                MetaboError::InvalidParameter(format!(
                    "Unknown distance metric '{}'. Expected one of: {}",
                    s,
                    DistanceMetric::ALL.map(|m| m.name()).join(", ")
                ))
            })
    }
}

/// Symmetric matrix of pairwise distances between labelled observations.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    data: DMatrix<f64>,
    ids: Vec<String>,
    metric: DistanceMetric,
}

impl DistanceMatrix {
    /// Wrap a precomputed distance matrix.
    ///
    /// The matrix must be square, symmetric and hollow.
    pub fn new(data: DMatrix<f64>, ids: Vec<String>, metric: DistanceMetric) -> Result<Self> {
        if !data.is_square() {
            return Err(MetaboError::DimensionMismatch {
                expected: data.nrows(),
                actual: data.ncols(),
            });
        }
        if data.nrows() != ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: data.nrows(),
                actual: ids.len(),
            });
        }
        let n = ids.len();
        for i in 0..n {
            if data[(i, i)] != 0.0 {
                return Err(MetaboError::InvalidParameter(format!(
                    "Distance of '{}' to itself is {}, expected 0",
                    ids[i],
                    data[(i, i)]
                )));
            }
            for j in (i + 1)..n {
                if (data[(i, j)] - data[(j, i)]).abs() > 1e-10 {
                    return Err(MetaboError::InvalidParameter(format!(
                        "Distance matrix is not symmetric at ('{}', '{}')",
                        ids[i], ids[j]
                    )));
                }
            }
        }
        Ok(Self { data, ids, metric })
    }

    /// Distances between the rows of `observations`.
    ///
    /// # Errors
    /// `Numerical` if any value is missing or a distance is undefined.
    pub fn from_rows(
        observations: &DMatrix<f64>,
        ids: Vec<String>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let n = observations.nrows();
        if n != ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: n,
                actual: ids.len(),
            });
        }
        if observations.iter().any(|v| !v.is_finite()) {
            return Err(MetaboError::Numerical(format!(
                "Cannot compute {} distances on a matrix with missing values",
                metric
            )));
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| observations.row(i).iter().copied().collect())
            .collect();
        let variances: Vec<f64> = match metric {
            DistanceMetric::SEuclidean => (0..observations.ncols())
                .map(|j| column_variance(&observations.column(j).iter().copied().collect::<Vec<_>>()))
                .collect(),
            _ => Vec::new(),
        };

        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| metric.between(&rows[i], &rows[j], &variances))
                    .collect()
            })
            .collect();

        let mut data = DMatrix::zeros(n, n);
        for (i, row) in upper.iter().enumerate() {
            for (offset, &d) in row.iter().enumerate() {
                let j = i + 1 + offset;
                data[(i, j)] = d;
                data[(j, i)] = d;
            }
        }
        if data.iter().any(|v| v.is_nan()) {
            return Err(MetaboError::Numerical(format!(
                "{} distance is undefined for some pairs (zero vector or constant coordinate)",
                metric
            )));
        }
        log::debug!("Computed {} distances between {} observations", metric, n);

        Self::new(data, ids, metric)
    }

    pub fn n(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    /// Upper triangle in row-major order, as SciPy's condensed form.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.n();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.data[(i, j)]);
            }
        }
        out
    }

    /// Keep only the given observations, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n()) {
            return Err(MetaboError::InvalidParameter(format!(
                "Observation index {} out of bounds",
                bad
            )));
        }
        let data = self.data.select_rows(indices).select_columns(indices);
        let ids = indices.iter().map(|&i| self.ids[i].clone()).collect();
        Self::new(data, ids, self.metric)
    }

    /// Write the square matrix as TSV with ids on both axes.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "\t{}", self.ids.join("\t"))?;
        for (i, id) in self.ids.iter().enumerate() {
            let row: Vec<String> = self.data.row(i).iter().map(|d| format!("{:.6}", d)).collect();
            writeln!(writer, "{}\t{}", id, row.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn column_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Distances between the samples (rows) of a scaled table.
pub fn pairwise_distances(scaled: &ScaledTable, metric: DistanceMetric) -> Result<DistanceMatrix> {
    if scaled.n_samples() < 2 {
        return Err(MetaboError::EmptyData(
            "At least two samples are needed for a distance matrix".to_string(),
        ));
    }
    DistanceMatrix::from_rows(scaled.matrix(), scaled.sample_ids().to_vec(), metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const U: [f64; 3] = [1.0, 0.0, 2.0];
    const V: [f64; 3] = [2.0, 0.0, -1.0];

    #[test]
    fn test_metric_values() {
        assert_relative_eq!(DistanceMetric::Euclidean.between(&U, &V, &[]), 10.0_f64.sqrt());
        assert_relative_eq!(DistanceMetric::Minkowski.between(&U, &V, &[]), 10.0_f64.sqrt());
        assert_relative_eq!(DistanceMetric::Chebyshev.between(&U, &V, &[]), 3.0);
        // 1/3 + 0 (0/0 skipped) + 3/3
        assert_relative_eq!(DistanceMetric::Canberra.between(&U, &V, &[]), 4.0 / 3.0, epsilon = 1e-12);
        // dot 0 -> cosine distance 1
        assert_relative_eq!(DistanceMetric::Cosine.between(&U, &V, &[]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(DistanceMetric::Hamming.between(&U, &V, &[]), 2.0 / 3.0);
        // nonzero in positions 0 and 2, both unequal
        assert_relative_eq!(DistanceMetric::Jaccard.between(&U, &V, &[]), 1.0);
        // presence identical everywhere
        assert_relative_eq!(DistanceMetric::Matching.between(&U, &V, &[]), 0.0);
        assert_relative_eq!(
            DistanceMetric::SEuclidean.between(&U, &V, &[1.0, 1.0, 9.0]),
            2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_correlation_distance() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        let c = [3.0, 2.0, 1.0];
        assert_relative_eq!(DistanceMetric::Correlation.between(&a, &b, &[]), 0.0, epsilon = 1e-12);
        assert_relative_eq!(DistanceMetric::Correlation.between(&a, &c, &[]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("seuclidean".parse::<DistanceMetric>().unwrap(), DistanceMetric::SEuclidean);
        assert_eq!(" Canberra ".parse::<DistanceMetric>().unwrap(), DistanceMetric::Canberra);
        assert!("braycurtis".parse::<DistanceMetric>().is_err());
        for m in DistanceMetric::ALL {
            assert_eq!(m.name().parse::<DistanceMetric>().unwrap(), m);
        }
    }

    #[test]
    fn test_from_rows_symmetric() {
        let obs = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 3.0, 4.0, 6.0, 8.0]);
        let dm = DistanceMatrix::from_rows(
            &obs,
            vec!["a".into(), "b".into(), "c".into()],
            DistanceMetric::Euclidean,
        )
        .unwrap();
        assert_eq!(dm.n(), 3);
        assert_relative_eq!(dm.get(0, 1), 5.0);
        assert_relative_eq!(dm.get(2, 0), 10.0);
        assert_eq!(dm.condensed(), vec![5.0, 10.0, 5.0]);

        let sub = dm.subset(&[2, 0]).unwrap();
        assert_eq!(sub.ids(), &["c", "a"]);
        assert_relative_eq!(sub.get(0, 1), 10.0);
    }

    #[test]
    fn test_seuclidean_uses_column_variance() {
        // column variances 1 and 4: sqrt(2/1 + 8/4)
        let obs = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 2.0_f64.sqrt(), 2.0 * 2.0_f64.sqrt()]);
        let dm = DistanceMatrix::from_rows(&obs, vec!["a".into(), "b".into()], DistanceMetric::SEuclidean)
            .unwrap();
        assert_relative_eq!(dm.get(0, 1), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_values_rejected() {
        let obs = DMatrix::from_row_slice(2, 2, &[0.0, f64::NAN, 1.0, 1.0]);
        assert!(DistanceMatrix::from_rows(&obs, vec!["a".into(), "b".into()], DistanceMetric::Euclidean)
            .is_err());
    }

    #[test]
    fn test_new_rejects_asymmetric() {
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 2.0, 0.0]);
        assert!(DistanceMatrix::new(data, vec!["a".into(), "b".into()], DistanceMetric::Euclidean).is_err());
    }
}
