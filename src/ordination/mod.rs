//! Multivariate analysis of the scaled table.
//!
//! - [`pca`]: principal components of the standardized intensities
//! - [`distance`]: pairwise sample distances
//! - [`permanova`]: permutation test of group separation on a distance matrix
//! - [`pcoa`]: principal coordinates of a distance matrix

pub mod distance;
pub mod pca;
pub mod pcoa;
pub mod permanova;

pub use distance::{pairwise_distances, DistanceMatrix, DistanceMetric};
pub use pca::pca;
pub use pcoa::pcoa;
pub use permanova::{
    permanova, permanova_pcoa, PermanovaConfig, PermanovaPcoa, PermanovaResult,
};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sample coordinates on the leading axes of an ordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationResult {
    /// "PCA" or "PCoA".
    pub method: String,
    /// Axis labels (`PC1`, `PC2`, ...).
    pub axis_names: Vec<String>,
    pub sample_ids: Vec<String>,
    /// Coordinates `[sample][axis]`.
    pub coordinates: Vec<Vec<f64>>,
    /// Variance captured by each axis, descending.
    pub eigenvalues: Vec<f64>,
    /// Fraction of total variance explained by each axis.
    pub proportion_explained: Vec<f64>,
}

impl OrdinationResult {
    pub fn n_axes(&self) -> usize {
        self.axis_names.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Coordinates of one sample.
    pub fn sample(&self, sample_id: &str) -> Option<&[f64]> {
        self.sample_ids
            .iter()
            .position(|s| s == sample_id)
            .map(|i| self.coordinates[i].as_slice())
    }

    /// All sample coordinates on axis `j`.
    pub fn axis(&self, j: usize) -> Vec<f64> {
        self.coordinates.iter().map(|c| c[j]).collect()
    }

    /// Write the coordinate table, one row per sample.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "sample\t{}", self.axis_names.join("\t"))?;
        for (id, coords) in self.sample_ids.iter().zip(&self.coordinates) {
            let values: Vec<String> = coords.iter().map(|c| format!("{:.6}", c)).collect();
            writeln!(writer, "{}\t{}", id, values.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write explained variance per axis.
    pub fn variance_to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "axis\teigenvalue\tproportion_explained")?;
        for ((axis, ev), prop) in self
            .axis_names
            .iter()
            .zip(&self.eigenvalues)
            .zip(&self.proportion_explained)
        {
            writeln!(writer, "{}\t{:.6}\t{:.6}", axis, ev, prop)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for OrdinationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} of {} samples", self.method, self.n_samples())?;
        for (axis, prop) in self.axis_names.iter().zip(&self.proportion_explained) {
            writeln!(f, "  {}: {:.1}%", axis, prop * 100.0)?;
        }
        Ok(())
    }
}

/// Flip each column so its largest-magnitude entry is positive.
///
/// Eigenvector signs are arbitrary; this makes coordinates reproducible.
pub(crate) fn orient_columns(vectors: &mut nalgebra::DMatrix<f64>) {
    for mut col in vectors.column_iter_mut() {
        let pivot = col
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            for v in col.iter_mut() {
                *v = -*v;
            }
        }
    }
}
