//! Missing-value and intensity-distribution profiles of a feature table.

use crate::data::FeatureTable;
use serde::{Deserialize, Serialize};

/// Cells at or below the limit of detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingProfile {
    pub cutoff_lod: f64,
    pub total_cells: usize,
    /// Cells `<= cutoff_lod`.
    pub missing_cells: usize,
    /// `missing_cells / total_cells`.
    pub missing_fraction: f64,
    /// Missing count per feature, in feature order.
    pub per_feature: Vec<usize>,
}

impl MissingProfile {
    /// Number of features with exactly `k` missing values, for `k` in `0..=n_samples`.
    pub fn histogram(&self, n_samples: usize) -> Vec<usize> {
        let mut counts = vec![0; n_samples + 1];
        for &m in &self.per_feature {
            if m <= n_samples {
                counts[m] += 1;
            }
        }
        counts
    }
}

impl std::fmt::Display for MissingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Missing values (<= LOD {})", self.cutoff_lod)?;
        writeln!(f, "  Cells:   {}", self.total_cells)?;
        writeln!(f, "  Missing: {} ({:.2}%)", self.missing_cells, self.missing_fraction * 100.0)?;
        Ok(())
    }
}

/// Count cells at or below `cutoff_lod`, overall and per feature.
///
/// `NaN` cells never compare below the cutoff and are not counted.
pub fn profile_missing(table: &FeatureTable, cutoff_lod: f64) -> MissingProfile {
    let per_feature: Vec<usize> = (0..table.n_features())
        .map(|i| table.row(i).iter().filter(|&&v| v <= cutoff_lod).count())
        .collect();
    let total_cells = table.n_features() * table.n_samples();
    let missing_cells: usize = per_feature.iter().sum();

    MissingProfile {
        cutoff_lod,
        total_cells,
        missing_cells,
        missing_fraction: if total_cells > 0 {
            missing_cells as f64 / total_cells as f64
        } else {
            0.0
        },
        per_feature,
    }
}

/// Intensities falling in `(lower, upper]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntensityBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

impl IntensityBin {
    /// `ln(count + 1)`, the scale the frequency plot uses.
    pub fn log_frequency(&self) -> f64 {
        (self.count as f64 + 1.0).ln()
    }
}

/// Histogram of intensities over decade bins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntensityFrequency {
    pub bins: Vec<IntensityBin>,
    /// Values `<= -1`.
    pub below_range: usize,
    /// Values above the last edge.
    pub above_range: usize,
}

/// Bin edges: -1, 0, 1, 10, 1e2, ..., 1e10.
pub fn intensity_bin_edges() -> Vec<f64> {
    let mut edges = vec![-1.0, 0.0, 1.0];
    edges.extend((1..=10).map(|e| 10f64.powi(e)));
    edges
}

/// Count intensities per bin, right-inclusive: bin `i` holds
/// `edges[i] < v <= edges[i + 1]`. Missing values are skipped.
pub fn intensity_frequency(table: &FeatureTable) -> IntensityFrequency {
    let edges = intensity_bin_edges();
    let mut counts = vec![0usize; edges.len() - 1];
    let (mut below_range, mut above_range) = (0, 0);

    for v in table.values().filter(|v| !v.is_nan()) {
        // First edge >= v
        let idx = edges.partition_point(|&e| e < v);
        if idx == 0 {
            below_range += 1;
        } else if idx == edges.len() {
            above_range += 1;
        } else {
            counts[idx - 1] += 1;
        }
    }

    IntensityFrequency {
        bins: edges
            .windows(2)
            .zip(counts)
            .map(|(w, count)| IntensityBin {
                lower: w[0],
                upper: w[1],
                count,
            })
            .collect(),
        below_range,
        above_range,
    }
}
