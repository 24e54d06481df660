//! Coverage filtering, standardization and merge with metadata.

use crate::data::{AnalysisFrame, FeatureTable, Metadata, ScaledTable};
use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Features missing in more than this fraction of samples are dropped.
pub const MAX_MISSING_FRACTION: f64 = 0.5;

/// Output of [`scale_and_merge`].
#[derive(Debug, Clone)]
pub struct ScaleResult {
    /// Standardized table, samples sorted by id.
    pub scaled: ScaledTable,
    /// Scaled table joined with metadata.
    pub frame: AnalysisFrame,
    /// Summary of what was removed.
    pub summary: ScaleSummary,
}

/// Features removed while scaling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleSummary {
    /// Features with more than half of their values at or below the LOD.
    pub dropped_features: Vec<String>,
    /// Features with zero variance after filtering.
    pub constant_features: Vec<String>,
    /// Samples missing from the metadata.
    pub unmatched_samples: Vec<String>,
}

/// Fraction of values that are missing or at/below the limit of detection.
pub fn missing_fraction(values: &[f64], cutoff_lod: f64) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let missing = values.iter().filter(|v| v.is_nan() || **v <= cutoff_lod).count();
    missing as f64 / values.len() as f64
}

/// Center to mean 0 and scale to unit population variance (ddof = 0).
///
/// `NaN` values are ignored when fitting and kept as `NaN`. Returns `None`
/// for constant features.
pub fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    if !(sd > 1e-12) {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / sd).collect())
}

/// Prepare a feature table for statistical analysis.
///
/// 1. Restrict metadata to the table's samples and sort both by sample id.
///    Samples without metadata are logged and left out.
/// 2. Drop features with more than 50% of values at or below `cutoff_lod`
///    (missing values count as below).
/// 3. Standardize each remaining feature; constant features are dropped.
/// 4. Join the scaled table with the metadata.
pub fn scale_and_merge(
    features: &FeatureTable,
    metadata: &Metadata,
    cutoff_lod: f64,
) -> Result<ScaleResult> {
    scale_and_merge_with_coverage(features, features, metadata, cutoff_lod)
}

/// Like [`scale_and_merge`], but decide coverage on a separate table.
///
/// `coverage` holds the intensities `cutoff_lod` was derived from, e.g. the
/// table before column-wise normalization. It must have the same features,
/// in the same order, and every sample of `features`.
pub fn scale_and_merge_with_coverage(
    features: &FeatureTable,
    coverage: &FeatureTable,
    metadata: &Metadata,
    cutoff_lod: f64,
) -> Result<ScaleResult> {
    if features.is_empty() {
        return Err(MetaboError::EmptyData(
            "Cannot scale an empty feature table".to_string(),
        ));
    }

    // Sample ids sorted, split by metadata presence
    let mut ft_ids: Vec<String> = features.sample_ids().to_vec();
    ft_ids.sort();
    let (matched, unmatched): (Vec<String>, Vec<String>) =
        ft_ids.into_iter().partition(|sid| metadata.has_sample(sid));
    if !unmatched.is_empty() {
        log::warn!(
            "Sample names in feature table and metadata differ, {} samples without metadata: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }
    if matched.is_empty() {
        return Err(MetaboError::SampleMismatch(
            "No feature table sample has a metadata row".to_string(),
        ));
    }
    let table = features.select_samples(&matched)?;
    let coverage = coverage.select_samples(&matched)?;
    if coverage.feature_ids() != table.feature_ids() {
        return Err(MetaboError::InvalidParameter(
            "Coverage table features differ from the table being scaled".to_string(),
        ));
    }

    // Coverage filter and standardization, one feature at a time
    let outcomes: Vec<FeatureOutcome> = (0..table.n_features())
        .into_par_iter()
        .map(|i| {
            if missing_fraction(&coverage.row(i), cutoff_lod) > MAX_MISSING_FRACTION {
                return FeatureOutcome::LowCoverage;
            }
            match standardize(&table.row(i)) {
                Some(scaled) => FeatureOutcome::Kept(scaled),
                None => FeatureOutcome::Constant,
            }
        })
        .collect();

    let mut summary = ScaleSummary {
        unmatched_samples: unmatched,
        ..Default::default()
    };
    let mut kept_ids = Vec::new();
    let mut kept_cols = Vec::new();
    for (id, outcome) in table.feature_ids().iter().zip(outcomes) {
        match outcome {
            FeatureOutcome::Kept(col) => {
                kept_ids.push(id.clone());
                kept_cols.push(col);
            }
            FeatureOutcome::LowCoverage => summary.dropped_features.push(id.clone()),
            FeatureOutcome::Constant => summary.constant_features.push(id.clone()),
        }
    }

    if kept_ids.is_empty() {
        return Err(MetaboError::EmptyData(format!(
            "All {} features were removed during scaling",
            table.n_features()
        )));
    }
    log::info!(
        "Scaled {} features over {} samples ({} low coverage, {} constant removed)",
        kept_ids.len(),
        table.n_samples(),
        summary.dropped_features.len(),
        summary.constant_features.len()
    );

    let data = DMatrix::from_fn(table.n_samples(), kept_ids.len(), |s, f| kept_cols[f][s]);
    let scaled = ScaledTable::new(data, table.sample_ids().to_vec(), kept_ids)?;
    let frame = AnalysisFrame::join(scaled.clone(), metadata)?;

    Ok(ScaleResult {
        scaled,
        frame,
        summary,
    })
}

enum FeatureOutcome {
    Kept(Vec<f64>),
    LowCoverage,
    Constant,
}
