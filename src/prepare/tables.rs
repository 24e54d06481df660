//! Cleaning and alignment of the raw feature table and metadata.

use crate::data::{FeatureTable, Metadata, Variable};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Token every sample-file column name contains (`.mzML`, `.mzXML`).
pub const SAMPLE_FILE_TOKEN: &str = ".mz";

/// Suffix exported by feature-detection tools after the file name.
pub const PEAK_AREA_SUFFIX: &str = " Peak area";

/// Normalize a metadata label: trimmed, inner spaces as `_`, upper case.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().replace(' ', "_").to_uppercase()
}

/// Clean sample ids and text values of a metadata table.
///
/// Sample ids are trimmed. Text values are normalized with
/// [`normalize_label`]. Numbers and missing values are untouched. The input
/// is not modified and cleaning twice gives the same result.
pub fn clean_metadata(metadata: &Metadata) -> Result<Metadata> {
    metadata.map_entries(
        |sid| sid.trim().to_string(),
        |value| match value {
            Variable::Text(s) => Variable::Text(normalize_label(s)),
            other => other.clone(),
        },
    )
}

/// Keep only sample-file columns and strip the peak-area suffix.
///
/// Returns an empty table when no column carries the sample-file token.
pub fn clean_feature_table(table: &FeatureTable) -> Result<FeatureTable> {
    let keep: Vec<usize> = table
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, name)| name.contains(SAMPLE_FILE_TOKEN))
        .map(|(j, _)| j)
        .collect();

    if keep.is_empty() {
        log::warn!("No sample-file columns found in feature table");
        return Ok(FeatureTable::empty());
    }

    let renamed: Vec<String> = keep
        .iter()
        .map(|&j| table.sample_ids()[j].replace(PEAK_AREA_SUFFIX, "").trim().to_string())
        .collect();

    log::debug!(
        "Kept {} of {} feature table columns",
        keep.len(),
        table.n_samples()
    );
    table.subset_samples(&keep)?.with_sample_ids(renamed)
}

/// Samples dropped while aligning the two tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Feature-table columns with no metadata row.
    pub dropped_from_features: Vec<String>,
    /// Metadata rows with no feature-table column.
    pub dropped_from_metadata: Vec<String>,
}

impl AlignmentReport {
    /// True when nothing had to be dropped.
    pub fn is_aligned(&self) -> bool {
        self.dropped_from_features.is_empty() && self.dropped_from_metadata.is_empty()
    }

    pub fn n_dropped(&self) -> usize {
        self.dropped_from_features.len() + self.dropped_from_metadata.len()
    }
}

impl std::fmt::Display for AlignmentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_aligned() {
            return writeln!(f, "All samples present in both metadata and feature table");
        }
        writeln!(
            f,
            "Removed {} feature table columns missing from metadata: {}",
            self.dropped_from_features.len(),
            self.dropped_from_features.join(", ")
        )?;
        writeln!(
            f,
            "Removed {} metadata rows missing from feature table: {}",
            self.dropped_from_metadata.len(),
            self.dropped_from_metadata.join(", ")
        )
    }
}

/// Restrict both tables to their common sample ids.
///
/// Feature-table column order and metadata row order are preserved. After
/// alignment both tables hold the same set of sample ids.
pub fn align(
    metadata: &Metadata,
    table: &FeatureTable,
) -> Result<(Metadata, FeatureTable, AlignmentReport)> {
    let md_ids: HashSet<&str> = metadata.sample_ids().iter().map(String::as_str).collect();
    let ft_ids: HashSet<&str> = table.sample_ids().iter().map(String::as_str).collect();

    let (keep_ft, dropped_ft): (Vec<String>, Vec<String>) = table
        .sample_ids()
        .iter()
        .cloned()
        .partition(|sid| md_ids.contains(sid.as_str()));
    let (keep_md, dropped_md): (Vec<String>, Vec<String>) = metadata
        .sample_ids()
        .iter()
        .cloned()
        .partition(|sid| ft_ids.contains(sid.as_str()));

    let report = AlignmentReport {
        dropped_from_features: dropped_ft,
        dropped_from_metadata: dropped_md,
    };

    if report.is_aligned() {
        log::info!("All {} samples present in both tables", keep_ft.len());
        return Ok((metadata.clone(), table.clone(), report));
    }

    if !report.dropped_from_features.is_empty() {
        log::warn!(
            "Removing {} feature table columns not present in metadata: {}",
            report.dropped_from_features.len(),
            report.dropped_from_features.join(", ")
        );
    }
    if !report.dropped_from_metadata.is_empty() {
        log::warn!(
            "Removing {} metadata rows not present in feature table: {}",
            report.dropped_from_metadata.len(),
            report.dropped_from_metadata.join(", ")
        );
    }

    Ok((
        metadata.subset_samples(&keep_md)?,
        table.select_samples(&keep_ft)?,
        report,
    ))
}
