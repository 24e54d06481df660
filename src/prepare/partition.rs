//! Split of metadata rows into analysed samples and blanks.

use super::tables::normalize_label;
use crate::data::{FeatureTable, Metadata};
use crate::error::{MetaboError, Result};
use serde::{Deserialize, Serialize};

/// Rows matching `column == value`.
///
/// Values are compared after label normalization, so `"Sample"` selects rows
/// cleaned to `"SAMPLE"`.
pub fn rows_matching(metadata: &Metadata, column: &str, value: &str) -> Result<Vec<String>> {
    let wanted = normalize_label(value);
    let values = metadata.column(column)?;
    Ok(metadata
        .sample_ids()
        .iter()
        .zip(values)
        .filter(|(_, v)| v.level().map(|l| normalize_label(&l)) == Some(wanted.clone()))
        .map(|(sid, _)| sid.clone())
        .collect())
}

/// Selected samples and, optionally, blanks drawn from the remaining rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePartition {
    /// Sample ids selected for analysis.
    pub samples: Vec<String>,
    /// Blank ids, never overlapping `samples`.
    pub blanks: Vec<String>,
}

impl SamplePartition {
    /// Select samples by `(column, value)`.
    pub fn select(metadata: &Metadata, column: &str, value: &str) -> Result<Self> {
        let samples = rows_matching(metadata, column, value)?;
        if samples.is_empty() {
            return Err(MetaboError::EmptyData(format!(
                "No samples with {} = '{}'",
                column, value
            )));
        }
        log::info!("Selected {} samples with {} = '{}'", samples.len(), column, value);
        Ok(Self {
            samples,
            blanks: Vec::new(),
        })
    }

    /// Choose blanks by `(column, value)` among rows not selected as samples.
    pub fn with_blanks(mut self, metadata: &Metadata, column: &str, value: &str) -> Result<Self> {
        let remaining = metadata.drop_samples(&self.samples);
        let blanks = rows_matching(&remaining, column, value)?;
        if blanks.is_empty() {
            return Err(MetaboError::EmptyData(format!(
                "No blanks with {} = '{}' outside the selected samples",
                column, value
            )));
        }
        log::info!("Selected {} blanks with {} = '{}'", blanks.len(), column, value);
        self.blanks = blanks;
        Ok(self)
    }

    /// Metadata rows not selected as samples.
    pub fn non_samples(&self, metadata: &Metadata) -> Metadata {
        metadata.drop_samples(&self.samples)
    }

    /// Feature-table columns of the selected samples.
    pub fn sample_table(&self, table: &FeatureTable) -> Result<FeatureTable> {
        table.select_samples(&self.samples)
    }

    /// Feature-table columns of the blanks.
    pub fn blank_table(&self, table: &FeatureTable) -> Result<FeatureTable> {
        table.select_samples(&self.blanks)
    }

    /// Metadata rows of the selected samples.
    pub fn sample_metadata(&self, metadata: &Metadata) -> Result<Metadata> {
        metadata.subset_samples(&self.samples)
    }
}
