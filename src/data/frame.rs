//! Scaled sample-by-feature table and its join with metadata.

use crate::data::Metadata;
use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Standardized intensities with samples as rows and features as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledTable {
    /// Dense matrix (samples × features)
    data: DMatrix<f64>,
    sample_ids: Vec<String>,
    feature_ids: Vec<String>,
}

impl ScaledTable {
    /// Create a scaled table, checking dimensions.
    pub fn new(data: DMatrix<f64>, sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        if data.nrows() != sample_ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: data.nrows(),
                actual: sample_ids.len(),
            });
        }
        if data.ncols() != feature_ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: data.ncols(),
                actual: feature_ids.len(),
            });
        }
        Ok(Self {
            data,
            sample_ids,
            feature_ids,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.data[(sample, feature)]
    }

    /// Index of a feature by id.
    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == feature_id)
    }

    /// Index of a sample by id.
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Keep only the given sample rows, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(MetaboError::InvalidParameter(format!(
                "Sample index {} out of bounds",
                bad
            )));
        }
        let data = self.data.select_rows(indices);
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(data, sample_ids, self.feature_ids.clone())
    }

    /// Keep only the given feature columns, in the given order.
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&j| j >= self.n_features()) {
            return Err(MetaboError::InvalidParameter(format!(
                "Feature index {} out of bounds",
                bad
            )));
        }
        let data = self.data.select_columns(indices);
        let feature_ids = indices.iter().map(|&j| self.feature_ids[j].clone()).collect();
        Self::new(data, self.sample_ids.clone(), feature_ids)
    }

    /// Write one row per sample, one column per feature.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample")?;
        for feature_id in &self.feature_ids {
            write!(writer, "\t{}", feature_id)?;
        }
        writeln!(writer)?;

        for (i, sample_id) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sample_id)?;
            for j in 0..self.n_features() {
                let value = self.get(i, j);
                if value.is_nan() {
                    write!(writer, "\tNA")?;
                } else {
                    write!(writer, "\t{}", value)?;
                }
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Per-level sample indices for one grouping attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Groups {
    /// Level labels, sorted.
    pub levels: Vec<String>,
    /// Row indices into the frame, one list per level.
    pub members: Vec<Vec<usize>>,
}

impl Groups {
    pub fn n_groups(&self) -> usize {
        self.levels.len()
    }

    /// Collect one feature's values per group.
    pub fn split(&self, values: &[f64]) -> Vec<Vec<f64>> {
        self.members
            .iter()
            .map(|idx| idx.iter().map(|&i| values[i]).collect())
            .collect()
    }
}

/// Scaled intensities joined with metadata on sample id.
///
/// Row `i` of [`ScaledTable`] and sample `i` of [`Metadata`] always refer to
/// the same sample. This is the unit every statistical test operates on.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    scaled: ScaledTable,
    metadata: Metadata,
}

impl AnalysisFrame {
    /// Inner join on sample id, keeping the scaled table's row order.
    pub fn join(scaled: ScaledTable, metadata: &Metadata) -> Result<Self> {
        let keep: Vec<usize> = (0..scaled.n_samples())
            .filter(|&i| metadata.has_sample(&scaled.sample_ids()[i]))
            .collect();
        if keep.len() < scaled.n_samples() {
            log::warn!(
                "{} scaled samples have no metadata and were left out of the join",
                scaled.n_samples() - keep.len()
            );
        }
        let scaled = scaled.subset_samples(&keep)?;
        let metadata = metadata.subset_samples(scaled.sample_ids())?;
        Ok(Self { scaled, metadata })
    }

    pub fn scaled(&self) -> &ScaledTable {
        &self.scaled
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn n_samples(&self) -> usize {
        self.scaled.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.scaled.n_features()
    }

    pub fn feature_ids(&self) -> &[String] {
        self.scaled.feature_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.scaled.sample_ids()
    }

    /// Values of one feature across all samples, in row order.
    pub fn feature_values(&self, feature_id: &str) -> Option<Vec<f64>> {
        self.scaled
            .feature_index(feature_id)
            .map(|j| self.feature_column(j))
    }

    /// Values of the feature at column `j`.
    pub fn feature_column(&self, j: usize) -> Vec<f64> {
        self.scaled.matrix().column(j).iter().copied().collect()
    }

    /// Group samples by the levels of a grouping attribute.
    ///
    /// Samples with a missing value are left out of every group.
    pub fn groups(&self, attribute: &str) -> Result<Groups> {
        self.metadata.require_grouping(attribute)?;
        let levels = self.metadata.levels(attribute)?;
        let values = self.metadata.column(attribute)?;
        let members = levels
            .iter()
            .map(|level| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.level().as_deref() == Some(level.as_str()))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        Ok(Groups { levels, members })
    }

    /// Restrict to the samples whose attribute equals one of two levels.
    ///
    /// Fails unless exactly two distinct levels are given and both occur.
    pub fn restrict_to_pair(&self, attribute: &str, levels: &[String]) -> Result<Self> {
        if levels.len() != 2 || levels[0] == levels[1] {
            return Err(MetaboError::InvalidParameter(format!(
                "Exactly two distinct levels of '{}' are required, got {:?}",
                attribute, levels
            )));
        }
        let groups = self.groups(attribute)?;
        let mut keep = Vec::new();
        for level in levels {
            let pos = groups.levels.iter().position(|l| l == level).ok_or_else(|| {
                MetaboError::InvalidParameter(format!(
                    "Level '{}' not found in attribute '{}'",
                    level, attribute
                ))
            })?;
            keep.extend(groups.members[pos].iter().copied());
        }
        keep.sort_unstable();
        let scaled = self.scaled.subset_samples(&keep)?;
        let metadata = self.metadata.subset_samples(scaled.sample_ids())?;
        Ok(Self { scaled, metadata })
    }

    /// Keep only the named features.
    pub fn select_features(&self, feature_ids: &[String]) -> Result<Self> {
        let indices = feature_ids
            .iter()
            .map(|f| {
                self.scaled
                    .feature_index(f)
                    .ok_or_else(|| MetaboError::InvalidParameter(format!("Unknown feature '{}'", f)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            scaled: self.scaled.subset_features(&indices)?,
            metadata: self.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnRole;

    fn create_frame() -> AnalysisFrame {
        let data = DMatrix::from_row_slice(4, 2, &[1.0, -1.0, 2.0, -2.0, 3.0, 0.5, 4.0, 0.0]);
        let scaled = ScaledTable::new(
            data,
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            vec!["m1".into(), "m2".into()],
        )
        .unwrap();
        let metadata = Metadata::new(vec!["s4".into(), "s3".into(), "s2".into(), "s1".into(), "s5".into()])
            .unwrap()
            .add_text_column("group", ColumnRole::Grouping, &["B", "C", "A", "A", "B"])
            .unwrap();
        AnalysisFrame::join(scaled, &metadata).unwrap()
    }

    #[test]
    fn test_join_aligns_rows() {
        let frame = create_frame();
        assert_eq!(frame.n_samples(), 4);
        assert_eq!(frame.metadata().sample_ids(), frame.sample_ids());
        assert_eq!(frame.feature_values("m1").unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(frame.feature_values("zzz").is_none());
    }

    #[test]
    fn test_groups() {
        let frame = create_frame();
        let groups = frame.groups("group").unwrap();
        assert_eq!(groups.levels, vec!["A", "B", "C"]);
        assert_eq!(groups.members, vec![vec![0, 1], vec![3], vec![2]]);
        assert_eq!(groups.split(&[1.0, 2.0, 3.0, 4.0]), vec![vec![1.0, 2.0], vec![4.0], vec![3.0]]);
    }

    #[test]
    fn test_restrict_to_pair() {
        let frame = create_frame();
        let pair = frame
            .restrict_to_pair("group", &["A".to_string(), "C".to_string()])
            .unwrap();
        assert_eq!(pair.sample_ids(), &["s1", "s2", "s3"]);

        assert!(frame
            .restrict_to_pair("group", &["A".into(), "B".into(), "C".into()])
            .is_err());
        assert!(frame.restrict_to_pair("group", &["A".into(), "Z".into()]).is_err());
    }
}
