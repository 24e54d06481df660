//! Dense feature intensity table for untargeted metabolomics data.

use crate::error::{MetaboError, Result};
use nalgebra::DMatrix;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Name of the column used as the feature identifier when present.
pub const METABOLITE_COLUMN: &str = "metabolite";

/// A dense intensity matrix storing metabolite abundances across samples.
///
/// Rows represent features (metabolites), columns represent samples.
/// Missing measurements are stored as `NaN`; zero means below detection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    /// Dense matrix (features × samples)
    data: DMatrix<f64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl FeatureTable {
    /// Create a new FeatureTable from a dense matrix and identifiers.
    ///
    /// Identifiers must be unique on both axes.
    pub fn new(
        data: DMatrix<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        if let Some(dup) = first_duplicate(&feature_ids) {
            return Err(MetaboError::InvalidParameter(format!(
                "Duplicate feature identifier '{}'",
                dup
            )));
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(MetaboError::InvalidParameter(format!(
                "Duplicate sample identifier '{}'",
                dup
            )));
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a table from row-major values (one inner vec per feature).
    pub fn from_rows(
        rows: &[Vec<f64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        for row in rows {
            if row.len() != n_samples {
                return Err(MetaboError::DimensionMismatch {
                    expected: n_samples,
                    actual: row.len(),
                });
            }
        }
        let data = DMatrix::from_fn(rows.len(), n_samples, |i, j| rows[i][j]);
        Self::new(data, feature_ids, sample_ids)
    }

    /// A table with no features and no samples.
    pub fn empty() -> Self {
        Self {
            data: DMatrix::zeros(0, 0),
            feature_ids: Vec::new(),
            sample_ids: Vec::new(),
        }
    }

    /// Load a feature table from a tab-separated file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load a feature table from a comma-separated file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',')
    }

    /// Load a feature table from a delimited text file.
    ///
    /// Expected format:
    /// - First row: header. The `metabolite` column holds the feature
    ///   identifiers; without one, features are numbered by row position.
    /// - Every other column whose cells all parse as numbers (empty, `NA` and
    ///   `nan` cells become `NaN`) is kept. Text columns are skipped.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if header.len() < 2 {
            return Err(MetaboError::EmptyData(
                "Feature table must have at least one sample column".to_string(),
            ));
        }
        let id_col = header.iter().position(|h| h == METABOLITE_COLUMN);

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            records.push(record.iter().map(|s| s.to_string()).collect());
        }
        if records.is_empty() {
            return Err(MetaboError::EmptyData("No features in table".to_string()));
        }

        // Keep only columns where every cell is numeric or missing
        let numeric_cols: Vec<usize> = (0..header.len())
            .filter(|&c| Some(c) != id_col)
            .filter(|&c| {
                records
                    .iter()
                    .all(|r| parse_intensity(r.get(c).map(String::as_str).unwrap_or("")).is_some())
            })
            .collect();

        let skipped = header.len() - usize::from(id_col.is_some()) - numeric_cols.len();
        if skipped > 0 {
            log::debug!("Skipped {} non-numeric feature table columns", skipped);
        }

        let feature_ids: Vec<String> = match id_col {
            Some(c) => records
                .iter()
                .map(|r| r.get(c).cloned().unwrap_or_default())
                .collect(),
            None => (0..records.len()).map(|i| i.to_string()).collect(),
        };
        let sample_ids: Vec<String> = numeric_cols.iter().map(|&c| header[c].clone()).collect();

        let mut data = DMatrix::from_element(records.len(), numeric_cols.len(), f64::NAN);
        for (row, record) in records.iter().enumerate() {
            for (col, &c) in numeric_cols.iter().enumerate() {
                let raw = record.get(c).map(String::as_str).unwrap_or("");
                data[(row, col)] = parse_intensity(raw).ok_or_else(|| MetaboError::InvalidValue {
                    value: raw.to_string(),
                    row,
                    col: c,
                })?;
            }
        }

        Self::new(data, feature_ids, sample_ids)
    }

    /// Write the table to a TSV file (missing values written as `NA`).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "{}", METABOLITE_COLUMN)?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for col in 0..self.n_samples() {
                let value = self.get(row, col);
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

    /// Get the value at (feature, sample).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// True when the table has no features or no samples.
    pub fn is_empty(&self) -> bool {
        self.n_features() == 0 || self.n_samples() == 0
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying dense matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Values of one feature across all samples.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Values of one sample across all features.
    pub fn col(&self, col: usize) -> Vec<f64> {
        self.data.column(col).iter().copied().collect()
    }

    /// Position of a sample identifier.
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Values of the column named `name`, if present.
    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.sample_index(name).map(|j| self.col(j))
    }

    /// Iterate over every value in the table.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    /// Apply a function to every cell, producing a new table with the same ids.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            data: self.data.map(f),
            feature_ids: self.feature_ids.clone(),
            sample_ids: self.sample_ids.clone(),
        }
    }

    /// Replace the sample identifiers, keeping the values.
    pub fn with_sample_ids(self, sample_ids: Vec<String>) -> Result<Self> {
        Self::new(self.data, self.feature_ids, sample_ids)
    }

    /// Replace the feature identifiers, keeping the values.
    pub fn with_feature_ids(self, feature_ids: Vec<String>) -> Result<Self> {
        Self::new(self.data, feature_ids, self.sample_ids)
    }

    /// Subset the table to include only specified features (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        for &i in indices {
            if i >= self.n_features() {
                return Err(MetaboError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    i
                )));
            }
        }
        let data = self.data.select_rows(indices);
        let feature_ids = indices.iter().map(|&i| self.feature_ids[i].clone()).collect();
        Self::new(data, feature_ids, self.sample_ids.clone())
    }

    /// Subset the table to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        for &j in indices {
            if j >= self.n_samples() {
                return Err(MetaboError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    j
                )));
            }
        }
        let data = self.data.select_columns(indices);
        let sample_ids = indices.iter().map(|&j| self.sample_ids[j].clone()).collect();
        Self::new(data, self.feature_ids.clone(), sample_ids)
    }

    /// Subset the table to the named samples, in the given order.
    pub fn select_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let indices = sample_ids
            .iter()
            .map(|sid| {
                self.sample_index(sid).ok_or_else(|| {
                    MetaboError::SampleMismatch(format!(
                        "Sample '{}' not found in feature table",
                        sid
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.subset_samples(&indices)
    }
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parse a single intensity cell. Missing markers become `NaN`.
pub(crate) fn parse_intensity(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    trimmed.parse::<f64>().ok()
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(id.as_str())).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> FeatureTable {
        // 3 features × 4 samples
        let rows = vec![
            vec![10.0, 20.0, 0.0, 5.0],
            vec![100.0, 200.0, 150.0, 175.0],
            vec![1.0, f64::NAN, 0.0, 0.0],
        ];
        let feature_ids = vec!["feat_A".to_string(), "feat_B".to_string(), "feat_C".to_string()];
        let sample_ids = vec![
            "s1.mzML".to_string(),
            "s2.mzML".to_string(),
            "s3.mzML".to_string(),
            "s4.mzML".to_string(),
        ];
        FeatureTable::from_rows(&rows, feature_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_features(), 3);
        assert_eq!(table.n_samples(), 4);
        assert!(!table.is_empty());
        assert!(FeatureTable::empty().is_empty());
    }

    #[test]
    fn test_get_values() {
        let table = create_test_table();
        assert_eq!(table.get(0, 0), 10.0);
        assert_eq!(table.get(0, 2), 0.0);
        assert!(table.get(2, 1).is_nan());
        assert_eq!(table.row(1), vec![100.0, 200.0, 150.0, 175.0]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rows = vec![vec![1.0], vec![2.0]];
        let result = FeatureTable::from_rows(
            &rows,
            vec!["m1".to_string(), "m1".to_string()],
            vec!["s1".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_tsv_roundtrip_keeps_missing() {
        let table = create_test_table();
        let temp_file = NamedTempFile::new().unwrap();
        table.to_tsv(temp_file.path()).unwrap();

        let loaded = FeatureTable::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.feature_ids(), table.feature_ids());
        assert_eq!(loaded.sample_ids(), table.sample_ids());
        assert!(loaded.get(2, 1).is_nan());
        assert_eq!(loaded.get(1, 3), 175.0);
    }

    #[test]
    fn test_csv_skips_text_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "row ID,metabolite,annotation,a.mzML Peak area,b.mzML Peak area").unwrap();
        writeln!(file, "1,m1,glucose,10,20").unwrap();
        writeln!(file, "2,m2,,0,").unwrap();
        file.flush().unwrap();

        let table = FeatureTable::from_csv(file.path()).unwrap();
        assert_eq!(table.feature_ids(), &["m1", "m2"]);
        // "annotation" has text so it is skipped; "row ID" is numeric and kept
        assert_eq!(
            table.sample_ids(),
            &["row ID", "a.mzML Peak area", "b.mzML Peak area"]
        );
        assert!(table.get(1, 2).is_nan());
    }

    #[test]
    fn test_subset_features() {
        let table = create_test_table();
        let subset = table.subset_features(&[0, 2]).unwrap();
        assert_eq!(subset.feature_ids(), &["feat_A", "feat_C"]);
        assert_eq!(subset.get(1, 0), 1.0);
        assert!(table.subset_features(&[5]).is_err());
    }

    #[test]
    fn test_select_samples() {
        let table = create_test_table();
        let subset = table
            .select_samples(&["s4.mzML".to_string(), "s2.mzML".to_string()])
            .unwrap();
        assert_eq!(subset.sample_ids(), &["s4.mzML", "s2.mzML"]);
        assert_eq!(subset.get(0, 0), 5.0);
        assert_eq!(subset.get(0, 1), 20.0);
        assert!(table.select_samples(&["missing".to_string()]).is_err());
    }
}
