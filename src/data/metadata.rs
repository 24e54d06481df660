//! Sample metadata handling for metabolomics statistics.

use crate::error::{MetaboError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Column name prefix that marks grouping attributes in input files.
pub const GROUPING_PREFIX: &str = "ATTRIBUTE_";

/// Column name used as the sample index when present.
pub const FILENAME_COLUMN: &str = "filename";

/// A metadata value that can be text, numeric or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Free text or categorical label.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Variable::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Variable::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Level label used when grouping samples by this value.
    pub fn level(&self) -> Option<String> {
        match self {
            Variable::Text(s) => Some(s.clone()),
            Variable::Number(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }
}

/// Role of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Admissible factor for statistical tests.
    Grouping,
    /// Identifier-like column (never used as a factor).
    Identifier,
    /// Descriptive column, usable for sample selection only.
    FreeText,
}

/// Sample metadata containing attributes for each sample.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Role of each column.
    column_roles: HashMap<String, ColumnRole>,
}

impl Metadata {
    /// Create metadata for the given samples with no columns.
    pub fn new(sample_ids: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for sid in &sample_ids {
            if !seen.insert(sid.as_str()) {
                return Err(MetaboError::SampleMismatch(format!(
                    "Duplicate sample '{}' in metadata",
                    sid
                )));
            }
        }
        let data = sample_ids
            .iter()
            .map(|sid| (sid.clone(), HashMap::new()))
            .collect();
        Ok(Self {
            sample_ids,
            column_names: Vec::new(),
            data,
            column_roles: HashMap::new(),
        })
    }

    /// Add a column, one value per sample in sample order.
    pub fn add_column(mut self, name: &str, role: ColumnRole, values: Vec<Variable>) -> Result<Self> {
        if values.len() != self.sample_ids.len() {
            return Err(MetaboError::DimensionMismatch {
                expected: self.sample_ids.len(),
                actual: values.len(),
            });
        }
        if self.has_column(name) {
            return Err(MetaboError::InvalidParameter(format!(
                "Column '{}' already exists",
                name
            )));
        }
        for (sid, value) in self.sample_ids.iter().zip(values) {
            if let Some(row) = self.data.get_mut(sid) {
                row.insert(name.to_string(), value);
            }
        }
        self.column_names.push(name.to_string());
        self.column_roles.insert(name.to_string(), role);
        Ok(self)
    }

    /// Convenience for adding a text column from string slices.
    pub fn add_text_column(self, name: &str, role: ColumnRole, values: &[&str]) -> Result<Self> {
        let values = values
            .iter()
            .map(|v| Variable::Text(v.to_string()))
            .collect();
        self.add_column(name, role, values)
    }

    /// Load metadata from a TSV file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load metadata from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',')
    }

    /// Load metadata from a delimited text file.
    ///
    /// Expected format:
    /// - First row: header. The `filename` column (or the first column when
    ///   absent) holds the sample identifiers.
    /// - Columns prefixed with `ATTRIBUTE_` become [`ColumnRole::Grouping`]
    ///   columns with the prefix removed; others are [`ColumnRole::FreeText`].
    ///
    /// Columns where every present value parses as a number are numeric,
    /// otherwise every value is kept as text.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if header.len() < 2 {
            return Err(MetaboError::EmptyData(
                "Metadata must have at least one attribute column".to_string(),
            ));
        }
        let id_col = header
            .iter()
            .position(|h| h == FILENAME_COLUMN)
            .unwrap_or(0);

        let mut raw_data: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            raw_data.push(record.iter().map(|s| s.to_string()).collect());
        }
        if raw_data.is_empty() {
            return Err(MetaboError::EmptyData("No samples in metadata".to_string()));
        }

        let sample_ids: Vec<String> = raw_data
            .iter()
            .map(|r| r.get(id_col).cloned().unwrap_or_default())
            .collect();
        let mut metadata = Self::new(sample_ids)?;

        for (col_idx, raw_name) in header.iter().enumerate() {
            if col_idx == id_col {
                continue;
            }
            let cells: Vec<&str> = raw_data
                .iter()
                .map(|r| r.get(col_idx).map(String::as_str).unwrap_or(""))
                .collect();
            let numeric = cells
                .iter()
                .all(|c| is_missing_marker(c) || c.trim().parse::<f64>().is_ok());
            let values = cells
                .iter()
                .map(|c| {
                    if is_missing_marker(c) {
                        Variable::Missing
                    } else if numeric {
                        c.trim().parse::<f64>().map(Variable::Number).unwrap_or(Variable::Missing)
                    } else {
                        Variable::Text(c.to_string())
                    }
                })
                .collect();

            let (name, role) = match raw_name.strip_prefix(GROUPING_PREFIX) {
                Some(stripped) => (stripped, ColumnRole::Grouping),
                None => (raw_name.as_str(), ColumnRole::FreeText),
            };
            metadata = metadata.add_column(name, role, values)?;
        }

        Ok(metadata)
    }

    /// Override the role of specific columns.
    pub fn with_column_roles(mut self, roles: HashMap<String, ColumnRole>) -> Result<Self> {
        for (name, role) in roles {
            if !self.has_column(&name) {
                return Err(MetaboError::MissingColumn(name));
            }
            self.column_roles.insert(name, role);
        }
        Ok(self)
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    /// Role of a column.
    pub fn column_role(&self, column: &str) -> Option<ColumnRole> {
        self.column_roles.get(column).copied()
    }

    /// Get a value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get all values for a column in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(MetaboError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Sorted distinct non-missing levels of a column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let levels: BTreeSet<String> = self
            .column(column)?
            .iter()
            .filter_map(|v| v.level())
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Grouping columns with at least two distinct levels.
    ///
    /// Only these columns may be passed to the statistical tests.
    pub fn grouping_attributes(&self) -> Vec<String> {
        self.column_names
            .iter()
            .filter(|c| self.column_role(c) == Some(ColumnRole::Grouping))
            .filter(|c| self.levels(c).map(|l| l.len() >= 2).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Check that `column` is an admissible test factor.
    pub fn require_grouping(&self, column: &str) -> Result<()> {
        if !self.has_column(column) {
            return Err(MetaboError::MissingColumn(column.to_string()));
        }
        if self.column_role(column) != Some(ColumnRole::Grouping) {
            return Err(MetaboError::InvalidAttribute {
                column: column.to_string(),
                reason: "column is not tagged as a grouping attribute".to_string(),
            });
        }
        if self.levels(column)?.len() < 2 {
            return Err(MetaboError::InvalidAttribute {
                column: column.to_string(),
                reason: "fewer than two distinct values".to_string(),
            });
        }
        Ok(())
    }

    /// Sample IDs whose `column` has the given level.
    pub fn samples_with_level(&self, column: &str, level: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        Ok(self
            .sample_ids
            .iter()
            .zip(values)
            .filter(|(_, v)| v.level().as_deref() == Some(level))
            .map(|(sid, _)| sid.clone())
            .collect())
    }

    /// Subset metadata to the specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_sample_ids = Vec::new();

        for sid in sample_ids {
            if let Some(sample_data) = self.data.get(sid) {
                new_data.insert(sid.clone(), sample_data.clone());
                new_sample_ids.push(sid.clone());
            } else {
                return Err(MetaboError::SampleMismatch(format!(
                    "Sample '{}' not found in metadata",
                    sid
                )));
            }
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
            column_roles: self.column_roles.clone(),
        })
    }

    /// Copy without the listed samples.
    pub fn drop_samples(&self, sample_ids: &[String]) -> Self {
        let drop: HashSet<&str> = sample_ids.iter().map(String::as_str).collect();
        let keep: Vec<String> = self
            .sample_ids
            .iter()
            .filter(|s| !drop.contains(s.as_str()))
            .cloned()
            .collect();
        // Every kept id exists by construction
        self.subset_samples(&keep).unwrap_or_default()
    }

    /// Copy with sample ids and values rewritten.
    ///
    /// Used by the cleaning stage; `rename` must keep ids unique.
    pub(crate) fn map_entries<F, G>(&self, rename: F, map_value: G) -> Result<Self>
    where
        F: Fn(&str) -> String,
        G: Fn(&Variable) -> Variable,
    {
        let sample_ids: Vec<String> = self.sample_ids.iter().map(|s| rename(s)).collect();
        let mut out = Self::new(sample_ids)?;
        for column in &self.column_names {
            let role = self.column_role(column).unwrap_or(ColumnRole::FreeText);
            let values = self.column(column)?.into_iter().map(&map_value).collect();
            out = out.add_column(column, role, values)?;
        }
        Ok(out)
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

fn is_missing_marker(raw: &str) -> bool {
    let v = raw.trim();
    v.is_empty() || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("nan")
}
