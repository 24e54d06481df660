//! Per-column level summary of sample metadata.

use crate::data::{ColumnRole, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Distinct values of one metadata column and how often each occurs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnLevels {
    pub column: String,
    pub role: ColumnRole,
    /// `(level, count)`, sorted by level.
    pub levels: Vec<(String, usize)>,
    /// Samples with no value in this column.
    pub n_missing: usize,
}

/// Level summary over all metadata columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSummary {
    pub n_samples: usize,
    pub columns: Vec<ColumnLevels>,
}

impl LevelSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnLevels> {
        self.columns.iter().find(|c| c.column == name)
    }

    /// Write one row per column with its levels and counts.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "attribute\tlevels\tcount")?;
        for c in &self.columns {
            let levels: Vec<&str> = c.levels.iter().map(|(l, _)| l.as_str()).collect();
            let counts: Vec<String> = c.levels.iter().map(|(_, n)| n.to_string()).collect();
            writeln!(writer, "{}\t{}\t{}", c.column, levels.join(", "), counts.join(", "))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for LevelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Metadata levels ({} samples)", self.n_samples)?;
        for c in &self.columns {
            let levels: Vec<String> = c
                .levels
                .iter()
                .map(|(l, n)| format!("{} ({})", l, n))
                .collect();
            writeln!(f, "  {}: {}", c.column, levels.join(", "))?;
        }
        Ok(())
    }
}

/// Summarize the distinct values of every metadata column.
///
/// Helps choose the attribute and value that identify samples and blanks.
pub fn summarize_levels(metadata: &Metadata) -> LevelSummary {
    let columns = metadata
        .column_names()
        .iter()
        .filter_map(|name| {
            let values = metadata.column(name).ok()?;
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            let mut n_missing = 0;
            for v in values {
                match v.level() {
                    Some(level) => *counts.entry(level).or_insert(0) += 1,
                    None => n_missing += 1,
                }
            }
            Some(ColumnLevels {
                column: name.clone(),
                role: metadata.column_role(name).unwrap_or(ColumnRole::FreeText),
                levels: counts.into_iter().collect(),
                n_missing,
            })
        })
        .collect();

    LevelSummary {
        n_samples: metadata.n_samples(),
        columns,
    }
}
