//! Result tables produced by the univariate test engine.

use crate::correct::CorrectionMethod;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Threshold applied to corrected p-values.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

fn by_raw_p<T, F: Fn(&T) -> f64>(rows: &mut [T], p: F) {
    rows.sort_by(|a, b| p(a).total_cmp(&p(b)));
}

/// One metabolite tested by an omnibus test (ANOVA or Kruskal-Wallis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmnibusRow {
    /// Metabolite (feature) identifier.
    pub metabolite: String,
    /// Raw p-value.
    pub p_value: f64,
    /// F statistic (ANOVA) or H statistic (Kruskal-Wallis).
    pub statistic: f64,
    /// Corrected p-value.
    pub p_corrected: f64,
    /// `p_corrected < 0.05`.
    pub significant: bool,
}

/// Omnibus test results for one grouping attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmnibusTable {
    /// Test name ("anova" or "kruskal").
    pub test: String,
    /// Grouping attribute tested.
    pub attribute: String,
    /// Correction applied to `p_corrected`.
    pub correction: CorrectionMethod,
    /// Rows sorted ascending by raw p-value.
    pub rows: Vec<OmnibusRow>,
}

impl OmnibusTable {
    /// Build a table, sorting rows by raw p-value.
    pub fn new(
        test: impl Into<String>,
        attribute: impl Into<String>,
        correction: CorrectionMethod,
        mut rows: Vec<OmnibusRow>,
    ) -> Self {
        by_raw_p(&mut rows, |r| r.p_value);
        Self {
            test: test.into(),
            attribute: attribute.into(),
            correction,
            rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows flagged significant.
    pub fn significant(&self) -> Vec<&OmnibusRow> {
        self.rows.iter().filter(|r| r.significant).collect()
    }

    /// Identifiers of significant metabolites, in table order.
    pub fn significant_metabolites(&self) -> Vec<String> {
        self.significant()
            .into_iter()
            .map(|r| r.metabolite.clone())
            .collect()
    }

    /// Look up a metabolite's row.
    pub fn get(&self, metabolite: &str) -> Option<&OmnibusRow> {
        self.rows.iter().find(|r| r.metabolite == metabolite)
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "metabolite\tp\tstatistic\tp-corrected\tsignificant")?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{:.6e}\t{:.6}\t{:.6e}\t{}",
                r.metabolite, r.p_value, r.statistic, r.p_corrected, r.significant
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for OmnibusTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} on '{}' ({})", self.test, self.attribute, self.correction.name())?;
        writeln!(f, "  Metabolites tested: {}", self.len())?;
        writeln!(f, "  Significant:        {}", self.significant().len())?;
        Ok(())
    }
}

/// One metabolite compared between two levels (Tukey or Dunn).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseRow {
    pub metabolite: String,
    /// Difference of group means, `mean_a - mean_b`.
    pub diff: f64,
    pub p_value: f64,
    pub p_corrected: f64,
    pub significant: bool,
    pub attribute: String,
    /// First level.
    pub a: String,
    /// Second level.
    pub b: String,
    pub mean_a: f64,
    pub mean_b: f64,
}

/// Post-hoc pairwise comparison results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseTable {
    /// Test name ("tukey" or "dunn").
    pub test: String,
    pub attribute: String,
    pub level_a: String,
    pub level_b: String,
    pub correction: CorrectionMethod,
    pub rows: Vec<PairwiseRow>,
}

impl PairwiseTable {
    /// Build a table, sorting rows by raw p-value.
    pub fn new(
        test: impl Into<String>,
        attribute: impl Into<String>,
        levels: (&str, &str),
        correction: CorrectionMethod,
        mut rows: Vec<PairwiseRow>,
    ) -> Self {
        by_raw_p(&mut rows, |r| r.p_value);
        Self {
            test: test.into(),
            attribute: attribute.into(),
            level_a: levels.0.to_string(),
            level_b: levels.1.to_string(),
            correction,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn significant(&self) -> Vec<&PairwiseRow> {
        self.rows.iter().filter(|r| r.significant).collect()
    }

    pub fn get(&self, metabolite: &str) -> Option<&PairwiseRow> {
        self.rows.iter().find(|r| r.metabolite == metabolite)
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "stats_metabolite\tdiff\tstats_p\tp-corrected\tsignificant\tattribute\tA\tB\tmean(A)\tmean(B)"
        )?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{:.6}\t{:.6e}\t{:.6e}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}",
                r.metabolite,
                r.diff,
                r.p_value,
                r.p_corrected,
                r.significant,
                r.attribute,
                r.a,
                r.b,
                r.mean_a,
                r.mean_b
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for PairwiseTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} on '{}': {} vs {} ({})",
            self.test,
            self.attribute,
            self.level_a,
            self.level_b,
            self.correction.name()
        )?;
        writeln!(f, "  Metabolites compared: {}", self.len())?;
        writeln!(f, "  Significant:          {}", self.significant().len())?;
        Ok(())
    }
}

/// One metabolite from a two-group t-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestRow {
    pub metabolite: String,
    /// T statistic.
    pub t: f64,
    /// Degrees of freedom (fractional for Welch).
    pub dof: f64,
    pub p_value: f64,
    pub p_corrected: f64,
    pub significant: bool,
    /// Cohen's d effect size.
    pub cohen_d: f64,
    pub mean_a: f64,
    pub mean_b: f64,
}

/// Two-group t-test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTestTable {
    pub attribute: String,
    pub level_a: String,
    pub level_b: String,
    /// Whether samples were paired.
    pub paired: bool,
    pub correction: CorrectionMethod,
    pub rows: Vec<TTestRow>,
}

impl TTestTable {
    /// Build a table, sorting rows by raw p-value.
    pub fn new(
        attribute: impl Into<String>,
        levels: (&str, &str),
        paired: bool,
        correction: CorrectionMethod,
        mut rows: Vec<TTestRow>,
    ) -> Self {
        by_raw_p(&mut rows, |r| r.p_value);
        Self {
            attribute: attribute.into(),
            level_a: levels.0.to_string(),
            level_b: levels.1.to_string(),
            paired,
            correction,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn significant(&self) -> Vec<&TTestRow> {
        self.rows.iter().filter(|r| r.significant).collect()
    }

    pub fn get(&self, metabolite: &str) -> Option<&TTestRow> {
        self.rows.iter().find(|r| r.metabolite == metabolite)
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "metabolite\tT\tdof\tp\tp-corrected\tsignificant\tcohen-d\tmean({})\tmean({})",
            self.level_a, self.level_b
        )?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{:.6}\t{:.4}\t{:.6e}\t{:.6e}\t{}\t{:.6}\t{:.6}\t{:.6}",
                r.metabolite,
                r.t,
                r.dof,
                r.p_value,
                r.p_corrected,
                r.significant,
                r.cohen_d,
                r.mean_a,
                r.mean_b
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for TTestTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.paired { "paired t-test" } else { "t-test" };
        writeln!(
            f,
            "{} on '{}': {} vs {} ({})",
            kind,
            self.attribute,
            self.level_a,
            self.level_b,
            self.correction.name()
        )?;
        writeln!(f, "  Metabolites tested: {}", self.len())?;
        writeln!(f, "  Significant:        {}", self.significant().len())?;
        Ok(())
    }
}
