//! Metabolite identifiers built from m/z and retention time columns.

use crate::data::FeatureTable;
use regex::Regex;

/// Column holding the row identifier in feature-detection exports.
pub const ROW_ID_COLUMN: &str = "row ID";

const MZ_PATTERN: &str = r"m/z|mz|mass over charge";
const RT_PATTERN: &str = r"(?:^|[^a-z])rt(?:[^a-z]|$)|retention[ _-]time";

/// Markers of sample-file columns, which never hold m/z or retention time.
const SAMPLE_FILE_MARKERS: [&str; 2] = ["mzml", "mzxml"];

/// Outcome of building a metabolite index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    /// Table with feature ids rewritten as `mz@rt` (optionally `rowid_mz@rt`).
    Success(FeatureTable),
    /// No m/z or retention time column could be detected.
    NoMatchingColumns,
    /// Columns were found but the ids could not be built.
    Failed { reason: String },
}

impl IndexOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IndexOutcome::Success(_))
    }
}

/// `value` rounded to `decimals`, shortest form with at least one decimal.
fn rounded(value: f64, decimals: i32) -> String {
    let factor = 10f64.powi(decimals);
    let text = ((value * factor).round_ties_even() / factor).to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// First column whose lowercased name matches `pattern` and is not a sample file.
fn find_column(table: &FeatureTable, pattern: &Regex) -> Option<usize> {
    table.sample_ids().iter().position(|name| {
        let lower = name.to_lowercase();
        !SAMPLE_FILE_MARKERS.iter().any(|m| lower.contains(m)) && pattern.is_match(&lower)
    })
}

/// Rewrite feature ids from the m/z and retention time columns.
///
/// Operates on the raw table, before [`clean_feature_table`] drops the
/// annotation columns. Ids are `"mz@rt"` with m/z rounded to 5 and retention
/// time to 2 decimals, trailing zeros trimmed (`100.1@1.5`), prefixed with
/// the `row ID` value and `_` when that column exists.
///
/// [`clean_feature_table`]: super::clean_feature_table
pub fn build_feature_index(table: &FeatureTable) -> IndexOutcome {
    let (mz_re, rt_re) = match (Regex::new(MZ_PATTERN), Regex::new(RT_PATTERN)) {
        (Ok(mz), Ok(rt)) => (mz, rt),
        (Err(e), _) | (_, Err(e)) => {
            return IndexOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    let (mz_col, rt_col) = match (find_column(table, &mz_re), find_column(table, &rt_re)) {
        (Some(mz), Some(rt)) => (mz, rt),
        (mz, rt) => {
            log::warn!(
                "Could not determine index automatically (m/z column: {}, RT column: {})",
                if mz.is_some() { "found" } else { "missing" },
                if rt.is_some() { "found" } else { "missing" },
            );
            return IndexOutcome::NoMatchingColumns;
        }
    };
    let row_id_col = table.sample_index(ROW_ID_COLUMN);

    let mut ids = Vec::with_capacity(table.n_features());
    for i in 0..table.n_features() {
        let mz = table.get(i, mz_col);
        let rt = table.get(i, rt_col);
        if !mz.is_finite() || !rt.is_finite() {
            return IndexOutcome::Failed {
                reason: format!(
                    "feature '{}' has no m/z or retention time value",
                    table.feature_ids()[i]
                ),
            };
        }
        let id = match row_id_col {
            Some(c) => format!(
                "{}_{}@{}",
                table.get(i, c),
                rounded(mz, 5),
                rounded(rt, 2)
            ),
            None => format!("{}@{}", rounded(mz, 5), rounded(rt, 2)),
        };
        ids.push(id);
    }

    match table.clone().with_feature_ids(ids) {
        Ok(indexed) => {
            log::info!(
                "Built metabolite index from columns '{}' and '{}'",
                table.sample_ids()[mz_col],
                table.sample_ids()[rt_col]
            );
            IndexOutcome::Success(indexed)
        }
        Err(e) => IndexOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
