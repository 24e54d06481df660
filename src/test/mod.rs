//! Univariate hypothesis tests on scaled metabolite intensities.
//!
//! Omnibus tests ([`anova`], [`kruskal`]) run across every level of a
//! grouping attribute. Their pairwise follow-ups ([`tukey`], [`dunn`]) compare
//! two levels on the metabolites the omnibus test flagged. [`ttest`] compares
//! two levels directly.

mod common;
pub mod ttest;

pub use anova::{anova, one_way_anova};
pub use dunn::{dunn, dunn_two_groups};
pub use kruskal::{kruskal, kruskal_wallis};
pub use ttest::{complete_pairs, independent_ttest, paired_ttest, ttest, TTestStats};
pub use tukey::{tukey, tukey_hsd_two_groups};

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::data::{AnalysisFrame, ColumnRole, Metadata, ScaledTable};
    use nalgebra::DMatrix;

    /// Frame with one row per sample, features `m1..`, a `group` grouping
    /// column and a free-text `note` column.
    pub fn frame_from(rows: &[Vec<f64>], groups: &[&str]) -> AnalysisFrame {
        let n_samples = rows.len();
        let n_features = rows.first().map_or(0, |r| r.len());
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let data = DMatrix::from_row_slice(n_samples, n_features, &flat);

        let sample_ids: Vec<String> = (1..=n_samples).map(|i| format!("s{:02}", i)).collect();
        let feature_ids = (1..=n_features).map(|j| format!("m{}", j)).collect();
        let scaled = ScaledTable::new(data, sample_ids.clone(), feature_ids).unwrap();

        let notes: Vec<&str> = (0..n_samples).map(|i| if i % 2 == 0 { "x" } else { "y" }).collect();
        let metadata = Metadata::new(sample_ids)
            .unwrap()
            .add_text_column("group", ColumnRole::Grouping, groups)
            .unwrap()
            .add_text_column("note", ColumnRole::FreeText, &notes)
            .unwrap();
        AnalysisFrame::join(scaled, &metadata).unwrap()
    }
}
