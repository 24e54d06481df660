//! Helpers shared by the univariate tests.

use crate::correct::{adjust_pvalues, CorrectionMethod};
use crate::data::{AnalysisFrame, Groups, OmnibusRow, OmnibusTable, SIGNIFICANCE_LEVEL};
use crate::error::Result;
use rayon::prelude::*;

/// Raw outcome of an omnibus test on one feature.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTest {
    pub statistic: f64,
    pub p_value: f64,
}

impl RawTest {
    pub const UNDEFINED: RawTest = RawTest {
        statistic: f64::NAN,
        p_value: f64::NAN,
    };

    pub fn is_defined(&self) -> bool {
        !self.statistic.is_nan() && !self.p_value.is_nan()
    }
}

/// Run `test` on every feature, grouped by `attribute`, in parallel.
///
/// Missing values are removed from each group before testing. Output order
/// matches the frame's feature order.
pub(crate) fn per_feature<T, F>(frame: &AnalysisFrame, groups: &Groups, test: F) -> Vec<(String, T)>
where
    T: Send,
    F: Fn(&[Vec<f64>]) -> T + Sync,
{
    per_feature_raw(frame, groups, |split| {
        let present: Vec<Vec<f64>> = split.iter().map(|g| drop_missing(g)).collect();
        test(&present)
    })
}

/// Like [`per_feature`], but groups keep their missing values and member order.
pub(crate) fn per_feature_raw<T, F>(frame: &AnalysisFrame, groups: &Groups, test: F) -> Vec<(String, T)>
where
    T: Send,
    F: Fn(&[Vec<f64>]) -> T + Sync,
{
    (0..frame.n_features())
        .into_par_iter()
        .map(|j| {
            let values = frame.feature_column(j);
            (frame.feature_ids()[j].clone(), test(&groups.split(&values)))
        })
        .collect()
}

pub(crate) fn drop_missing(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Correct, flag and sort omnibus results. Undefined rows are dropped.
pub(crate) fn omnibus_table(
    test: &str,
    attribute: &str,
    correction: CorrectionMethod,
    raw: Vec<(String, RawTest)>,
) -> OmnibusTable {
    let n_raw = raw.len();
    let defined: Vec<(String, RawTest)> = raw.into_iter().filter(|(_, r)| r.is_defined()).collect();
    if defined.len() < n_raw {
        log::debug!("{}: {} degenerate features dropped", test, n_raw - defined.len());
    }

    let p_values: Vec<f64> = defined.iter().map(|(_, r)| r.p_value).collect();
    let corrected = adjust_pvalues(&p_values, correction);
    let rows = defined
        .into_iter()
        .zip(corrected)
        .map(|((metabolite, r), q)| OmnibusRow {
            metabolite,
            p_value: r.p_value,
            statistic: r.statistic,
            p_corrected: q,
            significant: q < SIGNIFICANCE_LEVEL,
        })
        .collect();

    let table = OmnibusTable::new(test, attribute, correction, rows);
    log::info!(
        "{} on '{}': {} of {} metabolites significant",
        test,
        attribute,
        table.significant().len(),
        table.len()
    );
    table
}

/// Frame restricted to two levels and the metabolites to compare.
///
/// Levels are returned sorted, so `A` is always the smaller label.
pub(crate) fn pairwise_frame(
    frame: &AnalysisFrame,
    attribute: &str,
    levels: &[String],
    metabolites: &[String],
) -> Result<(AnalysisFrame, [String; 2])> {
    let pair = frame.restrict_to_pair(attribute, levels)?;
    let mut sorted = [levels[0].clone(), levels[1].clone()];
    sorted.sort();
    Ok((pair.select_features(metabolites)?, sorted))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (ddof = 1).
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sum of squared deviations from the mean.
pub(crate) fn sum_squares(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum()
}

/// Average ranks (1-based, ties share the mean rank) and the tie term
/// `sum(t^3 - t)` over groups of tied values.
pub(crate) fn rank_with_ties(values: &[f64]) -> (Vec<f64>, f64) {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Positions i..j share the average of ranks i+1..=j
        let avg = (i + 1 + j) as f64 / 2.0;
        for &k in &order[i..j] {
            ranks[k] = avg;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }
    (ranks, tie_term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rank_with_ties() {
        let (ranks, ties) = rank_with_ties(&[10.0, 20.0, 10.0, 30.0, 10.0]);
        assert_eq!(ranks, vec![2.0, 4.0, 2.0, 5.0, 2.0]);
        assert_relative_eq!(ties, 24.0);

        let (ranks, ties) = rank_with_ties(&[3.0, 1.0, 2.0]);
        assert_eq!(ranks, vec![3.0, 1.0, 2.0]);
        assert_eq!(ties, 0.0);
    }

    #[test]
    fn test_moments() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(sample_variance(&[1.0, 2.0, 3.0]), 1.0);
        assert_relative_eq!(sum_squares(&[1.0, 2.0, 3.0]), 2.0);
        assert!(sample_variance(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_omnibus_table_drops_undefined() {
        let raw = vec![
            ("m1".to_string(), RawTest { statistic: 5.0, p_value: 0.01 }),
            ("m2".to_string(), RawTest::UNDEFINED),
            ("m3".to_string(), RawTest { statistic: 1.0, p_value: 0.4 }),
        ];
        let table = omnibus_table("anova", "group", CorrectionMethod::Bonferroni, raw);
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table.rows[0].p_corrected, 0.02, epsilon = 1e-12);
        assert!(table.rows[0].significant);
        assert!(!table.rows[1].significant);
    }
}
