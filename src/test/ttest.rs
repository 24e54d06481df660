//! Two-group t-tests per metabolite.

use super::common::{drop_missing, mean, per_feature_raw, sample_variance};
use crate::correct::{adjust_pvalues, CorrectionMethod};
use crate::data::{AnalysisFrame, TTestRow, TTestTable, SIGNIFICANCE_LEVEL};
use crate::error::{MetaboError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Statistics of one two-group t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestStats {
    pub t: f64,
    pub dof: f64,
    pub p_value: f64,
    /// Absolute Cohen's d.
    pub cohen_d: f64,
}

impl TTestStats {
    const UNDEFINED: TTestStats = TTestStats {
        t: f64::NAN,
        dof: f64::NAN,
        p_value: f64::NAN,
        cohen_d: f64::NAN,
    };
}

fn two_sided_p(t: f64, dof: f64) -> f64 {
    StudentsT::new(0.0, 1.0, dof)
        .map(|dist| (2.0 * dist.sf(t.abs())).min(1.0))
        .unwrap_or(f64::NAN)
}

/// Independent two-sample t-test.
///
/// Student's pooled-variance test when both groups have the same size,
/// Welch's test otherwise. Cohen's d uses the pooled standard deviation.
pub fn independent_ttest(a: &[f64], b: &[f64]) -> TTestStats {
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    if a.len() < 2 || b.len() < 2 {
        return TTestStats::UNDEFINED;
    }
    let (var_a, var_b) = (sample_variance(a), sample_variance(b));
    let diff = mean(a) - mean(b);
    let pooled_var = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0);

    let (t, dof) = if a.len() == b.len() {
        let se = (pooled_var * (1.0 / n_a + 1.0 / n_b)).sqrt();
        (diff / se, n_a + n_b - 2.0)
    } else {
        let (va, vb) = (var_a / n_a, var_b / n_b);
        let se = (va + vb).sqrt();
        let dof = (va + vb).powi(2) / (va * va / (n_a - 1.0) + vb * vb / (n_b - 1.0));
        (diff / se, dof)
    };
    if !t.is_finite() {
        return TTestStats::UNDEFINED;
    }

    TTestStats {
        t,
        dof,
        p_value: two_sided_p(t, dof),
        cohen_d: (diff / pooled_var.sqrt()).abs(),
    }
}

/// Paired t-test on `a[i] - b[i]`.
///
/// Cohen's d uses the average of the two group variances.
pub fn paired_ttest(a: &[f64], b: &[f64]) -> Result<TTestStats> {
    if a.len() != b.len() {
        return Err(MetaboError::InvalidParameter(format!(
            "Paired t-test needs groups of equal size, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    if a.len() < 2 {
        return Ok(TTestStats::UNDEFINED);
    }
    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let n = diffs.len() as f64;
    let se = (sample_variance(&diffs) / n).sqrt();
    let t = mean(&diffs) / se;
    if !t.is_finite() {
        return Ok(TTestStats::UNDEFINED);
    }
    let dof = n - 1.0;
    let avg_sd = ((sample_variance(a) + sample_variance(b)) / 2.0).sqrt();

    Ok(TTestStats {
        t,
        dof,
        p_value: two_sided_p(t, dof),
        cohen_d: ((mean(a) - mean(b)) / avg_sd).abs(),
    })
}

/// Keep the positions where both `a` and `b` have a value.
pub fn complete_pairs(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .unzip()
}

/// Run a t-test for every metabolite between two levels of an attribute.
///
/// Groups are taken in the order the levels are given (`A` first). Paired
/// mode pairs samples by their position in sample-id order within each group
/// and drops pairs with a missing value on either side.
///
/// # Errors
/// `InvalidParameter` unless exactly two distinct existing levels are given,
/// or when paired groups differ in size.
pub fn ttest(
    frame: &AnalysisFrame,
    attribute: &str,
    levels: &[String],
    paired: bool,
    correction: CorrectionMethod,
) -> Result<TTestTable> {
    let pair = frame.restrict_to_pair(attribute, levels)?;
    let groups = pair.groups(attribute)?;

    // Groups come back sorted by level; reorder to the requested order
    let mut members = groups.members.clone();
    if groups.levels[0] != levels[0] {
        members.swap(0, 1);
    }
    for m in &mut members {
        m.sort_by(|&x, &y| pair.sample_ids()[x].cmp(&pair.sample_ids()[y]));
    }
    if paired && members[0].len() != members[1].len() {
        return Err(MetaboError::InvalidParameter(format!(
            "Paired t-test needs groups of equal size, '{}' has {} and '{}' has {}",
            levels[0],
            members[0].len(),
            levels[1],
            members[1].len()
        )));
    }
    let ordered = crate::data::Groups {
        levels: vec![levels[0].clone(), levels[1].clone()],
        members,
    };

    log::debug!(
        "{} t-test on '{}': {} vs {}, {} metabolites",
        if paired { "Paired" } else { "Independent" },
        attribute,
        levels[0],
        levels[1],
        pair.n_features()
    );

    let raw: Vec<_> = per_feature_raw(&pair, &ordered, |split| {
        let (a, b, stats) = if paired {
            let (a, b) = complete_pairs(&split[0], &split[1]);
            let stats = paired_ttest(&a, &b).unwrap_or(TTestStats::UNDEFINED);
            (a, b, stats)
        } else {
            let (a, b) = (drop_missing(&split[0]), drop_missing(&split[1]));
            let stats = independent_ttest(&a, &b);
            (a, b, stats)
        };
        (stats, mean(&a), mean(&b))
    })
    .into_iter()
    .filter(|(_, (stats, _, _))| !stats.p_value.is_nan())
    .collect();

    let p_values: Vec<f64> = raw.iter().map(|(_, (s, _, _))| s.p_value).collect();
    let corrected = adjust_pvalues(&p_values, correction);
    let rows = raw
        .into_iter()
        .zip(corrected)
        .map(|((metabolite, (s, mean_a, mean_b)), q)| TTestRow {
            metabolite,
            t: s.t,
            dof: s.dof,
            p_value: s.p_value,
            p_corrected: q,
            significant: q < SIGNIFICANCE_LEVEL,
            cohen_d: s.cohen_d,
            mean_a,
            mean_b,
        })
        .collect();

    let table = TTestTable::new(
        attribute,
        (levels[0].as_str(), levels[1].as_str()),
        paired,
        correction,
        rows,
    );
    log::info!(
        "t-test on '{}': {} of {} metabolites significant",
        attribute,
        table.significant().len(),
        table.len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixtures::frame_from;
    use approx::assert_relative_eq;

    #[test]
    fn test_student_equal_sizes() {
        let s = independent_ttest(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_relative_eq!(s.t, -3.0 / (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.dof, 4.0);
        assert_relative_eq!(s.cohen_d, 3.0, epsilon = 1e-12);
        assert!(s.p_value < 0.05);
    }

    #[test]
    fn test_welch_unequal_sizes() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0];
        let s = independent_ttest(&a, &b);
        // var_a = 5/3, var_b = 2; va = 5/12, vb = 1
        let (va, vb): (f64, f64) = (5.0 / 12.0, 1.0);
        let dof = (va + vb) * (va + vb) / (va * va / 3.0 + vb * vb / 1.0);
        assert_relative_eq!(s.t, -0.5 / (va + vb).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.dof, dof, epsilon = 1e-12);
    }

    #[test]
    fn test_paired() {
        let s = paired_ttest(&[1.0, 2.0, 3.0, 4.0], &[1.5, 2.4, 3.6, 4.3]).unwrap();
        // diffs -0.5, -0.4, -0.6, -0.3: mean -0.45, sd 0.129099
        assert_relative_eq!(s.t, -0.45 / (0.0166666667_f64 / 4.0).sqrt(), epsilon = 1e-6);
        assert_relative_eq!(s.dof, 3.0);
        assert!(paired_ttest(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn test_ttest_table() {
        let frame = frame_from(
            &[
                vec![1.0, 0.2],
                vec![1.1, -0.1],
                vec![0.9, 0.0],
                vec![-1.0, 0.1],
                vec![-1.1, -0.2],
                vec![-0.9, 0.05],
            ],
            &["CTRL", "CTRL", "CTRL", "TREAT", "TREAT", "TREAT"],
        );
        let levels = vec!["TREAT".to_string(), "CTRL".to_string()];
        let table = ttest(&frame, "group", &levels, false, CorrectionMethod::Bonferroni).unwrap();

        assert_eq!(table.level_a, "TREAT");
        assert_eq!(table.len(), 2);
        let m1 = table.get("m1").unwrap();
        assert_relative_eq!(m1.mean_a, -1.0, epsilon = 1e-12);
        assert!(m1.t < 0.0);
        assert!(m1.significant);
        assert_eq!(table.rows[0].metabolite, "m1");
    }

    #[test]
    fn test_complete_pairs() {
        let (a, b) = complete_pairs(&[f64::NAN, 2.0, 3.0], &[1.1, f64::NAN, 3.3]);
        assert_eq!(a, vec![3.0]);
        assert_eq!(b, vec![3.3]);
    }

    #[test]
    fn test_paired_drops_incomplete_pairs() {
        let nan = f64::NAN;
        let frame = frame_from(
            &[
                vec![nan, 1.0],
                vec![2.0, 2.0],
                vec![3.0, 3.0],
                vec![4.0, nan],
                vec![1.1, 1.5],
                vec![nan, 2.4],
                vec![3.3, 3.6],
                vec![nan, nan],
            ],
            &["A", "A", "A", "A", "B", "B", "B", "B"],
        );
        let levels = vec!["A".to_string(), "B".to_string()];
        let table = ttest(&frame, "group", &levels, true, CorrectionMethod::None).unwrap();

        // m1 has a single complete pair
        assert!(table.get("m1").is_none());
        let m2 = table.get("m2").unwrap();
        let expected = paired_ttest(&[1.0, 2.0, 3.0], &[1.5, 2.4, 3.6]).unwrap();
        assert_relative_eq!(m2.t, expected.t, epsilon = 1e-12);
        assert_relative_eq!(m2.dof, 2.0);
        assert_relative_eq!(m2.mean_a, 2.0, epsilon = 1e-12);
        assert_relative_eq!(m2.mean_b, 2.5, epsilon = 1e-12);

        // Independent mode keeps every present value
        let independent = ttest(&frame, "group", &levels, false, CorrectionMethod::None).unwrap();
        assert!(independent.get("m1").is_some());
    }

    #[test]
    fn test_paired_unequal_groups_rejected() {
        let frame = frame_from(
            &[vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]],
            &["A", "A", "A", "B", "B"],
        );
        let levels = vec!["A".to_string(), "B".to_string()];
        assert!(ttest(&frame, "group", &levels, true, CorrectionMethod::None).is_err());
        assert!(ttest(&frame, "group", &levels, false, CorrectionMethod::None).is_ok());
    }
}
