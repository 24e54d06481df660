//! Multiple testing correction of p-values.

use crate::error::{MetaboError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Multiple testing correction method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionMethod {
    /// Bonferroni: p * m.
    #[default]
    #[serde(rename = "bonf")]
    Bonferroni,
    /// Sidak: 1 - (1 - p)^m.
    #[serde(rename = "sidak")]
    Sidak,
    /// Holm step-down Bonferroni.
    #[serde(rename = "holm")]
    Holm,
    /// Benjamini-Hochberg false discovery rate.
    #[serde(rename = "fdr_bh")]
    FdrBh,
    /// Benjamini-Yekutieli false discovery rate (arbitrary dependence).
    #[serde(rename = "fdr_by")]
    FdrBy,
    /// No correction.
    #[serde(rename = "none")]
    None,
}

impl CorrectionMethod {
    /// All methods, in display order.
    pub const ALL: [CorrectionMethod; 6] = [
        CorrectionMethod::Bonferroni,
        CorrectionMethod::Sidak,
        CorrectionMethod::Holm,
        CorrectionMethod::FdrBh,
        CorrectionMethod::FdrBy,
        CorrectionMethod::None,
    ];

    /// Short name used in configuration files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bonferroni => "bonf",
            Self::Sidak => "sidak",
            Self::Holm => "holm",
            Self::FdrBh => "fdr_bh",
            Self::FdrBy => "fdr_by",
            Self::None => "none",
        }
    }
}

impl FromStr for CorrectionMethod {
    type Err = MetaboError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                MetaboError::InvalidParameter(format!(
                    "Unknown correction method '{}' (expected one of bonf, sidak, holm, fdr_bh, fdr_by, none)",
                    s
                ))
            })
    }
}

impl std::fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Adjust p-values for multiple testing.
///
/// Returns corrected values in the input order. `NaN` inputs stay `NaN` and
/// do not count towards the number of tests `m`. Every corrected value lies
/// in `[p, 1]`.
pub fn adjust_pvalues(p_values: &[f64], method: CorrectionMethod) -> Vec<f64> {
    let mut adjusted = vec![f64::NAN; p_values.len()];

    // Indices of testable p-values, ascending by p
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let m = order.len();
    if m == 0 {
        return adjusted;
    }
    let m_f64 = m as f64;

    match method {
        CorrectionMethod::None => {
            for &i in &order {
                adjusted[i] = p_values[i];
            }
        }
        CorrectionMethod::Bonferroni => {
            for &i in &order {
                adjusted[i] = (p_values[i] * m_f64).min(1.0);
            }
        }
        CorrectionMethod::Sidak => {
            for &i in &order {
                // 1 - (1 - p)^m, computed stably for small p
                let q = -(m_f64 * (-p_values[i]).ln_1p()).exp_m1();
                adjusted[i] = q.clamp(p_values[i], 1.0);
            }
        }
        CorrectionMethod::Holm => {
            let mut running_max = 0.0_f64;
            for (rank, &i) in order.iter().enumerate() {
                let q = ((m - rank) as f64 * p_values[i]).min(1.0);
                running_max = running_max.max(q);
                adjusted[i] = running_max;
            }
        }
        CorrectionMethod::FdrBh | CorrectionMethod::FdrBy => {
            let c_m = if method == CorrectionMethod::FdrBy {
                (1..=m).map(|k| 1.0 / k as f64).sum::<f64>()
            } else {
                1.0
            };
            // Work backwards from the largest p-value
            let mut running_min = 1.0_f64;
            for rank in (0..m).rev() {
                let i = order[rank];
                let q = p_values[i] * m_f64 * c_m / (rank + 1) as f64;
                running_min = running_min.min(q).min(1.0);
                adjusted[i] = running_min;
            }
        }
    }

    adjusted
}
