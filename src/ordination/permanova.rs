//! PERMANOVA: permutational multivariate analysis of variance.
//!
//! Tests whether the centroids of sample groups differ, using only the
//! pairwise distance matrix. With `N` samples in `k` groups:
//!
//! - `S_T = sum_{i<j} d_ij^2 / N`
//! - `S_W = sum_{i<j, same group g} d_ij^2 / n_g`
//! - `F = ((S_T - S_W) / (k - 1)) / (S_W / (N - k))`
//!
//! The p-value is the share of label permutations whose pseudo-F is at least
//! the observed one, counting the observed labelling once.

use super::pcoa::pcoa;
use super::{pairwise_distances, DistanceMatrix, DistanceMetric, OrdinationResult};
use crate::data::{AnalysisFrame, Metadata};
use crate::error::{MetaboError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Permutation settings for PERMANOVA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermanovaConfig {
    /// Number of label permutations (0 skips the test and yields a `NaN` p-value).
    pub n_permutations: usize,
    /// Seed for the permutation generator.
    pub seed: u64,
}

impl Default for PermanovaConfig {
    fn default() -> Self {
        Self {
            n_permutations: 999,
            seed: 42,
        }
    }
}

impl PermanovaConfig {
    /// Fewer permutations for quick checks.
    pub fn quick() -> Self {
        Self {
            n_permutations: 99,
            ..Default::default()
        }
    }
}

/// Outcome of a PERMANOVA test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermanovaResult {
    pub attribute: String,
    pub metric: DistanceMetric,
    pub sample_size: usize,
    pub n_groups: usize,
    /// Pseudo-F statistic.
    pub test_statistic: f64,
    pub p_value: f64,
    pub n_permutations: usize,
    /// `1 - SS_W / SS_T`.
    pub r_squared: f64,
}

impl PermanovaResult {
    /// Write as a two-column statistic/value table.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "statistic\tvalue")?;
        writeln!(writer, "method name\tPERMANOVA")?;
        writeln!(writer, "test statistic name\tpseudo-F")?;
        writeln!(writer, "attribute\t{}", self.attribute)?;
        writeln!(writer, "distance metric\t{}", self.metric)?;
        writeln!(writer, "sample size\t{}", self.sample_size)?;
        writeln!(writer, "number of groups\t{}", self.n_groups)?;
        writeln!(writer, "test statistic\t{:.6}", self.test_statistic)?;
        writeln!(writer, "p-value\t{:.6}", self.p_value)?;
        writeln!(writer, "number of permutations\t{}", self.n_permutations)?;
        writeln!(writer, "R2\t{:.6}", self.r_squared)?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for PermanovaResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PERMANOVA on '{}' ({} distance)", self.attribute, self.metric)?;
        writeln!(f, "  Samples: {}, groups: {}", self.sample_size, self.n_groups)?;
        writeln!(f, "  pseudo-F: {:.4}", self.test_statistic)?;
        writeln!(f, "  p-value:  {:.4} ({} permutations)", self.p_value, self.n_permutations)?;
        writeln!(f, "  R2:       {:.4}", self.r_squared)?;
        Ok(())
    }
}

/// Squared distances of the upper triangle, row-major.
fn squared_condensed(distances: &DistanceMatrix) -> Vec<f64> {
    distances.condensed().into_iter().map(|d| d * d).collect()
}

/// Within-group sum `S_W` for a labelling.
fn within_sum(squared: &[f64], labels: &[usize], group_sizes: &[usize]) -> f64 {
    let n = labels.len();
    let mut idx = 0;
    let mut s_w = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            if labels[i] == labels[j] {
                s_w += squared[idx] / group_sizes[labels[i]] as f64;
            }
            idx += 1;
        }
    }
    s_w
}

fn pseudo_f(s_t: f64, s_w: f64, n: usize, k: usize) -> f64 {
    ((s_t - s_w) / (k - 1) as f64) / (s_w / (n - k) as f64)
}

/// PERMANOVA on group labels given as indices `0..n_groups`.
fn permanova_labels(
    distances: &DistanceMatrix,
    labels: &[usize],
    n_groups: usize,
    config: &PermanovaConfig,
) -> (f64, f64, f64) {
    let n = labels.len();
    let mut group_sizes = vec![0usize; n_groups];
    for &l in labels {
        group_sizes[l] += 1;
    }

    let squared = squared_condensed(distances);
    let s_t = squared.iter().sum::<f64>() / n as f64;
    let s_w = within_sum(&squared, labels, &group_sizes);
    let observed = pseudo_f(s_t, s_w, n, n_groups);
    let r_squared = 1.0 - s_w / s_t;

    if config.n_permutations == 0 {
        return (observed, f64::NAN, r_squared);
    }

    let n_extreme: usize = (0..config.n_permutations)
        .into_par_iter()
        .map(|perm_idx| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(perm_idx as u64));
            let mut permuted = labels.to_vec();
            permuted.shuffle(&mut rng);
            let f = pseudo_f(s_t, within_sum(&squared, &permuted, &group_sizes), n, n_groups);
            usize::from(f >= observed)
        })
        .sum();

    let p_value = (n_extreme as f64 + 1.0) / (config.n_permutations as f64 + 1.0);
    (observed, p_value, r_squared)
}

/// Test whether the levels of `attribute` separate samples in `distances`.
///
/// Samples without metadata or with a missing level are left out (with a
/// warning) before the test.
///
/// # Errors
/// `InvalidAttribute` if `attribute` is not an admissible grouping column,
/// `InvalidParameter` if every remaining sample forms its own group.
pub fn permanova(
    distances: &DistanceMatrix,
    metadata: &Metadata,
    attribute: &str,
    config: &PermanovaConfig,
) -> Result<PermanovaResult> {
    metadata.require_grouping(attribute)?;

    let mut keep = Vec::new();
    let mut level_of = Vec::new();
    for (i, id) in distances.ids().iter().enumerate() {
        if let Some(level) = metadata.get(id, attribute).and_then(|v| v.level()) {
            keep.push(i);
            level_of.push(level);
        }
    }
    let subset;
    let distances = if keep.len() < distances.n() {
        log::warn!(
            "PERMANOVA: {} samples without a '{}' level were left out",
            distances.n() - keep.len(),
            attribute
        );
        subset = distances.subset(&keep)?;
        &subset
    } else {
        distances
    };

    let mut levels = level_of.clone();
    levels.sort();
    levels.dedup();
    let labels: Vec<usize> = level_of
        .iter()
        .filter_map(|l| levels.binary_search(l).ok())
        .collect();
    let (n, k) = (labels.len(), levels.len());
    if k < 2 {
        return Err(MetaboError::InvalidAttribute {
            column: attribute.to_string(),
            reason: "fewer than two groups among the compared samples".to_string(),
        });
    }
    if k == n {
        return Err(MetaboError::InvalidParameter(format!(
            "Every sample has its own '{}' level; PERMANOVA needs replicated groups",
            attribute
        )));
    }

    let (test_statistic, p_value, r_squared) = permanova_labels(distances, &labels, k, config);
    log::info!(
        "PERMANOVA on '{}': pseudo-F {:.4}, p {:.4}, R2 {:.4}",
        attribute,
        test_statistic,
        p_value,
        r_squared
    );

    Ok(PermanovaResult {
        attribute: attribute.to_string(),
        metric: distances.metric(),
        sample_size: n,
        n_groups: k,
        test_statistic,
        p_value,
        n_permutations: config.n_permutations,
        r_squared,
    })
}

/// PERMANOVA and PCoA computed from one distance matrix.
#[derive(Debug, Clone)]
pub struct PermanovaPcoa {
    pub distances: DistanceMatrix,
    pub permanova: PermanovaResult,
    pub pcoa: OrdinationResult,
}

/// Compute the sample distance matrix once and run both PERMANOVA and PCoA on it.
pub fn permanova_pcoa(
    frame: &AnalysisFrame,
    attribute: &str,
    metric: DistanceMetric,
    n_axes: usize,
    config: &PermanovaConfig,
) -> Result<PermanovaPcoa> {
    let distances = pairwise_distances(frame.scaled(), metric)?;
    let permanova = permanova(&distances, frame.metadata(), attribute, config)?;
    let pcoa = pcoa(&distances, n_axes)?;
    Ok(PermanovaPcoa {
        distances,
        permanova,
        pcoa,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnRole;
    use crate::test::fixtures::frame_from;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn line_distances(points: &[f64]) -> DistanceMatrix {
        DistanceMatrix::from_rows(
            &DMatrix::from_column_slice(points.len(), 1, points),
            (1..=points.len()).map(|i| format!("s{:02}", i)).collect(),
            DistanceMetric::Euclidean,
        )
        .unwrap()
    }

    fn grouping(groups: &[&str]) -> Metadata {
        Metadata::new((1..=groups.len()).map(|i| format!("s{:02}", i)).collect())
            .unwrap()
            .add_text_column("group", ColumnRole::Grouping, groups)
            .unwrap()
    }

    #[test]
    fn test_pseudo_f_by_hand() {
        // Groups {0, 1} and {4, 5}: S_T = 68 / 4, S_W = 1/2 + 1/2
        let dm = line_distances(&[0.0, 1.0, 4.0, 5.0]);
        let md = grouping(&["A", "A", "B", "B"]);
        let result = permanova(&dm, &md, "group", &PermanovaConfig::default()).unwrap();

        let s_t = (1.0 + 16.0 + 25.0 + 9.0 + 16.0 + 1.0) / 4.0;
        let s_w = 1.0;
        assert_relative_eq!(result.test_statistic, (s_t - s_w) / (s_w / 2.0), epsilon = 1e-10);
        assert_relative_eq!(result.r_squared, 1.0 - s_w / s_t, epsilon = 1e-10);
        assert_eq!(result.sample_size, 4);
        assert_eq!(result.n_groups, 2);
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }

    #[test]
    fn test_seeded_permutations_reproducible() {
        let dm = line_distances(&[0.0, 0.5, 1.0, 1.2, 5.0, 5.3, 6.0, 6.1]);
        let md = grouping(&["A", "A", "A", "A", "B", "B", "B", "B"]);
        let config = PermanovaConfig {
            n_permutations: 199,
            seed: 7,
        };
        let a = permanova(&dm, &md, "group", &config).unwrap();
        let b = permanova(&dm, &md, "group", &config).unwrap();
        assert_eq!(a.p_value, b.p_value);
        // 70 labelings, 2 of them as extreme as observed
        assert!(a.p_value < 0.1);
    }

    #[test]
    fn test_no_permutations() {
        let dm = line_distances(&[0.0, 1.0, 4.0, 5.0]);
        let md = grouping(&["A", "A", "B", "B"]);
        let config = PermanovaConfig {
            n_permutations: 0,
            seed: 1,
        };
        let result = permanova(&dm, &md, "group", &config).unwrap();
        assert!(result.p_value.is_nan());
        assert!(result.test_statistic.is_finite());
    }

    #[test]
    fn test_unique_groups_rejected() {
        let dm = line_distances(&[0.0, 1.0, 4.0]);
        let md = grouping(&["A", "B", "C"]);
        assert!(permanova(&dm, &md, "group", &PermanovaConfig::quick()).is_err());
    }

    #[test]
    fn test_permanova_pcoa_shares_distances() {
        let frame = frame_from(
            &[
                vec![1.0, 0.9],
                vec![1.1, 1.2],
                vec![0.8, 1.0],
                vec![-1.0, -0.9],
                vec![-1.2, -1.1],
                vec![-0.9, -1.0],
            ],
            &["A", "A", "A", "B", "B", "B"],
        );
        let out = permanova_pcoa(
            &frame,
            "group",
            DistanceMetric::Euclidean,
            2,
            &PermanovaConfig::quick(),
        )
        .unwrap();

        assert_eq!(out.distances.ids(), frame.sample_ids());
        assert_eq!(out.pcoa.sample_ids, out.distances.ids());
        assert_eq!(out.permanova.sample_size, out.distances.n());
        assert!(out.permanova.r_squared > 0.9);
        assert_eq!(out.pcoa.method, "PCoA");
    }
}
