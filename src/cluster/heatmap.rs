//! Heatmap ordering of the scaled table.

use super::linkage::{complete_linkage, Linkage};
use crate::data::ScaledTable;
use crate::error::Result;
use crate::ordination::{DistanceMatrix, DistanceMetric};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Scaled values with rows and columns in dendrogram order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapMatrix {
    /// Samples in row order.
    pub sample_ids: Vec<String>,
    /// Features in column order.
    pub feature_ids: Vec<String>,
    /// Values `[row][column]`, identical to the input cells.
    pub values: Vec<Vec<f64>>,
    /// Original sample index of each row.
    pub sample_order: Vec<usize>,
    /// Original feature index of each column.
    pub feature_order: Vec<usize>,
    pub sample_linkage: Linkage,
    pub feature_linkage: Linkage,
}

impl HeatmapMatrix {
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "sample\t{}", self.feature_ids.join("\t"))?;
        for (id, row) in self.sample_ids.iter().zip(&self.values) {
            let cells: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
            writeln!(writer, "{}\t{}", id, cells.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Cluster samples and features independently (complete linkage, Euclidean)
/// and reorder the table by both leaf orders.
pub fn order_for_heatmap(scaled: &ScaledTable) -> Result<HeatmapMatrix> {
    let sample_distances = DistanceMatrix::from_rows(
        scaled.matrix(),
        scaled.sample_ids().to_vec(),
        DistanceMetric::Euclidean,
    )?;
    let feature_distances = DistanceMatrix::from_rows(
        &scaled.matrix().transpose(),
        scaled.feature_ids().to_vec(),
        DistanceMetric::Euclidean,
    )?;

    let sample_linkage = complete_linkage(&sample_distances)?;
    let feature_linkage = complete_linkage(&feature_distances)?;
    let sample_order = sample_linkage.leaf_order();
    let feature_order = feature_linkage.leaf_order();

    let values = sample_order
        .iter()
        .map(|&i| feature_order.iter().map(|&j| scaled.get(i, j)).collect())
        .collect();
    log::debug!(
        "Heatmap ordering: {} samples x {} features",
        sample_order.len(),
        feature_order.len()
    );

    Ok(HeatmapMatrix {
        sample_ids: sample_order.iter().map(|&i| scaled.sample_ids()[i].clone()).collect(),
        feature_ids: feature_order.iter().map(|&j| scaled.feature_ids()[j].clone()).collect(),
        values,
        sample_order,
        feature_order,
        sample_linkage,
        feature_linkage,
    })
}
