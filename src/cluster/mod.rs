//! Hierarchical clustering for heatmap ordering.

pub mod heatmap;
pub mod linkage;

pub use heatmap::{order_for_heatmap, HeatmapMatrix};
pub use linkage::{complete_linkage, Linkage, Merge};
