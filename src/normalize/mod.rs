//! Normalization and scaling of feature tables.
//!
//! - **TSS**: column-wise division by the sample total
//! - **Scale**: coverage filtering, standardization and merge with metadata

pub mod scale;
pub mod tss;

pub use scale::{
    missing_fraction, scale_and_merge, scale_and_merge_with_coverage, standardize, ScaleResult,
    ScaleSummary, MAX_MISSING_FRACTION,
};
pub use tss::normalize_column_wise;
