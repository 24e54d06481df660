//! Multiple testing correction.

pub mod pvalue;

pub use pvalue::{adjust_pvalues, CorrectionMethod};
