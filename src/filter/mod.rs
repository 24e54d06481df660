//! Feature filtering primitives.

pub mod blank;

pub use blank::{blank_ratio, remove_blank_features, BlankFilterResult, DEFAULT_BLANK_CUTOFF};
