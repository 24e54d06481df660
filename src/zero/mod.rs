//! Handling of zero (below detection) intensities.

pub mod impute;
pub mod lod;

pub use impute::{impute, impute_seeded, impute_unseeded};
pub use lod::cutoff_lod;
