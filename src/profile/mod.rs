//! Descriptive profiles of the input tables.

mod levels;
mod missing;

pub use levels::{summarize_levels, ColumnLevels, LevelSummary};
pub use missing::{
    intensity_bin_edges, intensity_frequency, profile_missing, IntensityBin, IntensityFrequency,
    MissingProfile,
};
