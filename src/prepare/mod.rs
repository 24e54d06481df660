//! Preparation of raw tables: cleaning, alignment, sample selection and
//! metabolite index construction.

mod index;
pub mod partition;
pub mod tables;

pub use index::{build_feature_index, IndexOutcome, ROW_ID_COLUMN};
pub use partition::{rows_matching, SamplePartition};
pub use tables::{
    align, clean_feature_table, clean_metadata, normalize_label, AlignmentReport,
    PEAK_AREA_SUFFIX, SAMPLE_FILE_TOKEN,
};
