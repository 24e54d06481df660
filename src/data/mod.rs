//! Data structures for metabolomics statistics.

mod feature_table;
mod frame;
mod metadata;
mod result;

pub use feature_table::{FeatureTable, METABOLITE_COLUMN};
pub(crate) use feature_table::parse_intensity;
pub use frame::{AnalysisFrame, Groups, ScaledTable};
pub use metadata::{ColumnRole, Metadata, Variable, FILENAME_COLUMN, GROUPING_PREFIX};
pub use result::{
    OmnibusRow, OmnibusTable, PairwiseRow, PairwiseTable, TTestRow, TTestTable,
    SIGNIFICANCE_LEVEL,
};
