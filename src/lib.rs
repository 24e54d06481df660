//! Statistical analysis of untargeted metabolomics feature tables.
//!
//! The library takes a feature table (metabolite intensities across sample
//! files) and a sample metadata table through cleaning, blank removal,
//! imputation and scaling, then runs univariate and multivariate statistics
//! on the prepared data.
//!
//! # Overview
//!
//! - **data**: Core data structures (FeatureTable, Metadata, ScaledTable, result tables)
//! - **prepare**: Table cleaning, alignment, sample selection and metabolite index
//! - **filter**: Blank-based removal of background features
//! - **zero**: Limit of detection and imputation of zero intensities
//! - **normalize**: Column-wise normalization, scaling and merge with metadata
//! - **test**: ANOVA, Tukey, Kruskal-Wallis, Dunn and t-tests
//! - **correct**: Multiple testing correction
//! - **ordination**: PCA, distance matrices, PERMANOVA and PCoA
//! - **cluster**: Hierarchical clustering for heatmap ordering
//! - **profile**: Metadata levels, missing values and intensity distribution
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use metabostat::prelude::*;
//!
//! let features = FeatureTable::from_tsv("features.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//!
//! let prepared = Pipeline::new()
//!     .clean_tables()
//!     .select_samples("Sample_Type", "Sample")
//!     .remove_blanks("Sample_Type", "Blank", 0.3)
//!     .impute(Some(42))
//!     .scale_and_merge()
//!     .run(&features, &metadata)
//!     .unwrap();
//!
//! let results = anova(&prepared.frame, "Treatment", CorrectionMethod::Bonferroni).unwrap();
//! println!("{}", results);
//! ```

pub mod cluster;
pub mod correct;
pub mod data;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod ordination;
pub mod pipeline;
pub mod prepare;
pub mod profile;
pub mod test;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::cluster::{complete_linkage, order_for_heatmap, HeatmapMatrix, Linkage};
    pub use crate::correct::{adjust_pvalues, CorrectionMethod};
    pub use crate::data::{
        AnalysisFrame, ColumnRole, FeatureTable, Metadata, OmnibusTable, PairwiseTable,
        ScaledTable, TTestTable, Variable,
    };
    pub use crate::error::{MetaboError, Result};
    pub use crate::filter::{remove_blank_features, BlankFilterResult, DEFAULT_BLANK_CUTOFF};
    pub use crate::normalize::{
        normalize_column_wise, scale_and_merge, scale_and_merge_with_coverage, ScaleResult,
    };
    pub use crate::ordination::{
        pairwise_distances, pca, pcoa, permanova, permanova_pcoa, DistanceMatrix,
        DistanceMetric, OrdinationResult, PermanovaConfig, PermanovaResult,
    };
    pub use crate::pipeline::{
        run_standard, Pipeline, PipelineConfig, PipelineContext, PipelineStep, PreparedData,
    };
    pub use crate::prepare::{
        align, build_feature_index, clean_feature_table, clean_metadata, IndexOutcome,
        SamplePartition,
    };
    pub use crate::profile::{
        intensity_frequency, profile_missing, summarize_levels, LevelSummary, MissingProfile,
    };
    pub use crate::test::{anova, dunn, kruskal, ttest, tukey};
    pub use crate::zero::{cutoff_lod, impute, impute_seeded, impute_unseeded};
}
