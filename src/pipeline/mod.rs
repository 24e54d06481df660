//! Pipeline composition and execution for data preparation.

mod runner;

pub use runner::{
    run_standard, Pipeline, PipelineConfig, PipelineContext, PipelineStep, PreparedData,
};
