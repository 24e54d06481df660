//! Pipeline runner for composing and executing data preparation steps.

use crate::data::{AnalysisFrame, FeatureTable, Metadata, ScaledTable};
use crate::error::{MetaboError, Result};
use crate::filter::{remove_blank_features, BlankFilterResult};
use crate::normalize::{
    normalize_column_wise, scale_and_merge, scale_and_merge_with_coverage, ScaleResult,
    ScaleSummary,
};
use crate::prepare::{
    align, build_feature_index, clean_feature_table, clean_metadata, AlignmentReport,
    IndexOutcome, SamplePartition,
};
use crate::zero::{cutoff_lod, impute_seeded, impute_unseeded};
use serde::{Deserialize, Serialize};

/// A step in the preparation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineStep {
    /// Build the metabolite index, clean both tables and align their samples.
    CleanTables,
    /// Keep only samples whose `attribute` equals `value`.
    SelectSamples { attribute: String, value: String },
    /// Remove background features using blanks chosen by `attribute == value`.
    RemoveBlanks {
        attribute: String,
        value: String,
        cutoff: f64,
    },
    /// Replace zeros with random values below the LOD (unseeded when `seed` is `None`).
    Impute { seed: Option<u64> },
    /// Divide each sample by its total intensity.
    NormalizeColumnWise,
    /// Coverage filter, standardize and join with metadata.
    ScaleAndMerge,
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(MetaboError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(MetaboError::from)
    }
}

/// Analysis-ready output of a pipeline run.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Standardized table (samples × features).
    pub scaled: ScaledTable,
    /// Scaled table joined with metadata.
    pub frame: AnalysisFrame,
    /// Limit of detection used for the coverage filter.
    pub cutoff_lod: f64,
    /// Feature table right before scaling.
    pub table: FeatureTable,
    pub blank_report: Option<BlankFilterResult>,
    pub alignment: Option<AlignmentReport>,
    pub scale_summary: ScaleSummary,
}

/// Builder for constructing and running preparation pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn clean_tables(mut self) -> Self {
        self.steps.push(PipelineStep::CleanTables);
        self
    }

    pub fn select_samples(mut self, attribute: &str, value: &str) -> Self {
        self.steps.push(PipelineStep::SelectSamples {
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Blanks are taken from the rows not selected as samples.
    pub fn remove_blanks(mut self, attribute: &str, value: &str, cutoff: f64) -> Self {
        self.steps.push(PipelineStep::RemoveBlanks {
            attribute: attribute.to_string(),
            value: value.to_string(),
            cutoff,
        });
        self
    }

    pub fn impute(mut self, seed: Option<u64>) -> Self {
        self.steps.push(PipelineStep::Impute { seed });
        self
    }

    pub fn normalize_column_wise(mut self) -> Self {
        self.steps.push(PipelineStep::NormalizeColumnWise);
        self
    }

    pub fn scale_and_merge(mut self) -> Self {
        self.steps.push(PipelineStep::ScaleAndMerge);
        self
    }

    /// Get the steps in this pipeline.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Run all steps and return the context with every stage output.
    pub fn execute(&self, features: &FeatureTable, metadata: &Metadata) -> Result<PipelineContext> {
        let mut context = PipelineContext::new(features.clone(), metadata.clone());
        log::info!("Running pipeline '{}' ({} steps)", self.name, self.steps.len());

        for (i, step) in self.steps.iter().enumerate() {
            context = context.apply(step).map_err(|e| {
                MetaboError::Pipeline(format!("Step {} ({:?}) failed: {}", i + 1, step, e))
            })?;
        }
        Ok(context)
    }

    /// Run the pipeline and return the analysis-ready data.
    pub fn run(&self, features: &FeatureTable, metadata: &Metadata) -> Result<PreparedData> {
        self.execute(features, metadata)?.finalize()
    }
}

/// Inputs and stage outputs of one pipeline run.
///
/// The raw inputs are never modified. Each step reads the outputs of the
/// previous ones and records its own.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    raw_features: FeatureTable,
    raw_metadata: Metadata,
    /// Cleaned and aligned tables (the raw ones until `CleanTables` runs).
    metadata: Metadata,
    aligned: FeatureTable,
    /// Working table carried from step to step.
    current: FeatureTable,
    alignment: Option<AlignmentReport>,
    partition: Option<SamplePartition>,
    blank_report: Option<BlankFilterResult>,
    cutoff_lod: Option<f64>,
    /// Table the LOD applies to, kept once intensities are normalized.
    coverage: Option<FeatureTable>,
    scale: Option<ScaleResult>,
}

impl PipelineContext {
    pub fn new(features: FeatureTable, metadata: Metadata) -> Self {
        Self {
            aligned: features.clone(),
            current: features.clone(),
            metadata: metadata.clone(),
            raw_features: features,
            raw_metadata: metadata,
            alignment: None,
            partition: None,
            blank_report: None,
            cutoff_lod: None,
            coverage: None,
            scale: None,
        }
    }

    pub fn raw_features(&self) -> &FeatureTable {
        &self.raw_features
    }

    pub fn raw_metadata(&self) -> &Metadata {
        &self.raw_metadata
    }

    /// Metadata after cleaning and alignment.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Feature table after cleaning and alignment, before sample selection.
    pub fn aligned_features(&self) -> &FeatureTable {
        &self.aligned
    }

    /// Working feature table after the last step.
    pub fn current(&self) -> &FeatureTable {
        &self.current
    }

    pub fn alignment(&self) -> Option<&AlignmentReport> {
        self.alignment.as_ref()
    }

    pub fn partition(&self) -> Option<&SamplePartition> {
        self.partition.as_ref()
    }

    pub fn blank_report(&self) -> Option<&BlankFilterResult> {
        self.blank_report.as_ref()
    }

    /// LOD of the table after sample selection and blank removal.
    pub fn cutoff_lod(&self) -> Option<f64> {
        self.cutoff_lod
    }

    pub fn scale(&self) -> Option<&ScaleResult> {
        self.scale.as_ref()
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        match step {
            PipelineStep::CleanTables => {
                let indexed = match build_feature_index(&self.raw_features) {
                    IndexOutcome::Success(table) => table,
                    IndexOutcome::NoMatchingColumns => self.raw_features.clone(),
                    IndexOutcome::Failed { reason } => {
                        log::warn!("Keeping original feature ids: {}", reason);
                        self.raw_features.clone()
                    }
                };
                let table = clean_feature_table(&indexed)?;
                if table.is_empty() {
                    return Err(MetaboError::EmptyData(
                        "No sample-file columns left after cleaning the feature table".to_string(),
                    ));
                }
                let metadata = clean_metadata(&self.raw_metadata)?;
                let (metadata, table, report) = align(&metadata, &table)?;
                if table.n_samples() == 0 {
                    return Err(MetaboError::SampleMismatch(
                        "Feature table and metadata share no sample".to_string(),
                    ));
                }
                self.metadata = metadata;
                self.aligned = table.clone();
                self.current = table;
                self.coverage = None;
                self.alignment = Some(report);
            }

            PipelineStep::SelectSamples { attribute, value } => {
                let partition = SamplePartition::select(&self.metadata, attribute, value)?;
                self.current = partition.sample_table(&self.current)?;
                self.cutoff_lod = Some(cutoff_lod(&self.current));
                self.coverage = None;
                self.partition = Some(partition);
            }

            PipelineStep::RemoveBlanks {
                attribute,
                value,
                cutoff,
            } => {
                let partition = self.partition.take().ok_or_else(|| {
                    MetaboError::Pipeline("Must select samples before removing blanks".to_string())
                })?;
                let partition = partition.with_blanks(&self.metadata, attribute, value)?;
                let blanks = partition.blank_table(&self.aligned)?;
                let result = remove_blank_features(&blanks, &self.current, *cutoff)?;
                self.current = result.table.clone();
                self.cutoff_lod = Some(cutoff_lod(&self.current));
                self.coverage = None;
                self.blank_report = Some(result);
                self.partition = Some(partition);
            }

            PipelineStep::Impute { seed } => {
                let lod = cutoff_lod(&self.current);
                self.current = match seed {
                    Some(seed) => impute_seeded(&self.current, lod, *seed)?,
                    None => impute_unseeded(&self.current, lod)?,
                };
                self.cutoff_lod.get_or_insert(lod);
            }

            PipelineStep::NormalizeColumnWise => {
                // Fractions are not on the LOD's scale
                if self.coverage.is_none() {
                    self.cutoff_lod.get_or_insert_with(|| cutoff_lod(&self.current));
                    self.coverage = Some(self.current.clone());
                }
                self.current = normalize_column_wise(&self.current)?;
            }

            PipelineStep::ScaleAndMerge => {
                let lod = match self.cutoff_lod {
                    Some(lod) => lod,
                    None => {
                        let lod = cutoff_lod(&self.current);
                        self.cutoff_lod = Some(lod);
                        lod
                    }
                };
                let scaled = match &self.coverage {
                    Some(coverage) => {
                        scale_and_merge_with_coverage(&self.current, coverage, &self.metadata, lod)?
                    }
                    None => scale_and_merge(&self.current, &self.metadata, lod)?,
                };
                self.scale = Some(scaled);
            }
        }
        Ok(self)
    }

    /// Collect the analysis-ready outputs.
    pub fn finalize(self) -> Result<PreparedData> {
        let scale = self.scale.ok_or_else(|| {
            MetaboError::Pipeline("Pipeline must include a ScaleAndMerge step".to_string())
        })?;
        let cutoff_lod = self.cutoff_lod.ok_or_else(|| {
            MetaboError::Pipeline("Limit of detection was not determined".to_string())
        })?;

        Ok(PreparedData {
            scaled: scale.scaled,
            frame: scale.frame,
            cutoff_lod,
            table: self.current,
            blank_report: self.blank_report,
            alignment: self.alignment,
            scale_summary: scale.summary,
        })
    }
}

/// Clean, select samples, optionally remove blanks, impute and scale.
///
/// `blanks` is `(attribute, value, cutoff)`.
pub fn run_standard(
    features: &FeatureTable,
    metadata: &Metadata,
    sample_attribute: &str,
    sample_value: &str,
    blanks: Option<(&str, &str, f64)>,
    seed: Option<u64>,
) -> Result<PreparedData> {
    let mut pipeline = Pipeline::new()
        .name("standard")
        .clean_tables()
        .select_samples(sample_attribute, sample_value);
    if let Some((attribute, value, cutoff)) = blanks {
        pipeline = pipeline.remove_blanks(attribute, value, cutoff);
    }
    pipeline.impute(seed).scale_and_merge().run(features, metadata)
}
