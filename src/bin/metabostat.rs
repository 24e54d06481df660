//! metabostat - statistics for untargeted metabolomics
//!
//! Command-line interface for data preparation, univariate tests and
//! multivariate analysis of feature tables.

use clap::{Args, Parser, Subcommand};
use metabostat::cluster::order_for_heatmap;
use metabostat::correct::CorrectionMethod;
use metabostat::data::{FeatureTable, Metadata};
use metabostat::error::Result;
use metabostat::filter::DEFAULT_BLANK_CUTOFF;
use metabostat::ordination::{pca, permanova_pcoa, DistanceMetric, PermanovaConfig};
use metabostat::pipeline::{Pipeline, PipelineConfig, PreparedData};
use metabostat::profile::{intensity_frequency, profile_missing, summarize_levels};
use metabostat::test::{anova, dunn, kruskal, ttest, tukey};
use std::path::{Path, PathBuf};

/// Statistics for untargeted metabolomics
#[derive(Parser)]
#[command(name = "metabostat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Input tables and how to prepare them.
#[derive(Args)]
struct InputArgs {
    /// Feature table (TSV, or CSV by extension)
    #[arg(short, long)]
    features: PathBuf,

    /// Sample metadata (TSV, or CSV by extension)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Pipeline configuration YAML; overrides the options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Metadata attribute identifying samples
    #[arg(long, default_value = "Sample_Type")]
    sample_attribute: String,

    /// Value of the sample attribute marking analysed samples
    #[arg(long, default_value = "Sample")]
    sample_value: String,

    /// Value marking blanks (no blank removal when absent)
    #[arg(long)]
    blank_value: Option<String>,

    /// Attribute identifying blanks (defaults to the sample attribute)
    #[arg(long)]
    blank_attribute: Option<String>,

    /// Blank/sample intensity ratio cutoff
    #[arg(long, default_value_t = DEFAULT_BLANK_CUTOFF)]
    blank_cutoff: f64,

    /// Seed for imputation (unseeded when absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Normalize each sample by its total intensity before scaling
    #[arg(long)]
    normalize: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, filter, impute and scale the input tables
    Prepare {
        #[command(flatten)]
        input: InputArgs,

        /// Output path for the scaled table TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Optional JSON summary of the preparation
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// One-way ANOVA per metabolite, with optional Tukey follow-up
    Anova {
        #[command(flatten)]
        input: InputArgs,

        /// Grouping attribute to test
        #[arg(short, long)]
        attribute: String,

        /// Correction method: bonf, sidak, holm, fdr_bh, fdr_by, none
        #[arg(long, default_value = "bonf")]
        correction: String,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Two levels to compare on significant metabolites
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        levels: Option<Vec<String>>,

        /// Output path for the pairwise results TSV
        #[arg(long)]
        pairwise_output: Option<PathBuf>,
    },

    /// Kruskal-Wallis per metabolite, with optional Dunn follow-up
    Kruskal {
        #[command(flatten)]
        input: InputArgs,

        /// Grouping attribute to test
        #[arg(short, long)]
        attribute: String,

        /// Correction method: bonf, sidak, holm, fdr_bh, fdr_by, none
        #[arg(long, default_value = "bonf")]
        correction: String,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Two levels to compare on significant metabolites
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        levels: Option<Vec<String>>,

        /// Output path for the pairwise results TSV
        #[arg(long)]
        pairwise_output: Option<PathBuf>,
    },

    /// t-test per metabolite between two levels
    Ttest {
        #[command(flatten)]
        input: InputArgs,

        /// Grouping attribute
        #[arg(short, long)]
        attribute: String,

        /// Levels to compare (A, B)
        #[arg(long, num_args = 2, value_names = ["A", "B"], required = true)]
        levels: Vec<String>,

        /// Paired test (samples paired by sorted id within each group)
        #[arg(long)]
        paired: bool,

        /// Correction method: bonf, sidak, holm, fdr_bh, fdr_by, none
        #[arg(long, default_value = "bonf")]
        correction: String,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Principal component analysis of the scaled table
    Pca {
        #[command(flatten)]
        input: InputArgs,

        /// Number of components
        #[arg(short = 'n', long, default_value = "2")]
        components: usize,

        /// Output path for sample scores TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for explained variance TSV
        #[arg(long)]
        variance_output: Option<PathBuf>,
    },

    /// PERMANOVA and PCoA on one sample distance matrix
    Permanova {
        #[command(flatten)]
        input: InputArgs,

        /// Grouping attribute
        #[arg(short, long)]
        attribute: String,

        /// Distance metric (euclidean, canberra, chebyshev, correlation,
        /// cosine, hamming, jaccard, matching, minkowski, seuclidean)
        #[arg(long, default_value = "euclidean")]
        metric: String,

        /// Number of permutations
        #[arg(long, default_value = "999")]
        permutations: usize,

        /// Permutation seed
        #[arg(long, default_value = "42")]
        permutation_seed: u64,

        /// Number of PCoA axes
        #[arg(long, default_value = "2")]
        axes: usize,

        /// Output path for the PERMANOVA TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for PCoA coordinates TSV
        #[arg(long)]
        pcoa_output: Option<PathBuf>,

        /// Output path for the distance matrix TSV
        #[arg(long)]
        distances_output: Option<PathBuf>,
    },

    /// Scaled table reordered by hierarchical clustering
    Heatmap {
        #[command(flatten)]
        input: InputArgs,

        /// Output path for the reordered table TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarize metadata levels and the feature table
    Levels {
        /// Sample metadata
        #[arg(short, long)]
        metadata: PathBuf,

        /// Feature table, to profile missing values and intensities
        #[arg(short, long)]
        features: Option<PathBuf>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate an example pipeline configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "pipeline.yaml")]
        output: PathBuf,
    },
}

fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Prepare {
            input,
            output,
            summary,
        } => cmd_prepare(&input, &output, summary.as_deref()),

        Commands::Anova {
            input,
            attribute,
            correction,
            output,
            levels,
            pairwise_output,
        } => cmd_omnibus(
            "anova",
            &input,
            &attribute,
            &correction,
            &output,
            levels.as_deref(),
            pairwise_output.as_deref(),
        ),

        Commands::Kruskal {
            input,
            attribute,
            correction,
            output,
            levels,
            pairwise_output,
        } => cmd_omnibus(
            "kruskal",
            &input,
            &attribute,
            &correction,
            &output,
            levels.as_deref(),
            pairwise_output.as_deref(),
        ),

        Commands::Ttest {
            input,
            attribute,
            levels,
            paired,
            correction,
            output,
        } => cmd_ttest(&input, &attribute, &levels, paired, &correction, &output),

        Commands::Pca {
            input,
            components,
            output,
            variance_output,
        } => cmd_pca(&input, components, &output, variance_output.as_deref()),

        Commands::Permanova {
            input,
            attribute,
            metric,
            permutations,
            permutation_seed,
            axes,
            output,
            pcoa_output,
            distances_output,
        } => cmd_permanova(
            &input,
            &attribute,
            &metric,
            &PermanovaConfig {
                n_permutations: permutations,
                seed: permutation_seed,
            },
            axes,
            &output,
            pcoa_output.as_deref(),
            distances_output.as_deref(),
        ),

        Commands::Heatmap { input, output } => cmd_heatmap(&input, &output),

        Commands::Levels {
            metadata,
            features,
            format,
        } => cmd_levels(&metadata, features.as_deref(), &format),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn read_features(path: &Path) -> Result<FeatureTable> {
    if is_csv(path) {
        FeatureTable::from_csv(path)
    } else {
        FeatureTable::from_tsv(path)
    }
}

fn read_metadata(path: &Path) -> Result<Metadata> {
    if is_csv(path) {
        Metadata::from_csv(path)
    } else {
        Metadata::from_tsv(path)
    }
}

impl InputArgs {
    fn pipeline(&self) -> Result<Pipeline> {
        if let Some(config_path) = &self.config {
            eprintln!("Loading pipeline configuration from {:?}...", config_path);
            let config_str = std::fs::read_to_string(config_path)?;
            let config = PipelineConfig::from_yaml(&config_str)?;
            return Ok(Pipeline::from_config(&config));
        }

        let mut pipeline = Pipeline::new()
            .name("cli")
            .clean_tables()
            .select_samples(&self.sample_attribute, &self.sample_value);
        if let Some(blank_value) = &self.blank_value {
            let attribute = self
                .blank_attribute
                .as_deref()
                .unwrap_or(&self.sample_attribute);
            pipeline = pipeline.remove_blanks(attribute, blank_value, self.blank_cutoff);
        }
        pipeline = pipeline.impute(self.seed);
        if self.normalize {
            pipeline = pipeline.normalize_column_wise();
        }
        Ok(pipeline.scale_and_merge())
    }

    /// Load both tables and run the preparation pipeline.
    fn prepare(&self) -> Result<PreparedData> {
        eprintln!("Loading data...");
        let features = read_features(&self.features)?;
        let metadata = read_metadata(&self.metadata)?;
        eprintln!(
            "Loaded {} features x {} columns, {} metadata rows",
            features.n_features(),
            features.n_samples(),
            metadata.n_samples()
        );

        let prepared = self.pipeline()?.run(&features, &metadata)?;
        eprintln!(
            "Prepared {} metabolites x {} samples (LOD {})",
            prepared.scaled.n_features(),
            prepared.scaled.n_samples(),
            prepared.cutoff_lod
        );
        Ok(prepared)
    }
}

fn cmd_prepare(input: &InputArgs, output_path: &Path, summary_path: Option<&Path>) -> Result<()> {
    let prepared = input.prepare()?;

    if let Some(alignment) = &prepared.alignment {
        eprint!("{}", alignment);
    }
    if let Some(report) = &prepared.blank_report {
        eprint!("{}", report);
    }

    eprintln!("Writing scaled table to {:?}...", output_path);
    prepared.scaled.to_tsv(output_path)?;

    if let Some(path) = summary_path {
        let summary = serde_json::json!({
            "n_metabolites": prepared.scaled.n_features(),
            "n_samples": prepared.scaled.n_samples(),
            "cutoff_lod": prepared.cutoff_lod,
            "alignment": prepared.alignment,
            "blank_removal": prepared.blank_report,
            "scaling": prepared.scale_summary,
        });
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        eprintln!("Wrote summary to {:?}", path);
    }

    Ok(())
}

fn cmd_omnibus(
    test: &str,
    input: &InputArgs,
    attribute: &str,
    correction: &str,
    output_path: &Path,
    levels: Option<&[String]>,
    pairwise_path: Option<&Path>,
) -> Result<()> {
    let correction: CorrectionMethod = correction.parse()?;
    let prepared = input.prepare()?;

    eprintln!("Running {} on '{}' ({} correction)...", test, attribute, correction);
    let results = match test {
        "kruskal" => kruskal(&prepared.frame, attribute, correction)?,
        _ => anova(&prepared.frame, attribute, correction)?,
    };

    eprintln!("Writing results to {:?}...", output_path);
    results.to_tsv(output_path)?;
    eprintln!("Done! {} metabolites tested", results.len());
    eprintln!("  {} significant", results.significant().len());

    if let Some(levels) = levels {
        let pairwise = match test {
            "kruskal" => dunn(&prepared.frame, &results, levels, correction)?,
            _ => tukey(&prepared.frame, &results, levels, correction)?,
        };
        eprint!("{}", pairwise);
        if let Some(path) = pairwise_path {
            pairwise.to_tsv(path)?;
            eprintln!("Wrote pairwise results to {:?}", path);
        }
    }

    Ok(())
}

fn cmd_ttest(
    input: &InputArgs,
    attribute: &str,
    levels: &[String],
    paired: bool,
    correction: &str,
    output_path: &Path,
) -> Result<()> {
    let correction: CorrectionMethod = correction.parse()?;
    let prepared = input.prepare()?;

    let results = ttest(&prepared.frame, attribute, levels, paired, correction)?;
    eprintln!("Writing results to {:?}...", output_path);
    results.to_tsv(output_path)?;
    eprint!("{}", results);

    Ok(())
}

fn cmd_pca(
    input: &InputArgs,
    components: usize,
    output_path: &Path,
    variance_path: Option<&Path>,
) -> Result<()> {
    let prepared = input.prepare()?;
    let result = pca(&prepared.scaled, components)?;

    result.to_tsv(output_path)?;
    if let Some(path) = variance_path {
        result.variance_to_tsv(path)?;
    }
    eprint!("{}", result);

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_permanova(
    input: &InputArgs,
    attribute: &str,
    metric: &str,
    config: &PermanovaConfig,
    axes: usize,
    output_path: &Path,
    pcoa_path: Option<&Path>,
    distances_path: Option<&Path>,
) -> Result<()> {
    let metric: DistanceMetric = metric.parse()?;
    let prepared = input.prepare()?;

    eprintln!(
        "Running PERMANOVA on '{}' ({} distance, {} permutations)...",
        attribute, metric, config.n_permutations
    );
    let result = permanova_pcoa(&prepared.frame, attribute, metric, axes, config)?;

    result.permanova.to_tsv(output_path)?;
    if let Some(path) = pcoa_path {
        result.pcoa.to_tsv(path)?;
    }
    if let Some(path) = distances_path {
        result.distances.to_tsv(path)?;
    }
    eprint!("{}", result.permanova);
    eprint!("{}", result.pcoa);

    Ok(())
}

fn cmd_heatmap(input: &InputArgs, output_path: &Path) -> Result<()> {
    let prepared = input.prepare()?;
    let heatmap = order_for_heatmap(&prepared.scaled)?;

    eprintln!("Writing reordered table to {:?}...", output_path);
    heatmap.to_tsv(output_path)?;

    Ok(())
}

fn cmd_levels(metadata_path: &Path, features_path: Option<&Path>, format: &str) -> Result<()> {
    let metadata = read_metadata(metadata_path)?;
    let levels = summarize_levels(&metadata);

    let features = features_path.map(read_features).transpose()?;
    let tables = features.as_ref().map(|ft| {
        let lod = metabostat::zero::cutoff_lod(ft);
        (profile_missing(ft, lod), intensity_frequency(ft))
    });

    match format {
        "json" => {
            let profile = serde_json::json!({
                "levels": levels,
                "missing": tables.as_ref().map(|(m, _)| m),
                "intensity_frequency": tables.as_ref().map(|(_, f)| f),
            });
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        _ => {
            print!("{}", levels);
            if let Some((missing, frequency)) = &tables {
                println!();
                print!("{}", missing);
                println!();
                println!("Intensity frequency:");
                for bin in &frequency.bins {
                    println!("  ({:e}, {:e}]: {}", bin.lower, bin.upper, bin.count);
                }
            }
        }
    }

    Ok(())
}

/// Generate example pipeline config
fn cmd_example(output_path: &Path) -> Result<()> {
    let pipeline = Pipeline::new()
        .name("example-cleanup")
        .clean_tables()
        .select_samples("Sample_Type", "Sample")
        .remove_blanks("Sample_Type", "Blank", DEFAULT_BLANK_CUTOFF)
        .impute(Some(42))
        .scale_and_merge();

    let config = pipeline.to_config(Some(
        "Example data cleanup: blank removal, imputation and scaling",
    ));
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example pipeline to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
