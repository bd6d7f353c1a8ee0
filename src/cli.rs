//! Command-line surface: maps plan inputs onto experiment settings and
//! drives the runner.

use crate::dataset::loader;
use crate::error::Error;
use crate::partition::ordered::{ExceptionSet, Partition};
use crate::pipeline::{ExperimentRunner, ExperimentSettings};
use crate::plan::{GenerationMode, PartitionPlan};
use crate::recovery;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Explore privacy/utility tradeoffs by classifying over attribute
/// partitions, with resumable multi-hour runs.
#[derive(Parser)]
#[command(name = "partwise")]
#[command(about = "Partition-wise privacy/utility exploration", long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a new experiment over a dataset
    Run(RunArgs),
    /// Resume an interrupted experiment from its recovery log
    Resume {
        /// Path to the recovery log of the interrupted run
        checkpoint: PathBuf,
        /// Override the dataset path recorded in the log
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Cleaned CSV dataset (header row, label column last unless --label)
    pub dataset: PathBuf,

    /// Name of the label column (default: last column)
    #[arg(long)]
    pub label: Option<String>,

    /// Partition size k; mutually exclusive with --tradeoff
    #[arg(short = 'k', long, conflicts_with = "tradeoff")]
    pub partition_size: Option<u32>,

    /// Tradeoff number in [-1, 1]: -1 favors privacy, 1 favors utility
    #[arg(short = 't', long)]
    pub tradeoff: Option<f64>,

    /// Vertical expense: fraction of the combination space to explore
    #[arg(long, default_value = "1.0")]
    pub vertical_expense: f64,

    /// Horizontal expense: fraction of rows each fragment keeps
    #[arg(long, default_value = "1.0")]
    pub horizontal_expense: f64,

    /// Privacy exception: comma-separated attribute indices; repeatable
    #[arg(long = "privacy-exception")]
    pub privacy_exceptions: Vec<String>,

    /// Utility exception: comma-separated attribute indices; repeatable
    #[arg(long = "utility-exception")]
    pub utility_exceptions: Vec<String>,

    /// Prefer random generation over dictionary enumeration
    #[arg(long)]
    pub random: bool,

    /// Cross-validation fold count
    #[arg(long, default_value = "10")]
    pub folds: usize,

    /// Learner to evaluate with (see the registry for available names)
    #[arg(long, default_value = "centroid")]
    pub learner: String,

    /// Result artifact path
    #[arg(short = 'o', long, default_value = "partwise-results.csv")]
    pub output: PathBuf,

    /// Recovery log path; omit to disable checkpointing
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let table = loader::load_csv(&args.dataset, args.label.as_deref())
        .context("failed to load dataset")?;
    let n = table.attribute_count();

    let partition_size = match (args.partition_size, args.tradeoff) {
        (Some(k), None) => k,
        (None, Some(t)) => PartitionPlan::size_from_tradeoff(n, t)?,
        (None, None) => bail!("one of --partition-size or --tradeoff is required"),
        (Some(_), Some(_)) => unreachable!("clap rejects the combination"),
    };

    let settings = ExperimentSettings {
        plan: PartitionPlan {
            attribute_count: n,
            partition_size,
            expense: args.vertical_expense,
            privacy_exceptions: parse_exceptions(&args.privacy_exceptions)?,
            utility_exceptions: parse_exceptions(&args.utility_exceptions)?,
            mode: if args.random {
                GenerationMode::Random
            } else {
                GenerationMode::Dictionary
            },
        },
        horizontal_expense: args.horizontal_expense,
        folds: args.folds,
        learner: args.learner,
        dataset_path: args.dataset,
        label: args.label,
        output_path: args.output,
        checkpoint_path: args.checkpoint,
    };

    let runner = ExperimentRunner::new(table, settings)?;
    let outcome = runner.run().await?;
    info!(
        results = outcome.stats.len(),
        "experiment finished; results in {}",
        outcome.artifact.display()
    );
    Ok(())
}

pub async fn resume(checkpoint: PathBuf, dataset: Option<PathBuf>) -> Result<()> {
    let state = recovery::log::read(&checkpoint).await?;
    let mut settings = ExperimentSettings::from_config_map(&state.header.config, checkpoint)?;
    if let Some(dataset) = dataset {
        settings.dataset_path = dataset;
    }
    let table = loader::load_csv(&settings.dataset_path, settings.label.as_deref())
        .context("failed to reload dataset for resumption")?;

    let runner = ExperimentRunner::new(table, settings)?;
    let outcome = runner.resume(state).await?;
    info!(
        results = outcome.stats.len(),
        "resumed experiment finished; results in {}",
        outcome.artifact.display()
    );
    Ok(())
}

/// Parse one `--*-exception` occurrence: comma-separated 1-based indices.
fn parse_exceptions(raw: &[String]) -> Result<ExceptionSet> {
    let mut members = Vec::with_capacity(raw.len());
    for spec in raw {
        let attrs = spec
            .split(',')
            .map(|field| {
                field.trim().parse::<u32>().map_err(|_| {
                    Error::Config(format!("exception {spec:?} is not a list of attribute indices"))
                })
            })
            .collect::<std::result::Result<Vec<u32>, Error>>()?;
        members.push(Partition::new(attrs)?);
    }
    Ok(ExceptionSet::new(members))
}
