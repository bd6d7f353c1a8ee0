//! Experiment pipeline.
//!
//! Per experiment the state machine is `Planning -> Partitioning ->
//! Learning -> Writing -> Done | Aborted`. The partitioning stage feeds a
//! bounded ready queue; the learning stage drains it into a second bounded
//! worker pool; the stats collector persists results in submission order.

mod collector;
mod learning;
mod partitioning;
mod progress;

use crate::classify::registry::default_registry;
use crate::classify::{CrossValidator, EvaluationOptions, Oracle};
use crate::dataset::{FragmentBuilder, Table};
use crate::error::{Error, Result};
use crate::partition::ordered::{ExceptionSet, Partition};
use crate::partition::orchestrator::PartitionOrchestrator;
use crate::plan::{GenerationMode, PartitionPlan};
use crate::recovery::{self, ExperimentHeader, Manifest, RecoveredState, RecoveryWriter, ResumePoint};
use crate::report;
use crate::stats::Stats;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// Capacity of the cross-stage ready queue; producers block when it fills.
const READY_QUEUE_CAPACITY: usize = 1000;
/// Stage monitor polling interval.
const MONITOR_INTERVAL: Duration = Duration::from_millis(1500);

/// Coarse experiment lifecycle, used for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentPhase {
    Planning,
    Partitioning,
    Learning,
    Writing,
    Done,
    Aborted,
}

impl fmt::Display for ExperimentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExperimentPhase::Planning => "planning",
            ExperimentPhase::Partitioning => "partitioning",
            ExperimentPhase::Learning => "learning",
            ExperimentPhase::Writing => "writing",
            ExperimentPhase::Done => "done",
            ExperimentPhase::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// External cancellation signal shared with every stage.
#[derive(Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Everything one experiment needs beyond the dataset itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSettings {
    pub plan: PartitionPlan,
    /// Fraction of rows each fragment keeps.
    pub horizontal_expense: f64,
    /// Cross-validation fold count.
    pub folds: usize,
    /// Registry name of the learner to evaluate with.
    pub learner: String,
    pub dataset_path: PathBuf,
    pub label: Option<String>,
    pub output_path: PathBuf,
    /// Recovery log location; `None` disables checkpointing.
    pub checkpoint_path: Option<PathBuf>,
}

impl ExperimentSettings {
    pub fn validate(&self) -> Result<()> {
        self.plan.validate()?;
        if !(self.horizontal_expense > 0.0 && self.horizontal_expense <= 1.0) {
            return Err(Error::Config(format!(
                "horizontal expense must be in (0, 1], got {}",
                self.horizontal_expense
            )));
        }
        if self.folds < 2 {
            return Err(Error::Config(format!(
                "fold count must be >= 2, got {}",
                self.folds
            )));
        }
        default_registry().resolve(&self.learner)?;
        Ok(())
    }

    /// Flatten into the key/value pairs stored in the recovery-log header.
    pub fn to_config_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("n".into(), self.plan.attribute_count.to_string());
        map.insert("k".into(), self.plan.partition_size.to_string());
        map.insert("expense".into(), self.plan.expense.to_string());
        map.insert("mode".into(), self.plan.mode.to_string());
        map.insert(
            "privacy_exceptions".into(),
            serde_json::to_string(&self.plan.privacy_exceptions).unwrap_or_default(),
        );
        map.insert(
            "utility_exceptions".into(),
            serde_json::to_string(&self.plan.utility_exceptions).unwrap_or_default(),
        );
        map.insert(
            "horizontal_expense".into(),
            self.horizontal_expense.to_string(),
        );
        map.insert("folds".into(), self.folds.to_string());
        map.insert("learner".into(), self.learner.clone());
        map.insert("dataset".into(), self.dataset_path.display().to_string());
        if let Some(label) = &self.label {
            map.insert("label".into(), label.clone());
        }
        map.insert("output".into(), self.output_path.display().to_string());
        map
    }

    /// Rebuild settings from a recovered header; the checkpoint path is the
    /// file the header was read from.
    pub fn from_config_map(
        config: &BTreeMap<String, String>,
        checkpoint_path: PathBuf,
    ) -> Result<Self> {
        fn get<'a>(config: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
            config
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| Error::Recovery(format!("header is missing {key:?}")))
        }
        fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Recovery(format!("header {key:?} is malformed: {value:?}")))
        }

        let plan = PartitionPlan {
            attribute_count: parse(get(config, "n")?, "n")?,
            partition_size: parse(get(config, "k")?, "k")?,
            expense: parse(get(config, "expense")?, "expense")?,
            privacy_exceptions: serde_json::from_str::<ExceptionSet>(get(
                config,
                "privacy_exceptions",
            )?)
            .map_err(|e| Error::Recovery(format!("header privacy exceptions: {e}")))?,
            utility_exceptions: serde_json::from_str::<ExceptionSet>(get(
                config,
                "utility_exceptions",
            )?)
            .map_err(|e| Error::Recovery(format!("header utility exceptions: {e}")))?,
            mode: parse(get(config, "mode")?, "mode")?,
        };
        Ok(Self {
            plan,
            horizontal_expense: parse(get(config, "horizontal_expense")?, "horizontal_expense")?,
            folds: parse(get(config, "folds")?, "folds")?,
            learner: get(config, "learner")?.to_string(),
            dataset_path: PathBuf::from(get(config, "dataset")?),
            label: config.get("label").cloned(),
            output_path: PathBuf::from(get(config, "output")?),
            checkpoint_path: Some(checkpoint_path),
        })
    }
}

/// Final product of a run: stats sorted non-increasing by accuracy, and the
/// artifact they were written to.
pub struct ExperimentOutcome {
    pub stats: Vec<Stats>,
    pub artifact: PathBuf,
}

/// Drives one experiment from plan to artifact.
pub struct ExperimentRunner {
    table: Arc<Table>,
    settings: ExperimentSettings,
    abort: AbortHandle,
}

impl ExperimentRunner {
    pub fn new(table: Table, settings: ExperimentSettings) -> Result<Self> {
        settings.validate()?;
        if table.attribute_count() != settings.plan.attribute_count {
            return Err(Error::Config(format!(
                "plan expects {} attributes but the dataset has {}",
                settings.plan.attribute_count,
                table.attribute_count()
            )));
        }
        Ok(Self {
            table: Arc::new(table),
            settings,
            abort: AbortHandle::new(),
        })
    }

    /// Handle an embedding caller can use to cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Run the experiment from scratch.
    pub async fn run(&self) -> Result<ExperimentOutcome> {
        self.run_with_seed(BTreeSet::new()).await
    }

    /// Resume an interrupted experiment from its recovered checkpoint state.
    pub async fn resume(&self, state: RecoveredState) -> Result<ExperimentOutcome> {
        match recovery::classify(&state) {
            ResumePoint::Writing => {
                info!("checkpoint is complete; re-emitting the result artifact");
                self.finish(state.stats).await
            }
            ResumePoint::Learning {
                partitions,
                missing,
            } => {
                info!(
                    done = state.stats.len(),
                    missing = missing.len(),
                    "resuming learning stage"
                );
                let oracle = self.oracle()?;
                let checkpoint = self.replay_checkpoint(&state, &partitions).await;
                let first_sequence = state
                    .stats
                    .iter()
                    .map(|s| s.sequence + 1)
                    .max()
                    .unwrap_or(0);
                let new_stats = self
                    .run_pipeline(missing, oracle, checkpoint, first_sequence)
                    .await?;
                let mut all = state.stats;
                all.extend(new_stats);
                self.finish(all).await
            }
            ResumePoint::Generation {
                recovered,
                declared,
            } => match state.manifest.mode {
                GenerationMode::Random => {
                    info!(
                        recovered = recovered.len(),
                        declared, "resuming random generation from recovered partitions"
                    );
                    self.run_with_seed(recovered).await
                }
                GenerationMode::Dictionary => {
                    info!("dictionary generation cannot resume partially; restarting");
                    self.run_with_seed(BTreeSet::new()).await
                }
            },
        }
    }

    async fn run_with_seed(&self, seed: BTreeSet<Partition>) -> Result<ExperimentOutcome> {
        info!(phase = %ExperimentPhase::Planning, "planning experiment");
        let oracle = self.oracle()?;
        let orchestrator = PartitionOrchestrator::new(self.settings.plan.clone())?;
        let generated = orchestrator.generate(seed).await?;
        let checkpoint = self
            .create_checkpoint(
                Manifest {
                    count: generated.partitions.len() as u64,
                    mode: generated.mode,
                },
                generated.partitions.iter(),
                &[],
            )
            .await;
        let partitions: Vec<Partition> = generated.partitions.into_iter().collect();
        let stats = match self.run_pipeline(partitions, oracle, checkpoint, 0).await {
            Ok(stats) => stats,
            Err(Error::Aborted) => {
                info!(phase = %ExperimentPhase::Aborted, "experiment aborted; recovery log retained");
                return Err(Error::Aborted);
            }
            Err(e) => return Err(e),
        };
        self.finish(stats).await
    }

    fn oracle(&self) -> Result<Arc<dyn Oracle>> {
        let learner = default_registry().resolve(&self.settings.learner)?;
        Ok(Arc::new(CrossValidator::new(learner)))
    }

    /// Write a fresh recovery log covering everything known so far. Failures
    /// are downgraded to warnings: the run proceeds, resumability is lost.
    async fn create_checkpoint<'a>(
        &self,
        manifest: Manifest,
        partitions: impl Iterator<Item = &'a Partition>,
        replayed_stats: &[Stats],
    ) -> Option<RecoveryWriter> {
        let path = self.settings.checkpoint_path.as_ref()?;
        let header = ExperimentHeader {
            experiment_id: Uuid::new_v4(),
            created_at: Utc::now(),
            config: self.settings.to_config_map(),
        };
        let attempt = async {
            let mut writer = RecoveryWriter::create(path, &header).await?;
            writer.write_manifest(manifest).await?;
            for partition in partitions {
                writer.write_partition(partition).await?;
            }
            for stats in replayed_stats {
                writer.write_stats(stats).await?;
            }
            Ok::<_, Error>(writer)
        };
        match attempt.await {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!("cannot write recovery log; this run is not resumable: {e}");
                None
            }
        }
    }

    /// Supersede a truncated log: replay recovered stats into a new
    /// checkpoint before re-running the missing jobs.
    async fn replay_checkpoint(
        &self,
        state: &RecoveredState,
        partitions: &[Partition],
    ) -> Option<RecoveryWriter> {
        self.create_checkpoint(state.manifest, partitions.iter(), &state.stats)
            .await
    }

    async fn run_pipeline(
        &self,
        partitions: Vec<Partition>,
        oracle: Arc<dyn Oracle>,
        checkpoint: Option<RecoveryWriter>,
        first_sequence: u64,
    ) -> Result<Vec<Stats>> {
        info!(
            phase = %ExperimentPhase::Partitioning,
            partitions = partitions.len(),
            "starting pipeline"
        );
        let builder = Arc::new(FragmentBuilder::new(
            Arc::clone(&self.table),
            self.settings.horizontal_expense,
        )?);
        let total = partitions.len();
        let (ready_tx, ready_rx) = mpsc::channel(READY_QUEUE_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();

        let partitioning = partitioning::spawn_stage(
            partitions,
            builder,
            ready_tx,
            done_tx,
            self.abort.clone(),
        );
        let learning = learning::spawn_stage(
            ready_rx,
            oracle,
            EvaluationOptions {
                folds: self.settings.folds,
            },
            done_rx,
            jobs_tx,
            first_sequence,
            total,
            self.abort.clone(),
        );
        let collecting = collector::spawn_stage(jobs_rx, checkpoint, self.abort.clone());

        let partitioning_result = partitioning
            .await
            .map_err(|e| Error::Interrupted(format!("partitioning stage: {e}")))?;
        info!(phase = %ExperimentPhase::Learning, "partitioning exhausted; draining learning stage");
        let learning_result = learning
            .await
            .map_err(|e| Error::Interrupted(format!("learning stage: {e}")))?;
        let collected = collecting
            .await
            .map_err(|e| Error::Interrupted(format!("stats collector: {e}")))?;

        match (partitioning_result, learning_result, collected) {
            (Ok(()), Ok(submitted), Ok(stats)) => {
                debug_assert_eq!(submitted as usize, stats.len());
                Ok(stats)
            }
            (p, l, c) => {
                // An abort flips every stage to Aborted; surface the stage
                // failure that caused it when there is one.
                let mut errors: Vec<Error> = Vec::new();
                if let Err(e) = p {
                    errors.push(e);
                }
                if let Err(e) = l {
                    errors.push(e);
                }
                if let Err(e) = c {
                    errors.push(e);
                }
                let root_cause = errors
                    .iter()
                    .position(|e| !matches!(e, Error::Aborted));
                Err(match root_cause {
                    Some(i) => errors.swap_remove(i),
                    None => Error::Aborted,
                })
            }
        }
    }

    /// Sort, emit the artifact, and delete the recovery log as the success
    /// marker.
    async fn finish(&self, mut stats: Vec<Stats>) -> Result<ExperimentOutcome> {
        info!(phase = %ExperimentPhase::Writing, results = stats.len(), "writing result artifact");
        stats.sort_by(|a, b| {
            b.evaluation
                .accuracy
                .total_cmp(&a.evaluation.accuracy)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        report::write_report(&self.settings.output_path, &stats, &self.table.classes())?;
        if let Some(path) = &self.settings.checkpoint_path {
            if path.exists() {
                if let Err(e) = recovery::log::remove(path).await {
                    warn!("completed run could not delete its recovery log: {e}");
                }
            }
        }
        info!(phase = %ExperimentPhase::Done, artifact = %self.settings.output_path.display(), "experiment complete");
        Ok(ExperimentOutcome {
            stats,
            artifact: self.settings.output_path.clone(),
        })
    }
}
