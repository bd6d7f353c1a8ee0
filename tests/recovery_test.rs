//! Integration tests for checkpoint replay and resumption.

use partwise::classify::{ClassMetrics, Evaluation};
use partwise::dataset::loader;
use partwise::partition::{ExceptionSet, Partition};
use partwise::pipeline::{ExperimentRunner, ExperimentSettings};
use partwise::plan::{GenerationMode, PartitionPlan};
use partwise::recovery::{self, ExperimentHeader, Manifest, RecoveryWriter};
use partwise::stats::Stats;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn p(attrs: &[u32]) -> Partition {
    Partition::new(attrs.to_vec()).unwrap()
}

fn write_dataset(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("data.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "a,b,c,outcome").unwrap();
    for i in 0..18 {
        let x = i as f64;
        let class = if i % 2 == 0 { "even" } else { "odd" };
        writeln!(file, "{},{},{},{}", x, x * 3.0, 40.0 - x, class).unwrap();
    }
    path
}

fn settings(dataset: PathBuf, dir: &TempDir) -> ExperimentSettings {
    ExperimentSettings {
        plan: PartitionPlan {
            attribute_count: 3,
            partition_size: 2,
            expense: 1.0,
            privacy_exceptions: ExceptionSet::empty(),
            utility_exceptions: ExceptionSet::empty(),
            mode: GenerationMode::Dictionary,
        },
        horizontal_expense: 1.0,
        folds: 3,
        learner: "centroid".into(),
        dataset_path: dataset,
        label: Some("outcome".into()),
        output_path: dir.path().join("results.csv"),
        checkpoint_path: Some(dir.path().join("run.checkpoint")),
    }
}

/// A stats record with an accuracy no real learner run would reproduce, so
/// replays are distinguishable from recomputation.
fn marker_stats(partition: Partition, sequence: u64, accuracy: f64) -> Stats {
    Stats {
        partition,
        sequence,
        evaluation: Evaluation {
            accuracy,
            per_class: vec![ClassMetrics {
                class: "even".into(),
                true_positives: 9,
                false_positives: 0,
                false_negatives: 0,
                precision: 1.0,
                recall: 1.0,
                roc_area: 1.0,
                prc_area: 1.0,
            }],
            elapsed_seconds: 0.01,
        },
    }
}

async fn write_log(
    path: &Path,
    settings: &ExperimentSettings,
    mode: GenerationMode,
    declared: u64,
    partitions: &[Partition],
    stats: &[Stats],
) {
    let header = ExperimentHeader {
        experiment_id: uuid::Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        config: settings.to_config_map(),
    };
    let mut writer = RecoveryWriter::create(path, &header).await.unwrap();
    writer
        .write_manifest(Manifest {
            count: declared,
            mode,
        })
        .await
        .unwrap();
    for partition in partitions {
        writer.write_partition(partition).await.unwrap();
    }
    for entry in stats {
        writer.write_stats(entry).await.unwrap();
    }
}

#[tokio::test]
async fn complete_log_replays_without_rerunning_learning() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir);
    let settings = settings(dataset.clone(), &dir);
    let checkpoint = dir.path().join("run.checkpoint");

    let partitions = vec![p(&[1, 2]), p(&[1, 3]), p(&[2, 3])];
    let stats = vec![
        marker_stats(p(&[1, 2]), 0, 0.111),
        marker_stats(p(&[1, 3]), 1, 0.333),
        marker_stats(p(&[2, 3]), 2, 0.222),
    ];
    write_log(
        &checkpoint,
        &settings,
        GenerationMode::Dictionary,
        3,
        &partitions,
        &stats,
    )
    .await;

    let state = recovery::log::read(&checkpoint).await.unwrap();
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();
    let runner = ExperimentRunner::new(table, settings).unwrap();
    let outcome = runner.resume(state).await.unwrap();

    // The marker accuracies survive verbatim: nothing was recomputed.
    let accuracies: Vec<f64> = outcome
        .stats
        .iter()
        .map(|s| s.evaluation.accuracy)
        .collect();
    assert_eq!(accuracies, vec![0.333, 0.222, 0.111]);
    assert!(!checkpoint.exists(), "success deletes the log");

    let content = std::fs::read_to_string(&outcome.artifact).unwrap();
    assert_eq!(content.lines().count(), 4);
}

#[tokio::test]
async fn missing_stats_rerun_learning_for_those_partitions_only() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir);
    let settings = settings(dataset.clone(), &dir);
    let checkpoint = dir.path().join("run.checkpoint");

    let partitions = vec![p(&[1, 2]), p(&[1, 3]), p(&[2, 3])];
    // Only one of three jobs completed before the interruption.
    let stats = vec![marker_stats(p(&[1, 2]), 0, 0.123)];
    write_log(
        &checkpoint,
        &settings,
        GenerationMode::Dictionary,
        3,
        &partitions,
        &stats,
    )
    .await;

    let state = recovery::log::read(&checkpoint).await.unwrap();
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();
    let runner = ExperimentRunner::new(table, settings).unwrap();
    let outcome = runner.resume(state).await.unwrap();

    assert_eq!(outcome.stats.len(), 3);
    // The recovered record is reused, not recomputed.
    let recovered = outcome
        .stats
        .iter()
        .find(|s| s.partition == p(&[1, 2]))
        .unwrap();
    assert_eq!(recovered.evaluation.accuracy, 0.123);
    // The two missing partitions were actually learned.
    for partition in [p(&[1, 3]), p(&[2, 3])] {
        let fresh = outcome
            .stats
            .iter()
            .find(|s| s.partition == partition)
            .unwrap();
        assert_ne!(fresh.evaluation.accuracy, 0.123);
        assert!(fresh.sequence > 0, "resumed jobs continue the sequence");
    }
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn interrupted_dictionary_generation_restarts_from_scratch() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir);
    let settings = settings(dataset.clone(), &dir);
    let checkpoint = dir.path().join("run.checkpoint");

    // Declared three partitions, only one made it to disk, no stats.
    write_log(
        &checkpoint,
        &settings,
        GenerationMode::Dictionary,
        3,
        &[p(&[1, 2])],
        &[],
    )
    .await;

    let state = recovery::log::read(&checkpoint).await.unwrap();
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();
    let runner = ExperimentRunner::new(table, settings).unwrap();
    let outcome = runner.resume(state).await.unwrap();

    // Full restart still explores the complete space.
    assert_eq!(outcome.stats.len(), 3);
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn truncated_log_is_readable_up_to_the_torn_record() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir);
    let settings = settings(dataset, &dir);
    let checkpoint = dir.path().join("run.checkpoint");

    let partitions = vec![p(&[1, 2]), p(&[1, 3]), p(&[2, 3])];
    let stats = vec![
        marker_stats(p(&[1, 2]), 0, 0.5),
        marker_stats(p(&[1, 3]), 1, 0.4),
    ];
    write_log(
        &checkpoint,
        &settings,
        GenerationMode::Dictionary,
        3,
        &partitions,
        &stats,
    )
    .await;

    // Tear the final stats record in half.
    let bytes = std::fs::read(&checkpoint).unwrap();
    std::fs::write(&checkpoint, &bytes[..bytes.len() - 20]).unwrap();

    let state = recovery::log::read(&checkpoint).await.unwrap();
    assert_eq!(state.partitions.len(), 3);
    assert_eq!(state.stats.len(), 1);
    match recovery::classify(&state) {
        recovery::ResumePoint::Learning { missing, .. } => {
            assert_eq!(missing, vec![p(&[1, 3]), p(&[2, 3])]);
        }
        other => panic!("expected Learning resume point, got {other:?}"),
    }
}
