//! End-to-end pipeline tests: generation through artifact emission.

use partwise::dataset::loader;
use partwise::partition::ExceptionSet;
use partwise::pipeline::{ExperimentRunner, ExperimentSettings};
use partwise::plan::{GenerationMode, PartitionPlan};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write a small numeric dataset: four attributes, two separable classes.
fn write_dataset(dir: &TempDir, rows: usize) -> PathBuf {
    let path = dir.path().join("data.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "a,b,c,d,outcome").unwrap();
    for i in 0..rows {
        let x = i as f64;
        let class = if i % 2 == 0 { "even" } else { "odd" };
        writeln!(file, "{},{},{},{},{}", x, x * 2.0, 50.0 - x, x / 2.0, class).unwrap();
    }
    path
}

fn settings(dataset: PathBuf, dir: &TempDir, expense: f64) -> ExperimentSettings {
    ExperimentSettings {
        plan: PartitionPlan {
            attribute_count: 4,
            partition_size: 2,
            expense,
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

#[tokio::test]
async fn every_partition_produces_exactly_one_result_row() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 24);
    let settings = settings(dataset.clone(), &dir, 1.0);
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();

    let runner = ExperimentRunner::new(table, settings).unwrap();
    let outcome = runner.run().await.unwrap();

    // C(4,2) = 6 partitions in, 6 stats out.
    assert_eq!(outcome.stats.len(), 6);

    let content = std::fs::read_to_string(&outcome.artifact).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 7, "header plus one row per partition");

    // Sorted non-increasing by accuracy.
    let accuracies: Vec<f64> = outcome
        .stats
        .iter()
        .map(|s| s.evaluation.accuracy)
        .collect();
    assert!(accuracies.windows(2).all(|w| w[0] >= w[1]));

    // Successful completion deletes the recovery log.
    assert!(!dir.path().join("run.checkpoint").exists());
}

#[tokio::test]
async fn privacy_exceptions_shrink_the_explored_set() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 18);
    let mut settings = settings(dataset.clone(), &dir, 1.0);
    settings.plan.privacy_exceptions = ExceptionSet::new(vec![
        partwise::partition::Partition::new(vec![1]).unwrap(),
    ]);
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();

    let runner = ExperimentRunner::new(table, settings).unwrap();
    let outcome = runner.run().await.unwrap();

    assert_eq!(outcome.stats.len(), 3); // {2,3},{2,4},{3,4}
    for stats in &outcome.stats {
        assert!(!stats.partition.contains(1));
    }
}

#[tokio::test]
async fn aborted_experiment_retains_its_recovery_log() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(&dir, 18);
    let settings = settings(dataset.clone(), &dir, 1.0);
    let table = loader::load_csv(&dataset, Some("outcome")).unwrap();

    let runner = ExperimentRunner::new(table, settings).unwrap();
    runner.abort_handle().abort();
    let result = runner.run().await;
    assert!(matches!(result, Err(partwise::Error::Aborted)));
    // No artifact was written, and the log stays for later resumption.
    assert!(!dir.path().join("results.csv").exists());
    assert!(dir.path().join("run.checkpoint").exists());
}
