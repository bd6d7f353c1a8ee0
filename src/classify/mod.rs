//! Classification oracle abstraction.
//!
//! The pipeline only ever talks to [`Oracle`]: given a dataset fragment and
//! evaluation options it returns the metric set for one partition. The
//! bundled learners are deliberately small reference algorithms; anything
//! implementing [`Learner`] plugs in through the registry.

pub mod baseline;
pub mod centroid;
pub mod registry;

use crate::dataset::{Fragment, Table, Value};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Options forwarded to the oracle for every job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Number of cross-validation folds.
    pub folds: usize,
}

/// Per-class slice of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: String,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub roc_area: f64,
    pub prc_area: f64,
}

/// Complete quality record for one partition's classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub elapsed_seconds: f64,
}

/// A trainable classification algorithm.
pub trait Learner: Send + Sync {
    fn name(&self) -> &str;

    /// Train on `table`; `classes` fixes the score ordering the returned
    /// model must use, so folds with absent classes still align.
    fn fit(&self, table: &Table, classes: &[String]) -> Result<Box<dyn Model>>;
}

/// A trained model scoring rows against the fixed class list.
pub trait Model: Send {
    /// One score per class, higher meaning more likely; the predicted class
    /// is the argmax.
    fn scores(&self, values: &[Value]) -> Vec<f64>;
}

/// The classification+evaluation collaborator the pipeline submits jobs to.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, fragment: Fragment, options: EvaluationOptions) -> Result<Evaluation>;
}

/// Default oracle: k-fold cross-validation of a [`Learner`], run on the
/// blocking pool since training is CPU-bound.
pub struct CrossValidator {
    learner: Arc<dyn Learner>,
}

impl CrossValidator {
    pub fn new(learner: Arc<dyn Learner>) -> Self {
        Self { learner }
    }
}

#[async_trait]
impl Oracle for CrossValidator {
    fn name(&self) -> &str {
        self.learner.name()
    }

    async fn evaluate(&self, fragment: Fragment, options: EvaluationOptions) -> Result<Evaluation> {
        let learner = Arc::clone(&self.learner);
        tokio::task::spawn_blocking(move || cross_validate(learner.as_ref(), &fragment, options.folds))
            .await
            .map_err(|e| Error::Interrupted(format!("evaluation worker: {e}")))?
    }
}

/// Stratify-free k-fold cross-validation producing the full metric set.
pub fn cross_validate(learner: &dyn Learner, fragment: &Fragment, folds: usize) -> Result<Evaluation> {
    let table = &fragment.table;
    let rows = table.rows();
    if folds < 2 {
        return Err(Error::Config(format!("fold count must be >= 2, got {folds}")));
    }
    if rows.len() < folds {
        return Err(Error::Classifier(format!(
            "fragment {} has {} rows, fewer than {folds} folds",
            fragment.partition,
            rows.len()
        )));
    }

    let classes = table.classes();
    let started = Instant::now();

    let mut correct = 0u64;
    let mut tp = vec![0u64; classes.len()];
    let mut fp = vec![0u64; classes.len()];
    let mut fn_ = vec![0u64; classes.len()];
    // (score, is_this_class) per class, pooled across folds.
    let mut scored: Vec<Vec<(f64, bool)>> = vec![Vec::new(); classes.len()];

    let all_columns: Vec<u32> = (1..=table.attribute_count()).collect();
    for fold in 0..folds {
        let train_rows: Vec<usize> = (0..rows.len()).filter(|i| i % folds != fold).collect();
        let test_rows: Vec<usize> = (0..rows.len()).filter(|i| i % folds == fold).collect();
        let train = table.restrict(&all_columns, &train_rows);
        let model = learner.fit(&train, &classes)?;

        for &r in &test_rows {
            let row = &rows[r];
            let scores = model.scores(&row.values);
            if scores.len() != classes.len() {
                return Err(Error::Classifier(format!(
                    "model returned {} scores for {} classes",
                    scores.len(),
                    classes.len()
                )));
            }
            let predicted = argmax(&scores);
            let actual = classes
                .iter()
                .position(|c| c == &row.class)
                .expect("class list covers every row");
            if predicted == actual {
                correct += 1;
                tp[actual] += 1;
            } else {
                fp[predicted] += 1;
                fn_[actual] += 1;
            }
            for (c, pool) in scored.iter_mut().enumerate() {
                pool.push((scores[c], c == actual));
            }
        }
    }

    let total = rows.len() as f64;
    let per_class = classes
        .iter()
        .enumerate()
        .map(|(c, class)| ClassMetrics {
            class: class.clone(),
            true_positives: tp[c],
            false_positives: fp[c],
            false_negatives: fn_[c],
            precision: ratio(tp[c], tp[c] + fp[c]),
            recall: ratio(tp[c], tp[c] + fn_[c]),
            roc_area: roc_area(&scored[c]),
            prc_area: prc_area(&scored[c]),
        })
        .collect();

    Ok(Evaluation {
        accuracy: correct as f64 / total,
        per_class,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    })
}

fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// One-vs-rest ROC area via the rank statistic, with tie-averaged ranks.
fn roc_area(scored: &[(f64, bool)]) -> f64 {
    let positives = scored.iter().filter(|(_, p)| *p).count();
    let negatives = scored.len() - positives;
    if positives == 0 {
        return 0.0;
    }
    if negatives == 0 {
        return 1.0;
    }

    let mut sorted: Vec<&(f64, bool)> = scored.iter().collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1].0 == sorted[i].0 {
            j += 1;
        }
        // ranks i+1..=j+1 share the average rank
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for item in &sorted[i..=j] {
            if item.1 {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}

/// Precision-recall area as average precision over descending scores.
fn prc_area(scored: &[(f64, bool)]) -> f64 {
    let positives = scored.iter().filter(|(_, p)| *p).count();
    if positives == 0 {
        return 0.0;
    }
    let mut sorted: Vec<&(f64, bool)> = scored.iter().collect();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut tp = 0u64;
    let mut seen = 0u64;
    let mut sum = 0.0;
    for (_, positive) in sorted {
        seen += 1;
        if *positive {
            tp += 1;
            sum += tp as f64 / seen as f64;
        }
    }
    sum / positives as f64
}
