//! Result artifact: a delimited table of per-partition metrics.

use crate::classify::ClassMetrics;
use crate::error::Result;
use crate::stats::Stats;
use std::path::Path;
use tracing::info;

/// Write the result table: one header row naming each metric per class, then
/// one row per partition. Callers pass stats already sorted non-increasing
/// by accuracy.
pub fn write_report(path: &Path, stats: &[Stats], classes: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "attribute-set".to_string(),
        "time-seconds".to_string(),
        "accuracy".to_string(),
    ];
    for metric in ["TP", "FP", "FN", "Precision", "Recall", "aROC", "aPRC"] {
        for class in classes {
            header.push(format!("{metric}_{class}"));
        }
    }
    writer.write_record(&header)?;

    for entry in stats {
        let mut row = vec![
            entry.partition.to_string(),
            format!("{:.3}", entry.evaluation.elapsed_seconds),
            format!("{:.6}", entry.evaluation.accuracy),
        ];
        let lookup = |class: &str| -> Option<&ClassMetrics> {
            entry.evaluation.per_class.iter().find(|m| m.class == class)
        };
        for class in classes {
            row.push(lookup(class).map_or(0, |m| m.true_positives).to_string());
        }
        for class in classes {
            row.push(lookup(class).map_or(0, |m| m.false_positives).to_string());
        }
        for class in classes {
            row.push(lookup(class).map_or(0, |m| m.false_negatives).to_string());
        }
        for class in classes {
            row.push(format!("{:.6}", lookup(class).map_or(0.0, |m| m.precision)));
        }
        for class in classes {
            row.push(format!("{:.6}", lookup(class).map_or(0.0, |m| m.recall)));
        }
        for class in classes {
            row.push(format!("{:.6}", lookup(class).map_or(0.0, |m| m.roc_area)));
        }
        for class in classes {
            row.push(format!("{:.6}", lookup(class).map_or(0.0, |m| m.prc_area)));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!(rows = stats.len(), "wrote result artifact {}", path.display());
    Ok(())
}
