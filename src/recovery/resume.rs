//! Resume-point classification for a recovered checkpoint.

use crate::partition::ordered::Partition;
use crate::recovery::log::RecoveredState;
use std::collections::BTreeSet;

/// Where an interrupted experiment picks back up.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumePoint {
    /// Fewer partition records than declared: generation was interrupted.
    /// Random mode reuses the recovered partitions and tops up; dictionary
    /// mode restarts the experiment from scratch.
    Generation {
        recovered: BTreeSet<Partition>,
        declared: u64,
    },
    /// All partitions present, some stats missing: learning was
    /// interrupted. Only the listed partitions are re-submitted.
    Learning {
        partitions: Vec<Partition>,
        missing: Vec<Partition>,
    },
    /// Everything present: re-sort and re-emit the result artifact only.
    Writing,
}

/// Classify a recovered state by which record section ended prematurely.
pub fn classify(state: &RecoveredState) -> ResumePoint {
    if (state.partitions.len() as u64) < state.manifest.count {
        return ResumePoint::Generation {
            recovered: state.partitions.iter().cloned().collect(),
            declared: state.manifest.count,
        };
    }
    if state.stats.len() < state.partitions.len() {
        let done: BTreeSet<&Partition> = state.stats.iter().map(|s| &s.partition).collect();
        let missing = state
            .partitions
            .iter()
            .filter(|p| !done.contains(p))
            .cloned()
            .collect();
        return ResumePoint::Learning {
            partitions: state.partitions.clone(),
            missing,
        };
    }
    ResumePoint::Writing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Evaluation;
    use crate::plan::GenerationMode;
    use crate::recovery::log::{ExperimentHeader, Manifest};
    use crate::stats::Stats;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn p(attrs: &[u32]) -> Partition {
        Partition::new(attrs.to_vec()).unwrap()
    }

    fn state(declared: u64, partitions: Vec<Partition>, stats: Vec<Stats>) -> RecoveredState {
        RecoveredState {
            header: ExperimentHeader {
                experiment_id: Uuid::new_v4(),
                created_at: Utc::now(),
                config: BTreeMap::new(),
            },
            manifest: Manifest {
                count: declared,
                mode: GenerationMode::Random,
            },
            partitions,
            stats,
        }
    }

    fn stats_for(partition: Partition, sequence: u64) -> Stats {
        Stats {
            partition,
            sequence,
            evaluation: Evaluation {
                accuracy: 0.5,
                per_class: vec![],
                elapsed_seconds: 0.0,
            },
        }
    }

    #[test]
    fn short_partition_section_resumes_generation() {
        let resumed = classify(&state(5, vec![p(&[1, 2]), p(&[1, 3])], vec![]));
        match resumed {
            ResumePoint::Generation {
                recovered,
                declared,
            } => {
                assert_eq!(declared, 5);
                assert_eq!(recovered.len(), 2);
            }
            other => panic!("expected Generation, got {other:?}"),
        }
    }

    #[test]
    fn short_stats_section_resumes_learning_for_missing_only() {
        let parts = vec![p(&[1, 2]), p(&[1, 3]), p(&[2, 3])];
        let resumed = classify(&state(
            3,
            parts.clone(),
            vec![stats_for(p(&[1, 3]), 1)],
        ));
        match resumed {
            ResumePoint::Learning {
                partitions,
                missing,
            } => {
                assert_eq!(partitions, parts);
                assert_eq!(missing, vec![p(&[1, 2]), p(&[2, 3])]);
            }
            other => panic!("expected Learning, got {other:?}"),
        }
    }

    #[test]
    fn complete_log_only_rewrites_the_artifact() {
        let parts = vec![p(&[1, 2]), p(&[1, 3])];
        let resumed = classify(&state(
            2,
            parts.clone(),
            vec![stats_for(p(&[1, 2]), 0), stats_for(p(&[1, 3]), 1)],
        ));
        assert_eq!(resumed, ResumePoint::Writing);
    }
}
