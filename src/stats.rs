//! Per-partition result record.

use crate::classify::Evaluation;
use crate::partition::ordered::Partition;
use serde::{Deserialize, Serialize};

/// Produced exactly once per partition that completes learning; immutable
/// after creation and keyed by its partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub partition: Partition,
    /// Submission order of the learning job; breaks accuracy ties in the
    /// final report.
    pub sequence: u64,
    pub evaluation: Evaluation,
}
