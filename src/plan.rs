//! Experiment plan: what slice of the combination space to explore.

use crate::error::{Error, Result};
use crate::partition::ordered::ExceptionSet;
use serde::{Deserialize, Serialize};

/// How the partition set is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Full lexicographic enumeration, then budget trimming.
    Dictionary,
    /// Distinct random sampling without enumeration.
    Random,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Dictionary => write!(f, "dictionary"),
            GenerationMode::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dictionary" => Ok(GenerationMode::Dictionary),
            "random" => Ok(GenerationMode::Random),
            other => Err(Error::Config(format!("unknown generation mode {other:?}"))),
        }
    }
}

/// Immutable description of one experiment's partition space.
///
/// Created once per experiment and validated before any work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Number of attributes in the universe (label column excluded).
    pub attribute_count: u32,
    /// Fixed size k of every generated partition.
    pub partition_size: u32,
    /// Vertical expense: fraction of the combination space to explore.
    pub expense: f64,
    /// Partitions whose supersets must never be generated.
    pub privacy_exceptions: ExceptionSet,
    /// Partitions whose supersets are preferentially kept when trimming.
    pub utility_exceptions: ExceptionSet,
    /// Requested generation mode; the orchestrator may override it.
    pub mode: GenerationMode,
}

impl PartitionPlan {
    /// Map a signed tradeoff number in `[-1, 1]` to a partition size:
    /// `-1` favors minimal partitions (privacy), `1` maximal (utility).
    pub fn size_from_tradeoff(attribute_count: u32, tradeoff: f64) -> Result<u32> {
        if !(-1.0..=1.0).contains(&tradeoff) {
            return Err(Error::Config(format!(
                "tradeoff number must be in [-1, 1], got {tradeoff}"
            )));
        }
        if attribute_count == 0 {
            return Err(Error::Config("attribute count must be positive".into()));
        }
        let k = (1.0 + ((tradeoff + 1.0) / 2.0) * (attribute_count - 1) as f64).floor() as u32;
        Ok(k.clamp(1, attribute_count))
    }

    pub fn validate(&self) -> Result<()> {
        if self.attribute_count == 0 {
            return Err(Error::Config("attribute count must be positive".into()));
        }
        if self.partition_size == 0 || self.partition_size > self.attribute_count {
            return Err(Error::Config(format!(
                "partition size must satisfy 1 <= k <= {}, got {}",
                self.attribute_count, self.partition_size
            )));
        }
        if !(self.expense > 0.0 && self.expense <= 1.0) {
            return Err(Error::Config(format!(
                "expense must be in (0, 1], got {}",
                self.expense
            )));
        }
        self.privacy_exceptions
            .validate(self.attribute_count, self.partition_size, "privacy")?;
        self.utility_exceptions
            .validate(self.attribute_count, self.partition_size, "utility")?;
        Ok(())
    }
}
